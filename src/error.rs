//! Error taxonomy for driftrec.
//!
//! Each component reports a dedicated error type so that callers can apply
//! the right recovery policy: configuration and per-host resolution failures
//! are fatal for their scope, while staging, collection, and notification
//! failures degrade to a logged skip for the current cycle.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Malformed or incomplete configuration. Fatal before any repository access.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for the expected schema.
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// Underlying parse error with line context.
        source: serde_yaml::Error,
    },

    /// No data directory configured.
    #[error("no datadir found - please check config file")]
    MissingDataDir,

    /// A notification channel has no recipients.
    #[error("notification recipients required for {kind} channel, e.g. recipients: [ops@example.com]")]
    MissingRecipients {
        /// Channel kind as written in the config.
        kind: String,
    },

    /// A chat channel is missing its server or username.
    #[error("chat notification requires server and username")]
    IncompleteChatChannel,

    /// A mail channel is missing its sender address.
    #[error("mail notification requires a from address")]
    MissingSender,

    /// A host entry is unusable.
    #[error("host entry {hostname} is invalid: {reason}")]
    InvalidHost {
        /// Hostname as written in the config.
        hostname: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// A configured host's network name cannot be resolved.
///
/// Fatal for that host's collection only; the run continues with the
/// remaining hosts.
#[derive(Debug, Error)]
#[error("cannot resolve host {hostname}: {reason}. Please check the hostname resolves using a tool like nslookup or dig")]
pub struct ResolutionError {
    /// The hostname that failed to resolve.
    pub hostname: String,
    /// Resolver failure detail.
    pub reason: String,
}

/// Local I/O failure while staging a file into the repository.
#[derive(Debug, Error)]
pub enum StageError {
    /// The path does not exist under the repository working tree.
    #[error("no such file under working tree: {}", path.display())]
    NotFound {
        /// Repository-relative path that was staged.
        path: PathBuf,
    },

    /// Reading or hashing the working-tree copy failed.
    #[error("failed to stage {}: {source}", path.display())]
    Io {
        /// Repository-relative path that was staged.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Persisting the staged state failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Backend failure in the versioned repository.
///
/// Never corrupts in-memory state; a failed commit leaves staged changes
/// pending for retry on the next cycle.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Filesystem-level failure.
    #[error("repository I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored state could not be decoded.
    #[error("corrupt repository state: {0}")]
    Corrupt(String),

    /// An external backend command failed.
    #[error("backend command failed: {0}")]
    Backend(String),

    /// The index lock could not be acquired or released.
    #[error("failed to lock index: {0}")]
    Lock(String),
}

/// Remote command execution failed or returned unusable output.
///
/// Treated as "no change detected" for that host this cycle.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The remote command did not finish within the per-host timeout.
    #[error("remote command timed out after {0:?}")]
    Timeout(Duration),

    /// The remote command exited unsuccessfully.
    #[error("remote command failed: {0}")]
    CommandFailed(String),

    /// Spawning or reading the remote session failed.
    #[error("remote execution I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured credentials cannot be used with the available transport.
    #[error("authentication not possible: {0}")]
    Auth(String),

    /// The inventory output contained no usable parameter lines.
    #[error("unusable inventory output: {0}")]
    Unparseable(String),
}

/// Delivery failure on a notification channel or recipient.
///
/// Logged and skipped; never escalated to a non-zero exit on its own.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The transport binary for this channel kind is not installed.
    #[error("transport binary not found: {0}")]
    MissingTransport(String),

    /// The transport ran but reported failure.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Spawning or feeding the transport failed.
    #[error("notification I/O error: {0}")]
    Io(#[from] std::io::Error),
}
