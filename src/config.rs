//! Configuration parsing and validation.
//!
//! Driftrec is configured by a single YAML file (default `config.yml`)
//! declaring the data directory, the repository backend, the file sets to
//! scan, the remote hosts to poll, and the notification channels.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-host collection timeout when none is configured.
pub const DEFAULT_HOST_TIMEOUT: Duration = Duration::from_secs(30);

/// Top-level configuration schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the repository working tree.
    pub datadir: PathBuf,

    /// Which repository backend persists snapshots.
    #[serde(default)]
    pub backend: BackendKind,

    /// File sets to scan each cycle.
    #[serde(default, rename = "fileset")]
    pub filesets: Vec<FileSetConfig>,

    /// Remote hosts to poll each cycle.
    #[serde(default)]
    pub hosts: Vec<HostConfig>,

    /// Channels notified when any drift was recorded.
    #[serde(default, rename = "notification")]
    pub notifications: Vec<ChannelConfig>,
}

/// Repository backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Native snapshot store under `<datadir>/.driftrec`.
    #[default]
    Local,
    /// Working tree managed by a `git` subprocess.
    Git,
}

/// A named group of include/exclude patterns tracked together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSetConfig {
    /// Display name, used in commit messages and logs.
    pub name: String,

    /// Absolute paths, optionally with a wildcard in the final segment.
    pub include: Vec<String>,

    /// Patterns subtracted from the include set, same syntax.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// A remote host whose configuration parameters are recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Network name used to reach the host.
    pub hostname: String,

    /// Optional display identifier; defaults to the resolved hostname.
    #[serde(default)]
    pub name: Option<String>,

    /// Namespace directory for this host's snapshots, e.g. `freebsd`.
    pub category: String,

    /// Inventory command executed on the host.
    #[serde(default = "default_inventory_command")]
    pub command: String,

    /// Login user for the SSH transport.
    pub username: String,

    /// Private key for public-key authentication. Tried before passwords.
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Password for password authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Per-host run timeout in humantime format, e.g. `30s`, `2m`.
    #[serde(default)]
    pub timeout: Option<String>,
}

impl HostConfig {
    /// Parsed per-host timeout, falling back to [`DEFAULT_HOST_TIMEOUT`].
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidHost` if the configured value is not a
    /// valid humantime duration.
    pub fn parsed_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.timeout {
            None => Ok(DEFAULT_HOST_TIMEOUT),
            Some(raw) => {
                humantime::parse_duration(raw).map_err(|e| ConfigError::InvalidHost {
                    hostname: self.hostname.clone(),
                    reason: format!("bad timeout {raw:?}: {e}"),
                })
            }
        }
    }

    /// Key file with `~` expanded, if one is configured.
    #[must_use]
    pub fn expanded_key_file(&self) -> Option<PathBuf> {
        self.key_file.as_deref().map(expand_tilde)
    }
}

/// Notification channel kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// One message per run addressed to all recipients via a single
    /// submission.
    Mail,
    /// One session per recipient carrying the same text.
    Chat,
}

impl ChannelKind {
    /// Name as written in the configuration file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mail => "mail",
            Self::Chat => "chat",
        }
    }
}

/// One configured notification channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel kind.
    pub kind: ChannelKind,

    /// Server the transport talks to (SMTP relay, chat server).
    #[serde(default)]
    pub server: Option<String>,

    /// Sender address for mail channels.
    #[serde(default)]
    pub from: Option<String>,

    /// Account name for chat channels.
    #[serde(default)]
    pub username: Option<String>,

    /// Account credential for chat channels.
    #[serde(default)]
    pub password: Option<String>,

    /// Recipients of the drift report.
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Config {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation. All configuration errors are fatal before any repository
    /// access.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.datadir = expand_tilde(&config.datadir);
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field invariants that serde cannot express.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datadir.as_os_str().is_empty() {
            return Err(ConfigError::MissingDataDir);
        }
        for channel in &self.notifications {
            if channel.recipients.is_empty() {
                return Err(ConfigError::MissingRecipients {
                    kind: channel.kind.as_str().to_string(),
                });
            }
            match channel.kind {
                ChannelKind::Mail => {
                    if channel.from.is_none() {
                        return Err(ConfigError::MissingSender);
                    }
                }
                ChannelKind::Chat => {
                    if channel.server.is_none() || channel.username.is_none() {
                        return Err(ConfigError::IncompleteChatChannel);
                    }
                }
            }
        }
        for host in &self.hosts {
            if host.hostname.trim().is_empty() {
                return Err(ConfigError::InvalidHost {
                    hostname: host.hostname.clone(),
                    reason: "empty hostname".to_string(),
                });
            }
            if host.category.trim().is_empty() {
                return Err(ConfigError::InvalidHost {
                    hostname: host.hostname.clone(),
                    reason: "empty category".to_string(),
                });
            }
            // Surface bad timeout strings before the run starts.
            host.parsed_timeout()?;
        }
        Ok(())
    }
}

fn default_inventory_command() -> String {
    "sysctl -a".to_string()
}

/// Expands a leading `~/` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
