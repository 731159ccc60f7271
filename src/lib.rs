#![warn(missing_docs)]
#![allow(clippy::arithmetic_side_effects)] // Simple counters and line numbers cannot overflow

//! # Driftrec - Configuration Drift Recorder
//!
//! Driftrec periodically snapshots the state of local file sets and remote
//! host configuration parameters into a version-controlled store, computes
//! human-readable diffs against the previous snapshot, and notifies operators
//! when drift occurs.
//!
//! ## Pipeline
//!
//! One run is a single synchronous batch: scan the configured file sets and
//! hosts, normalize what was observed, compare against the last snapshot,
//! commit whatever drifted, and notify with the rendered diffs.
//!
//! ## Architecture
//!
//! The codebase is organized into several key modules:
//!
//! - [`diff`]: Line-based LCS diff engine and hunk rendering
//! - [`repo`]: Versioned repository abstraction with swappable backends
//! - [`fileset`]: Include/exclude file-set scanner and change detection
//! - [`collector`]: Remote parameter collection and volatile-key filtering
//! - [`ssh`]: SSH subprocess remote-execution glue
//! - [`notify`]: Notification fan-out over mail and chat channels
//! - [`config`]: YAML configuration schema and validation
//! - [`run`]: The orchestrator sequencing one poll cycle
//!
//! ## Example Usage
//!
//! ```no_run
//! use driftrec::{DriftContext, config::Config, run};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load(std::path::Path::new("config.yml"))?;
//! let ctx = DriftContext::new(config, false);
//! run::run(&ctx)?;
//! # Ok(())
//! # }
//! ```

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Remote parameter collection, parsing, and volatile-key filtering.
pub mod collector;

/// Configuration parsing and validation.
pub mod config;

/// Line-based diff engine producing 1-indexed hunks.
pub mod diff;

/// Typed error taxonomy shared by all components.
pub mod error;

/// File-set scanning and change detection against the repository.
pub mod fileset;

/// Notification dispatch over configured channels.
pub mod notify;

/// Versioned repository abstraction and backends.
pub mod repo;

/// Orchestration of one poll cycle.
pub mod run;

/// SSH subprocess implementation of the remote execution capability.
pub mod ssh;

use crate::config::Config;

/// Current version of the driftrec binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

/// Directory under the data directory holding repository state for the
/// native local backend.
pub const ADMIN_DIR: &str = ".driftrec";

/// File name used for a host's stored parameter snapshot.
pub const PARAMETER_SNAPSHOT_FILE: &str = "GlobalVariables";

/// Central context for one driftrec run.
///
/// Holds the loaded configuration and the verbosity flag threaded through
/// components explicitly rather than kept in process-wide static state.
#[derive(Debug, Clone)]
pub struct DriftContext {
    /// Loaded configuration.
    pub config: Config,

    /// Whether verbose diagnostics were requested on the command line.
    pub verbose: bool,
}

impl DriftContext {
    /// Creates a context from an already-validated configuration.
    #[must_use]
    pub const fn new(config: Config, verbose: bool) -> Self {
        Self { config, verbose }
    }
}
