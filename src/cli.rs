//! Command-line interface definitions for driftrec.
//!
//! Driftrec is a batch tool: one invocation performs one poll cycle over all
//! configured file sets and hosts, so the surface is a config path and a
//! verbosity switch rather than subcommands.

use clap::Parser;
use std::path::PathBuf;

/// Main CLI structure for driftrec.
#[derive(Parser, Debug)]
#[command(
    name = "drift",
    version = crate::VERSION,
    about = "Configuration drift recorder",
    long_about = "Snapshots local file sets and remote host parameters into a \
versioned store, diffs each run against the previous snapshot, and notifies \
operators when drift occurs"
)]
pub struct Cli {
    /// Path to the driftrec config file
    #[arg(
        short = 'c',
        long = "config",
        value_name = "PATH",
        env = "DRIFT_CONFIG",
        default_value = crate::DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,

    /// Generate verbose output on standard error
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let cli = Cli::parse_from(["drift"]);
        assert_eq!(cli.config, PathBuf::from("config.yml"));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_explicit_config_and_verbose() {
        let cli = Cli::parse_from(["drift", "-c", "/etc/driftrec.yml", "-v"]);
        assert_eq!(cli.config, PathBuf::from("/etc/driftrec.yml"));
        assert!(cli.verbose);
    }
}
