//! Orchestration of one poll cycle.
//!
//! One run processes all configured file sets and hosts sequentially to
//! completion, aggregates their drift reports, and dispatches notifications
//! once at the end. Per-item failures degrade to a logged skip so the run
//! records what it can.

use crate::DriftContext;
use crate::collector::{ParameterCollector, resolve_host_id};
use crate::config::HostConfig;
use crate::error::CollectionError;
use crate::notify::Dispatcher;
use crate::fileset;
use crate::repo::{self, VersionedRepository};
use crate::ssh::SshExecutor;
use anyhow::{Context, Result};
use tracing::{error, info, warn};

/// Executes one complete poll cycle.
///
/// # Errors
/// Returns an error only when the repository backend cannot be opened at
/// all; everything downstream is handled per the recovery policy of its
/// error type.
pub fn run(ctx: &DriftContext) -> Result<()> {
    let mut repo = repo::open(ctx.config.backend, &ctx.config.datadir)
        .with_context(|| format!("failed to open repository at {}", ctx.config.datadir.display()))?;

    let mut report = String::new();

    for spec in &ctx.config.filesets {
        info!(fileset = %spec.name, "processing file set");
        match fileset::process_file_set(spec, repo.as_mut()) {
            Ok(diff) => report.push_str(&diff),
            Err(e) => {
                warn!(fileset = %spec.name, error = %e, "file set skipped this cycle");
            }
        }
    }

    for host in &ctx.config.hosts {
        match process_host(host, repo.as_mut()) {
            Ok(diff) => report.push_str(&diff),
            Err(e) => error!(host = %host.hostname, error = %e, "host skipped this cycle"),
        }
    }

    if report.is_empty() {
        info!("no drift detected");
    } else {
        Dispatcher::new().dispatch(&ctx.config.notifications, &report);
    }
    Ok(())
}

/// Collects one host's parameters and returns its drift report.
///
/// Collection failures are downgraded to "no change detected" here; only
/// resolution and repository failures propagate to the caller's log.
fn process_host(host: &HostConfig, repo: &mut dyn VersionedRepository) -> Result<String> {
    let host_id = resolve_host_id(host)?;
    info!(host = %host_id, "processing host");

    let mut executor = SshExecutor::connect(host)?;
    let collector = ParameterCollector::new(&host.category, &host_id, &host.command);

    let current = match collector.collect(&mut executor) {
        Ok(current) => current,
        Err(e @ (CollectionError::Timeout(_)
        | CollectionError::CommandFailed(_)
        | CollectionError::Io(_)
        | CollectionError::Unparseable(_))) => {
            warn!(host = %host_id, error = %e, "collection failed, treating as no change");
            return Ok(String::new());
        }
        Err(e) => return Err(e.into()),
    };

    collector.compare_and_update(&current, repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_run_with_empty_config_opens_repository() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            datadir: dir.path().join("data"),
            backend: crate::config::BackendKind::Local,
            filesets: Vec::new(),
            hosts: Vec::new(),
            notifications: Vec::new(),
        };
        let ctx = DriftContext::new(config, false);
        run(&ctx).unwrap();
        assert!(dir.path().join("data").join(crate::ADMIN_DIR).exists());
    }
}
