//! Remote parameter collection.
//!
//! One inventory command runs on the remote host per cycle. Its output is
//! parsed into `key: value` pairs, stripped of known-volatile keys, and the
//! remainder is serialized as sorted `key : value` lines stored as a single
//! tracked file inside the repository at
//! `<category>/<host_id>/GlobalVariables`.

use crate::PARAMETER_SNAPSHOT_FILE;
use crate::config::HostConfig;
use crate::diff::{diff, render_hunks};
use crate::error::{CollectionError, ResolutionError};
use crate::repo::VersionedRepository;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::net::ToSocketAddrs;
use std::path::PathBuf;
use tracing::debug;

/// Capability the collector needs from the outside world: run a command on
/// the remote host, get its combined standard output back. Satisfied by an
/// SSH-style session for command-oriented hosts or a typed management query
/// adapter for hosts exposing structured objects.
pub trait RemoteExecutor {
    /// Executes one command synchronously and returns its standard output.
    ///
    /// # Errors
    /// Returns a [`CollectionError`] on transport failure, command failure,
    /// or timeout.
    fn execute(&mut self, command: &str) -> Result<String, CollectionError>;
}

/// Inventory line shape: `<dotted.key>: <value>`. Anything else is ignored.
static PARAMETER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+\.\S+): (.+)$").expect("parameter line pattern"));

/// Known-volatile parameters: counters, timestamps, and live memory
/// statistics that change with every request and would otherwise trigger
/// false-positive drift notifications on every poll.
static VOLATILE_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "debug.PMAP1changed",
        "debug.PMAP1unchanged",
        "debug.PMAP1changedcpu",
        "debug.dir_entry",
        "debug.direct_blk_ptrs",
        "debug.hashstat.nchash",
        "debug.indir_blk_ptrs",
        "debug.inode_bitmap",
        "debug.numcache",
        "debug.numcachehv",
        "debug.numneg",
        "debug.to_avg_depth",
        "debug.to_avg_gcalls",
        "debug.to_avg_mpcalls",
        "debug.to_avg_mtxcalls",
        "hw.acpi.thermal.tz0.temperature",
        "hw.usermem",
        "kern.cp_time",
        "kern.cp_times",
        "kern.ipc.nsfbufspeak",
        "kern.ipc.numopensockets",
        "kern.ipc.pipekva",
        "kern.lastpid",
        "kern.nselcoll",
        "kern.openfiles",
        "kern.timecounter.nnanouptime",
        "kern.timecounter.nbintime",
        "kern.timecounter.nbinuptime",
        "kern.timecounter.ngetbinuptime",
        "kern.timecounter.ngetmicrotime",
        "kern.timecounter.ngetmicrouptime",
        "kern.timecounter.ngetnanotime",
        "kern.timecounter.ngetnanouptime",
        "kern.timecounter.nmicrotime",
        "kern.timecounter.nmicrouptime",
        "kern.timecounter.nnanotime",
        "kern.timecounter.nsetclock",
        "kern.timecounter.tc.ACPI-safe.counter",
        "kern.timecounter.tc.TSC.counter",
        "kern.timecounter.tc.i8254.counter",
        "kern.tty_nin",
        "kern.tty_nout",
        "net.inet.tcp.pcbcount",
        "net.inet.tcp.hostcache.count",
        "net.inet.tcp.reass.overflows",
        "net.inet.tcp.sack.globalhole",
        "net.isr.count",
        "net.isr.directed",
        "net.isr.queued",
        "net.isr.swi_count",
        "vfs.cache.dotdothits",
        "vfs.cache.dothits",
        "vfs.cache.nchstats",
        "vfs.cache.numcache",
        "vfs.cache.numcalls",
        "vfs.cache.numchecks",
        "vfs.cache.numneg",
        "vfs.cache.numnegzaps",
        "vfs.cache.numfullpathcalls",
        "vfs.cache.numfullpathfail1",
        "vfs.cache.numfullpathfound",
        "vfs.cache.nummiss",
        "vfs.cache.nummisszap",
        "vfs.cache.numneghits",
        "vfs.cache.numposhits",
        "vfs.cache.numposzaps",
        "vfs.flushwithdeps",
        "vfs.freevnodes",
        "vfs.getnewbufcalls",
        "vfs.numdirtybuffers",
        "vfs.numfreebuffers",
        "vfs.numvnodes",
        "vfs.reassignbufcalls",
        "vfs.recursiveflushes",
        "vfs.ufs.dirhash_mem",
        "vfs.worklist_len",
        "vm.pmap.pc_chunk_allocs",
        "vm.pmap.pc_chunk_count",
        "vm.pmap.pc_chunk_frees",
        "vm.pmap.pv_entry_allocs",
        "vm.pmap.pv_entry_count",
        "vm.pmap.pv_entry_frees",
        "vm.pmap.pv_entry_spare",
        "vm.stats.misc.zero_page_count",
        "vm.stats.object.bypasses",
        "vm.stats.object.collapses",
        "vm.stats.sys.v_intr",
        "vm.stats.sys.v_soft",
        "vm.stats.sys.v_swtch",
        "vm.stats.sys.v_syscall",
        "vm.stats.sys.v_trap",
        "vm.stats.vm.v_active_count",
        "vm.stats.vm.v_cache_count",
        "vm.stats.vm.v_cow_faults",
        "vm.stats.vm.v_forkpages",
        "vm.stats.vm.v_forks",
        "vm.stats.vm.v_free_count",
        "vm.stats.vm.v_inactive_count",
        "vm.stats.vm.v_intrans",
        "vm.stats.vm.v_pdpages",
        "vm.stats.vm.v_pdwakeups",
        "vm.stats.vm.v_reactivated",
        "vm.stats.vm.v_vnodein",
        "vm.stats.vm.v_vnodepgsin",
        "vm.stats.vm.v_ozfod",
        "vm.stats.vm.v_cow_optim",
        "vm.stats.vm.v_pfree",
        "vm.stats.vm.v_swapin",
        "vm.stats.vm.v_swapout",
        "vm.stats.vm.v_swappgsin",
        "vm.stats.vm.v_swappgsout",
        "vm.stats.vm.v_tcached",
        "vm.stats.vm.v_tfree",
        "vm.stats.vm.v_vforkpages",
        "vm.stats.vm.v_vforks",
        "vm.stats.vm.v_vnodeout",
        "vm.stats.vm.v_vnodepgsout",
        "vm.stats.vm.v_vm_faults",
        "vm.stats.vm.v_wire_count",
        "vm.stats.vm.v_zfod",
    ]
    .into_iter()
    .collect()
});

/// Ordered mapping of parameter name to string value, keys unique and sorted
/// for deterministic serialization. One set exists per host per poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    values: BTreeMap<String, String>,
}

impl ParameterSet {
    /// Parses inventory output. Lines not matching `<dotted.key>: <value>`
    /// are ignored without error; a repeated key keeps the last value.
    #[must_use]
    pub fn parse(output: &str) -> Self {
        let mut values = BTreeMap::new();
        for line in output.lines() {
            if let Some(captures) = PARAMETER_LINE.captures(line) {
                values.insert(captures[1].to_string(), captures[2].to_string());
            }
        }
        Self { values }
    }

    /// Drops every deny-listed key so transient system noise never reads as
    /// drift. Any key not on the list is considered semantically meaningful.
    #[must_use]
    pub fn without_volatile(mut self) -> Self {
        self.values
            .retain(|key, _| !VOLATILE_KEYS.contains(key.as_str()));
        self
    }

    /// Serializes as sorted `key : value` lines, one per line.
    #[must_use]
    pub fn to_snapshot_text(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.values {
            out.push_str(key);
            out.push_str(" : ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Number of parameters in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set holds no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Looks up a single parameter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Resolves the identifier a host is recorded under: the configured display
/// name if present, otherwise the canonical form of the resolvable hostname.
///
/// # Errors
/// Returns a [`ResolutionError`] when the hostname does not resolve; the
/// caller aborts this host's collection and continues with the rest.
pub fn resolve_host_id(host: &HostConfig) -> Result<String, ResolutionError> {
    if let Some(name) = &host.name {
        return Ok(name.clone());
    }
    let target = format!("{}:22", host.hostname);
    match target.to_socket_addrs() {
        Ok(mut addrs) => {
            if addrs.next().is_some() {
                Ok(host.hostname.trim_end_matches('.').to_lowercase())
            } else {
                Err(ResolutionError {
                    hostname: host.hostname.clone(),
                    reason: "resolver returned no addresses".to_string(),
                })
            }
        }
        Err(e) => Err(ResolutionError {
            hostname: host.hostname.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Gathers and compares one host's parameters against the stored snapshot.
pub struct ParameterCollector {
    host_id: String,
    category: String,
    command: String,
}

impl ParameterCollector {
    /// Builds a collector for one host and poll cycle.
    #[must_use]
    pub fn new(category: &str, host_id: &str, command: &str) -> Self {
        Self {
            host_id: host_id.to_string(),
            category: category.to_string(),
            command: command.to_string(),
        }
    }

    /// Repository-relative path of this host's stored snapshot.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.category)
            .join(&self.host_id)
            .join(PARAMETER_SNAPSHOT_FILE)
    }

    /// Runs the inventory command and returns the filtered parameter set.
    ///
    /// # Errors
    /// Returns a [`CollectionError`] on transport failure or when the output
    /// contains no parameter lines at all.
    pub fn collect(&self, executor: &mut dyn RemoteExecutor) -> Result<ParameterSet, CollectionError> {
        let output = executor.execute(&self.command)?;
        let parsed = ParameterSet::parse(&output);
        if parsed.is_empty() {
            return Err(CollectionError::Unparseable(format!(
                "no `key: value` lines in output of {:?}",
                self.command
            )));
        }
        let filtered = parsed.without_volatile();
        debug!(
            host = %self.host_id,
            parameters = filtered.len(),
            "collected parameters"
        );
        Ok(filtered)
    }

    /// Compares the current set against the stored snapshot and updates it.
    ///
    /// First observation stores the set unconditionally and reports no diff.
    /// Otherwise a non-empty diff stages and commits the new text and returns
    /// the rendered drift report; an empty diff leaves the stored snapshot
    /// untouched.
    ///
    /// # Errors
    /// Returns an error when the working-tree write, staging, or commit
    /// fails; the stored snapshot keeps its previous content in that case.
    pub fn compare_and_update(
        &self,
        current: &ParameterSet,
        repo: &mut dyn VersionedRepository,
    ) -> Result<String> {
        let rel = self.snapshot_path();
        let current_text = current.to_snapshot_text();
        let tracked = repo.list_tracked_files()?;

        if !tracked.contains(&rel) {
            // First observation is not drift.
            self.store(&current_text, repo)?;
            repo.commit(&format!("driftrec: record parameters for {}", self.host_id))?;
            return Ok(String::new());
        }

        let stored_text = fs::read_to_string(repo.data_dir().join(&rel))
            .with_context(|| format!("failed to read stored snapshot {}", rel.display()))?;
        let stored_lines: Vec<&str> = stored_text.lines().collect();
        let current_lines: Vec<&str> = current_text.lines().collect();
        let hunks = diff(&stored_lines, &current_lines);
        if hunks.is_empty() {
            return Ok(String::new());
        }

        self.store(&current_text, repo)?;
        repo.commit(&format!("driftrec: parameters changed on {}", self.host_id))?;
        Ok(format!(
            "--- Parameters modified on {} ---\n\n{}\n",
            self.host_id,
            render_hunks(&hunks, &stored_lines, &current_lines)
        ))
    }

    fn store(&self, text: &str, repo: &mut dyn VersionedRepository) -> Result<()> {
        let rel = self.snapshot_path();
        let abs = repo.data_dir().join(&rel);
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&abs, text)
            .with_context(|| format!("failed to write snapshot {}", rel.display()))?;
        repo.stage(&rel)
            .with_context(|| format!("failed to stage snapshot {}", rel.display()))?;
        Ok(())
    }
}
