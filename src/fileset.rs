//! File-set scanning and change detection.
//!
//! A file set is an ordered list of include patterns minus an ordered list of
//! exclude patterns. Each pattern is an absolute filesystem path, optionally
//! carrying a wildcard in its final segment. Resolved targets are mirrored
//! into the repository working tree (namespaced by stripping the root path
//! component), and tracked files this set no longer matches are removed.

use crate::config::FileSetConfig;
use crate::repo::VersionedRepository;
use anyhow::{Context, Result};
use glob::Pattern;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Scans one file set against the repository and commits any drift.
///
/// Returns the rendered diff of the resulting commit, or an empty string
/// when nothing changed. Per-file staging failures are logged and skipped so
/// one unreadable file cannot block the rest of the set.
///
/// # Errors
/// Returns an error when the repository itself fails (listing, removal, or
/// commit); staged changes are left pending for the next cycle.
pub fn process_file_set(
    spec: &FileSetConfig,
    repo: &mut dyn VersionedRepository,
) -> Result<String> {
    let includes = resolve_patterns(&spec.include);
    let excludes = resolve_patterns(&spec.exclude);
    let targets: Vec<&PathBuf> = includes.difference(&excludes).collect();

    let mut remaining = repo.list_tracked_files()?;
    let mut changed = false;

    for source in targets {
        let rel = repo_relative(source);
        remaining.remove(&rel);

        let dest = repo.data_dir().join(&rel);
        match copy_if_newer(source, &dest) {
            Ok(false) => {}
            Ok(true) => match repo.stage(&rel) {
                Ok(()) => changed = true,
                Err(e) => {
                    warn!(file = %rel.display(), error = %e, "failed to stage, skipping this cycle");
                }
            },
            Err(e) => {
                warn!(file = %source.display(), error = %e, "failed to copy, skipping this cycle");
            }
        }
    }

    // Whatever is left was tracked before but is no longer matched by this
    // set: deleted from disk, or excluded. Only paths this set's include
    // patterns could have produced are candidates, so other sets and
    // parameter snapshots sharing the repository stay untouched.
    for leftover in &remaining {
        if matches_any_include(leftover, &spec.include) {
            repo.remove(leftover)?;
            changed = true;
        }
    }

    if !changed {
        return Ok(String::new());
    }
    debug!(fileset = %spec.name, "changes staged, committing");
    let message = format!("driftrec: update file set {}", spec.name);
    repo.commit(&message)
        .with_context(|| format!("failed to commit file set {}", spec.name))
}

/// Resolves patterns into a deduplicated set of canonical absolute paths.
///
/// A pattern with a wildcard in its final segment lists the containing
/// directory and collects every regular file whose name matches; a missing
/// directory yields zero matches. A pattern without a wildcard is accepted
/// only if it names an existing regular file.
fn resolve_patterns(patterns: &[String]) -> BTreeSet<PathBuf> {
    let mut resolved = BTreeSet::new();
    for raw in patterns {
        let path = PathBuf::from(raw);
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!(pattern = %raw, "pattern has no final segment, ignoring");
            continue;
        };

        if !has_wildcard(file_name) {
            if path.is_file()
                && let Ok(canonical) = fs::canonicalize(&path)
            {
                resolved.insert(canonical);
            }
            continue;
        }

        let Ok(pattern) = Pattern::new(file_name) else {
            warn!(pattern = %raw, "invalid wildcard pattern, ignoring");
            continue;
        };
        let Some(dir) = path.parent() else { continue };
        let Ok(entries) = fs::read_dir(dir) else {
            // Directory absent or unreadable: zero matches, not an error.
            continue;
        };
        for entry in entries.flatten() {
            let candidate = entry.path();
            if !candidate.is_file() {
                continue;
            }
            if let Some(name) = candidate.file_name().and_then(|n| n.to_str())
                && pattern.matches(name)
                && let Ok(canonical) = fs::canonicalize(&candidate)
            {
                resolved.insert(canonical);
            }
        }
    }
    resolved
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
}

/// Repository-relative destination for a source path: the absolute path with
/// its root component stripped, so `/etc/hosts` lands at `etc/hosts`.
fn repo_relative(source: &Path) -> PathBuf {
    source
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Copies `source` over `dest` when the source is newer than the working
/// tree copy (or the copy is absent). Returns whether a copy happened.
fn copy_if_newer(source: &Path, dest: &Path) -> Result<bool> {
    let source_mtime = fs::metadata(source)
        .and_then(|m| m.modified())
        .with_context(|| format!("cannot read mtime of {}", source.display()))?;
    let dest_mtime = fs::metadata(dest).and_then(|m| m.modified()).ok();

    if dest_mtime.is_some_and(|dest_mtime| source_mtime <= dest_mtime) {
        return Ok(false);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create repository folder {}", parent.display()))?;
    }
    fs::copy(source, dest)
        .with_context(|| format!("failed to copy {} into repository", source.display()))?;
    Ok(true)
}

/// Whether a tracked repository path could have been produced by one of this
/// set's include patterns.
fn matches_any_include(tracked: &Path, includes: &[String]) -> bool {
    let options = glob::MatchOptions {
        // A final-segment wildcard must not reach into subdirectories.
        require_literal_separator: true,
        ..glob::MatchOptions::new()
    };
    includes.iter().any(|raw| {
        let rel = repo_relative(Path::new(raw));
        match Pattern::new(&rel.to_string_lossy()) {
            Ok(pattern) => pattern.matches_path_with(tracked, options),
            Err(_) => rel == tracked,
        }
    })
}
