//! Versioned repository abstraction.
//!
//! A repository owns a working tree of tracked files and persists one
//! snapshot per commit. The scanner and collector drive it exclusively
//! through [`VersionedRepository`]; backends are swappable variants selected
//! by configuration and share no state.

pub mod git;
pub mod local;

pub use git::GitRepository;
pub use local::LocalRepository;

use crate::config::BackendKind;
use crate::error::{RepositoryError, StageError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Capability contract shared by all snapshot backends.
pub trait VersionedRepository {
    /// Current snapshot's file listing, paths relative to the working tree
    /// root.
    ///
    /// # Errors
    /// Returns a [`RepositoryError`] if the tracked state cannot be read.
    fn list_tracked_files(&self) -> Result<BTreeSet<PathBuf>, RepositoryError>;

    /// Marks a file's current on-disk content for inclusion in the next
    /// commit. `path` is relative to [`data_dir`](Self::data_dir).
    ///
    /// # Errors
    /// Returns [`StageError::NotFound`] if the path does not exist under the
    /// working tree.
    fn stage(&mut self, path: &Path) -> Result<(), StageError>;

    /// Marks a tracked file for deletion in the next commit and deletes the
    /// on-disk working-tree copy. No-op if the path is not tracked.
    ///
    /// # Errors
    /// Returns a [`RepositoryError`] if the removal cannot be recorded.
    fn remove(&mut self, path: &Path) -> Result<(), RepositoryError>;

    /// Atomically records all staged changes as one snapshot and returns the
    /// rendered diff between the previous snapshot's tree and the new one.
    ///
    /// If nothing is staged this is an idempotent no-op returning an empty
    /// string. A failed commit leaves staged changes pending for the next
    /// cycle.
    ///
    /// # Errors
    /// Returns a [`RepositoryError`] on backend failure.
    fn commit(&mut self, message: &str) -> Result<String, RepositoryError>;

    /// Root of the working tree; callers join repository-relative paths onto
    /// this to place copied content.
    fn data_dir(&self) -> &Path;
}

/// Opens the backend selected by configuration, initializing empty history
/// at `datadir` on first use.
///
/// # Errors
/// Returns a [`RepositoryError`] if the backend cannot be opened or
/// initialized.
pub fn open(
    kind: BackendKind,
    datadir: &Path,
) -> Result<Box<dyn VersionedRepository>, RepositoryError> {
    match kind {
        BackendKind::Local => Ok(Box::new(LocalRepository::open(datadir)?)),
        BackendKind::Git => Ok(Box::new(GitRepository::open(datadir)?)),
    }
}
