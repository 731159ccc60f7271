//! Git subprocess backend.
//!
//! The working tree is a plain git checkout at `datadir`; every operation
//! shells out to the `git` binary. Diff text is still produced by the crate's
//! own diff engine so notifications look the same regardless of backend: the
//! old side of each changed file is read back via `git show HEAD:<path>`.

use super::VersionedRepository;
use crate::diff::render_file_diff;
use crate::error::{RepositoryError, StageError};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

const COMMIT_IDENTITY: [&str; 4] = [
    "-c",
    "user.name=driftrec",
    "-c",
    "user.email=driftrec@localhost",
];

/// Repository backed by a `git` subprocess.
pub struct GitRepository {
    data_dir: PathBuf,
    git_bin: PathBuf,
}

impl GitRepository {
    /// Opens the checkout at `datadir`, running `git init` on first use.
    ///
    /// # Errors
    /// Returns a [`RepositoryError`] if the `git` binary is missing or
    /// initialization fails.
    pub fn open(datadir: &Path) -> Result<Self, RepositoryError> {
        let git_bin = which::which("git")
            .map_err(|e| RepositoryError::Backend(format!("git binary not found: {e}")))?;
        fs::create_dir_all(datadir)?;

        let repo = Self {
            data_dir: datadir.to_path_buf(),
            git_bin,
        };
        if !datadir.join(".git").exists() {
            repo.git(&["init", "--quiet"])?;
        }
        Ok(repo)
    }

    fn git(&self, args: &[&str]) -> Result<String, RepositoryError> {
        let output = Command::new(&self.git_bin)
            .args(args)
            .current_dir(&self.data_dir)
            .stdin(Stdio::null())
            .output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(RepositoryError::Backend(format!(
                "git {}: {}",
                args.first().unwrap_or(&""),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    /// Old blob content for a path, or empty bytes when the path (or any
    /// commit at all) does not exist in HEAD.
    fn head_content(&self, path: &Path) -> Vec<u8> {
        let spec = format!("HEAD:{}", path.display());
        Command::new(&self.git_bin)
            .args(["show", &spec])
            .current_dir(&self.data_dir)
            .stdin(Stdio::null())
            .output()
            .ok()
            .filter(|output| output.status.success())
            .map_or_else(Vec::new, |output| output.stdout)
    }

    /// Paths with changes staged in the git index.
    fn staged_paths(&self) -> Result<BTreeSet<PathBuf>, RepositoryError> {
        let output = self.git(&["status", "--porcelain", "--no-renames"])?;
        let mut paths = BTreeSet::new();
        for line in output.lines() {
            if line.len() < 4 {
                continue;
            }
            // Porcelain format: XY <path>; X is the index-side status.
            let index_status = line.as_bytes()[0];
            if matches!(index_status, b'A' | b'M' | b'D') {
                paths.insert(PathBuf::from(line[3..].trim_matches('"')));
            }
        }
        Ok(paths)
    }
}

impl VersionedRepository for GitRepository {
    fn list_tracked_files(&self) -> Result<BTreeSet<PathBuf>, RepositoryError> {
        let output = self.git(&["ls-files"])?;
        Ok(output.lines().map(PathBuf::from).collect())
    }

    fn stage(&mut self, path: &Path) -> Result<(), StageError> {
        if !self.data_dir.join(path).is_file() {
            return Err(StageError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let spec = path.to_string_lossy();
        self.git(&["add", "--", &spec])?;
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<(), RepositoryError> {
        if !self.list_tracked_files()?.contains(path) {
            return Ok(());
        }
        let spec = path.to_string_lossy();
        self.git(&["rm", "--force", "--quiet", "--", &spec])?;
        Ok(())
    }

    fn commit(&mut self, message: &str) -> Result<String, RepositoryError> {
        let staged = self.staged_paths()?;
        if staged.is_empty() {
            return Ok(String::new());
        }

        let mut diff_text = String::new();
        for path in &staged {
            let old_bytes = self.head_content(path);
            let abs_path = self.data_dir.join(path);
            let new_bytes = if abs_path.exists() {
                fs::read(&abs_path)?
            } else {
                Vec::new()
            };
            diff_text.push_str(&render_file_diff(path, &old_bytes, &new_bytes));
        }

        let mut args: Vec<&str> = COMMIT_IDENTITY.to_vec();
        args.extend_from_slice(&["commit", "--quiet", "-m", message]);
        self.git(&args)?;

        debug!(files = staged.len(), "recorded git commit");
        Ok(diff_text)
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn git_available() -> bool {
        which::which("git").is_ok()
    }

    #[test]
    fn test_open_initializes_checkout() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let repo = GitRepository::open(dir.path()).unwrap();
        assert!(dir.path().join(".git").exists());
        assert!(repo.list_tracked_files().unwrap().is_empty());
    }

    #[test]
    fn test_stage_commit_remove_cycle() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let mut repo = GitRepository::open(dir.path()).unwrap();

        let rel = Path::new("etc/motd");
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join(rel), "welcome\n").unwrap();

        repo.stage(rel).unwrap();
        let diff = repo.commit("add motd").unwrap();
        assert!(diff.contains("+ welcome"));
        assert!(repo.list_tracked_files().unwrap().contains(rel));

        // No staged changes: idempotent no-op.
        assert_eq!(repo.commit("again").unwrap(), "");

        repo.remove(rel).unwrap();
        let diff = repo.commit("drop motd").unwrap();
        assert!(diff.contains("- welcome"));
        assert!(!dir.path().join(rel).exists());
        assert!(repo.list_tracked_files().unwrap().is_empty());
    }

    #[test]
    fn test_stage_missing_file_fails() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let mut repo = GitRepository::open(dir.path()).unwrap();
        assert!(matches!(
            repo.stage(Path::new("absent")),
            Err(StageError::NotFound { .. })
        ));
    }
}
