//! Shared fixtures for the scenario tests.

use driftrec::config::FileSetConfig;
use driftrec::repo::LocalRepository;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Temp workspace with a source tree to scan and a repository data dir.
pub struct TestBed {
    pub root: TempDir,
    pub source: PathBuf,
    pub data: PathBuf,
}

impl TestBed {
    pub fn new() -> Self {
        let root = TempDir::new().expect("create temp workspace");
        let source = root.path().join("source");
        let data = root.path().join("data");
        fs::create_dir_all(&source).unwrap();
        Self { root, source, data }
    }

    pub fn repo(&self) -> LocalRepository {
        LocalRepository::open(&self.data).expect("open repository")
    }

    /// Writes a file under the source tree and returns its absolute path.
    pub fn write_source(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.source.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// Pushes a source file's mtime into the future so the scanner sees it
    /// as newer than any working-tree copy made earlier in the test.
    pub fn touch_newer(&self, name: &str, seconds_ahead: u64) {
        let path = self.source.join(name);
        let now = filetime::FileTime::now();
        let newer = filetime::FileTime::from_unix_time(
            now.unix_seconds() + i64::try_from(seconds_ahead).unwrap(),
            0,
        );
        filetime::set_file_mtime(&path, newer).unwrap();
    }

    /// Builds a file set over patterns relative to the source tree.
    pub fn fileset(&self, name: &str, include: &[&str], exclude: &[&str]) -> FileSetConfig {
        let absolute = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| self.source.join(p).to_string_lossy().into_owned())
                .collect()
        };
        FileSetConfig {
            name: name.to_string(),
            include: absolute(include),
            exclude: absolute(exclude),
        }
    }
}
