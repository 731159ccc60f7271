//! Native snapshot backend.
//!
//! State lives under `<datadir>/.driftrec`: a bincode index of committed and
//! staged entries, `HEAD` with the last commit id, zstd-compressed snapshot
//! manifests in `commits/`, and content-addressed zstd objects in
//! `objects/`. The working tree is `<datadir>` itself.

use super::VersionedRepository;
use crate::ADMIN_DIR;
use crate::diff::render_file_diff;
use crate::error::{RepositoryError, StageError};
use fs4::fs_std::FileExt;
use memmap2::MmapOptions;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_128;
use zstd::stream::{decode_all, encode_all};

const INDEX_FILE: &str = "index.bin";
const HEAD_FILE: &str = "HEAD";
const COMMITS_DIR: &str = "commits";
const OBJECTS_DIR: &str = "objects";
const COMPRESSION_LEVEL: i32 = 3;
const MMAP_THRESHOLD: u64 = 1_048_576;

/// A tracked file entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the working tree root.
    pub path: PathBuf,
    /// XXH3 hash of file content.
    pub hash: String,
    /// File size in bytes.
    pub size: u64,
    /// Unix timestamp of last modification.
    pub modified: i64,
    /// Unix file permission mode.
    pub mode: u32,
}

/// A staged, not yet committed change.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum StagedChange {
    Update(FileEntry),
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Index {
    version: u32,
    entries: HashMap<PathBuf, FileEntry>,
    staged: HashMap<PathBuf, StagedChange>,
}

impl Index {
    fn new() -> Self {
        Self {
            version: 1,
            entries: HashMap::new(),
            staged: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommitMeta {
    id: String,
    parent: Option<String>,
    message: String,
    timestamp: i64,
    tree_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    commit: CommitMeta,
    files: HashMap<PathBuf, String>,
}

/// Repository backed by the native snapshot store.
pub struct LocalRepository {
    data_dir: PathBuf,
    admin_dir: PathBuf,
    index: Index,
}

impl LocalRepository {
    /// Opens the repository at `datadir`, implicitly initializing an empty
    /// working tree with no commits on first use.
    ///
    /// # Errors
    /// Returns a [`RepositoryError`] if the directories cannot be created or
    /// the index cannot be decoded.
    pub fn open(datadir: &Path) -> Result<Self, RepositoryError> {
        let admin_dir = datadir.join(ADMIN_DIR);
        fs::create_dir_all(admin_dir.join(COMMITS_DIR))?;
        fs::create_dir_all(admin_dir.join(OBJECTS_DIR))?;

        let index_path = admin_dir.join(INDEX_FILE);
        let index = if index_path.exists() {
            let data = fs::read(&index_path)?;
            deserialize(&data)?
        } else {
            Index::new()
        };

        Ok(Self {
            data_dir: datadir.to_path_buf(),
            admin_dir,
            index,
        })
    }

    /// Identifier of the last commit, if any history exists.
    ///
    /// # Errors
    /// Returns a [`RepositoryError`] if `HEAD` exists but cannot be read.
    pub fn head(&self) -> Result<Option<String>, RepositoryError> {
        let head_path = self.admin_dir.join(HEAD_FILE);
        if !head_path.exists() {
            return Ok(None);
        }
        let id = fs::read_to_string(head_path)?;
        let id = id.trim().to_string();
        Ok(if id.is_empty() { None } else { Some(id) })
    }

    fn save_index(&self) -> Result<(), RepositoryError> {
        let index_path = self.admin_dir.join(INDEX_FILE);
        let data = serialize(&self.index)?;

        let lock_file = File::create(self.admin_dir.join("index.lock"))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| RepositoryError::Lock(e.to_string()))?;

        // Write-then-rename keeps the index readable at every instant.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.admin_dir)?;
        tmp.write_all(&data)?;
        tmp.persist(&index_path).map_err(|e| e.error)?;

        FileExt::unlock(&lock_file).map_err(|e| RepositoryError::Lock(e.to_string()))?;
        Ok(())
    }

    fn store_object(&self, hash: &str, content: &[u8]) -> Result<(), RepositoryError> {
        let object_path = self.admin_dir.join(OBJECTS_DIR).join(format!("{hash}.zst"));
        if object_path.exists() {
            return Ok(());
        }
        let compressed = encode_all(content, COMPRESSION_LEVEL)?;
        fs::write(&object_path, compressed)?;
        Ok(())
    }

    fn load_object(&self, hash: &str) -> Result<Vec<u8>, RepositoryError> {
        let object_path = self.admin_dir.join(OBJECTS_DIR).join(format!("{hash}.zst"));
        let compressed = fs::read(&object_path)?;
        Ok(decode_all(&compressed[..])?)
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), RepositoryError> {
        let snapshot_path = self
            .admin_dir
            .join(COMMITS_DIR)
            .join(format!("{}.zst", snapshot.commit.id));
        let serialized = serialize(snapshot)?;
        let compressed = encode_all(&serialized[..], COMPRESSION_LEVEL)?;
        fs::write(snapshot_path, compressed)?;
        Ok(())
    }

    /// Effective staged changes: staged updates whose hash differs from the
    /// committed entry, plus staged deletes of files that are tracked.
    fn effective_changes(&self) -> BTreeMap<PathBuf, StagedChange> {
        self.index
            .staged
            .iter()
            .filter(|(path, change)| match change {
                StagedChange::Update(entry) => self
                    .index
                    .entries
                    .get(*path)
                    .is_none_or(|old| old.hash != entry.hash),
                StagedChange::Delete => self.index.entries.contains_key(*path),
            })
            .map(|(path, change)| (path.clone(), change.clone()))
            .collect()
    }
}

impl VersionedRepository for LocalRepository {
    fn list_tracked_files(&self) -> Result<BTreeSet<PathBuf>, RepositoryError> {
        Ok(self.index.entries.keys().cloned().collect())
    }

    fn stage(&mut self, path: &Path) -> Result<(), StageError> {
        let abs_path = self.data_dir.join(path);
        if !abs_path.is_file() {
            return Err(StageError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let entry = file_entry(&abs_path, path).map_err(|source| StageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.index
            .staged
            .insert(path.to_path_buf(), StagedChange::Update(entry));
        self.save_index()?;
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> Result<(), RepositoryError> {
        let tracked = self.index.entries.contains_key(path);
        let staged = self.index.staged.contains_key(path);
        if !tracked && !staged {
            return Ok(());
        }

        let abs_path = self.data_dir.join(path);
        match fs::remove_file(&abs_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if tracked {
            self.index
                .staged
                .insert(path.to_path_buf(), StagedChange::Delete);
        } else {
            // Staged-but-never-committed file: dropping the staged update
            // is the whole removal.
            self.index.staged.remove(path);
        }
        self.save_index()?;
        Ok(())
    }

    fn commit(&mut self, message: &str) -> Result<String, RepositoryError> {
        let changes = self.effective_changes();
        if changes.is_empty() {
            return Ok(String::new());
        }

        // Store objects for all updated files before touching any state.
        let updates: Vec<&FileEntry> = changes
            .values()
            .filter_map(|change| match change {
                StagedChange::Update(entry) => Some(entry),
                StagedChange::Delete => None,
            })
            .collect();
        let contents: Result<Vec<(String, Vec<u8>)>, RepositoryError> = updates
            .par_iter()
            .map(|entry| {
                let bytes = fs::read(self.data_dir.join(&entry.path))?;
                Ok((entry.hash.clone(), bytes))
            })
            .collect();
        let contents = contents?;
        for (hash, bytes) in &contents {
            self.store_object(hash, bytes)?;
        }
        let new_contents: HashMap<&str, &Vec<u8>> = contents
            .iter()
            .map(|(hash, bytes)| (hash.as_str(), bytes))
            .collect();

        // Render the tree diff while the old objects are still authoritative.
        let mut diff_text = String::new();
        for (path, change) in &changes {
            let old_bytes = match self.index.entries.get(path) {
                Some(old) => self.load_object(&old.hash)?,
                None => Vec::new(),
            };
            let new_bytes: &[u8] = match change {
                StagedChange::Update(entry) => new_contents
                    .get(entry.hash.as_str())
                    .map_or(&[] as &[u8], |bytes| bytes.as_slice()),
                StagedChange::Delete => &[],
            };
            diff_text.push_str(&render_file_diff(path, &old_bytes, new_bytes));
        }

        // Build the new tree.
        let mut new_entries = self.index.entries.clone();
        for (path, change) in &changes {
            match change {
                StagedChange::Update(entry) => {
                    new_entries.insert(path.clone(), entry.clone());
                }
                StagedChange::Delete => {
                    new_entries.remove(path);
                }
            }
        }

        let parent = self.head()?;
        let timestamp = chrono::Utc::now().timestamp();
        let tree: BTreeMap<&PathBuf, &FileEntry> = new_entries.iter().collect();
        let mut tree_content = String::new();
        for (path, entry) in &tree {
            tree_content.push_str(&format!("{} {}\n", entry.hash, path.display()));
        }
        let tree_hash = hash_bytes(tree_content.as_bytes());
        let id = hash_bytes(
            format!(
                "{}\n{}\n{}\n{}",
                tree_hash,
                parent.as_deref().unwrap_or(""),
                message,
                timestamp
            )
            .as_bytes(),
        );

        let snapshot = Snapshot {
            commit: CommitMeta {
                id: id.clone(),
                parent,
                message: message.to_string(),
                timestamp,
                tree_hash,
            },
            files: new_entries
                .iter()
                .map(|(path, entry)| (path.clone(), entry.hash.clone()))
                .collect(),
        };
        self.write_snapshot(&snapshot)?;
        fs::write(self.admin_dir.join(HEAD_FILE), &id)?;

        // Only now mutate the in-memory tree; staged changes survive any
        // failure above for retry on the next cycle.
        self.index.entries = new_entries;
        self.index.staged.clear();
        self.save_index()?;

        debug!(commit = %&id[..8.min(id.len())], files = changes.len(), "recorded snapshot");
        Ok(diff_text)
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn file_entry(abs_path: &Path, rel_path: &Path) -> Result<FileEntry, std::io::Error> {
    let metadata = fs::metadata(abs_path)?;
    let size = metadata.len();
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));

    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode()
    };
    #[cfg(not(unix))]
    let mode = 0o644;

    let hash = if size == 0 {
        String::from("00000000000000000000000000000000")
    } else if size < MMAP_THRESHOLD {
        hash_bytes(&fs::read(abs_path)?)
    } else {
        let file = File::open(abs_path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        hash_bytes(&mmap)
    };

    Ok(FileEntry {
        path: rel_path.to_path_buf(),
        hash,
        size,
        modified,
        mode,
    })
}

/// XXH3 128-bit hash of raw bytes, hex encoded.
#[must_use]
pub fn hash_bytes(data: &[u8]) -> String {
    let hash = xxh3_128(data);
    format!("{hash:032x}")
}

fn get_codec_config() -> impl bincode::config::Config {
    // Legacy configuration for serde compatibility; allocation limit guards
    // against corrupt index data.
    bincode::config::legacy().with_limit::<{ 100 * 1024 * 1024 }>()
}

fn serialize<T: serde::Serialize>(data: &T) -> Result<Vec<u8>, RepositoryError> {
    bincode::serde::encode_to_vec(data, get_codec_config())
        .map_err(|e| RepositoryError::Corrupt(e.to_string()))
}

fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, RepositoryError> {
    let (result, _bytes_read) = bincode::serde::decode_from_slice(bytes, get_codec_config())
        .map_err(|e| RepositoryError::Corrupt(e.to_string()))?;
    Ok(result)
}
