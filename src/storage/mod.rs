//! Key-value blob persistence for the scheduler record.
//!
//! The scheduler only needs "load the last saved bytes" and "replace them".
//! [`FileBlobStore`] writes atomically (temp file + rename) under an advisory
//! lock so the `configure`/`event` commands can update the record while a
//! controller is running. [`MemoryBlobStore`] backs tests.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub trait BlobStore: Send {
    /// Last saved contents, or `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the saved contents.
    fn save(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Blob stored in a single file.
pub struct FileBlobStore {
    path: PathBuf,
}

impl FileBlobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn open_lock(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
            .with_context(|| format!("Failed to open lock file for {}", self.path.display()))
    }
}

impl BlobStore for FileBlobStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let lock = self.open_lock()?;
        lock.lock_shared()
            .with_context(|| format!("Failed to lock {}", self.path.display()))?;
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()));
        let _ = lock.unlock();
        bytes.map(Some)
    }

    fn save(&mut self, bytes: &[u8]) -> Result<()> {
        let lock = self.open_lock()?;
        lock.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", self.path.display()))?;

        let result = (|| -> Result<()> {
            let dir = self
                .path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let mut temp = tempfile::NamedTempFile::new_in(dir)
                .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
            temp.write_all(bytes)?;
            temp.flush()?;
            temp.persist(&self.path)
                .with_context(|| format!("Failed to write {}", self.path.display()))?;
            Ok(())
        })();

        let _ = lock.unlock();
        result
    }
}

// A panic while holding the lock leaves plain data behind; keep using it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory blob; clones share the same contents.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    contents: Arc<Mutex<Option<Vec<u8>>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(bytes: Vec<u8>) -> Self {
        let store = Self::default();
        *lock(&store.contents) = Some(bytes);
        store
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        lock(&self.contents).clone()
    }

    /// Number of `save` calls across all clones.
    pub fn save_count(&self) -> usize {
        *lock(&self.saves)
    }
}

impl BlobStore for MemoryBlobStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.contents())
    }

    fn save(&mut self, bytes: &[u8]) -> Result<()> {
        *lock(&self.contents) = Some(bytes.to_vec());
        *lock(&self.saves) += 1;
        Ok(())
    }
}
