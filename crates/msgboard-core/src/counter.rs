//! Crash-safe message counter
//!
//! The counter is one small file of decimal text. It is never modified in
//! place; every increment uses the atomic rename pattern:
//! 1. Write the new value to `<counter>.tmp` in the same directory
//! 2. durable_sync the temp file (when configured)
//! 3. Rename temp file over the counter (atomic on POSIX)
//! 4. durable_sync the directory so the rename survives power loss
//!
//! If the process dies before step 3 the old counter is intact and the temp
//! file is orphaned; `recover()` removes it on the next open. If the rename
//! itself fails, the temp file is removed before the error is returned.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::config::CounterParse;
use crate::error::{StorageError, StorageResult};
use crate::platform_durability::{durable_sync, sync_dir};

/// Longest slice of corrupt contents carried in an error
const CORRUPT_PREVIEW_LEN: usize = 32;

/// Durable counter backed by a single file.
#[derive(Debug, Clone)]
pub struct Counter {
    path: PathBuf,
    tmp_path: PathBuf,
    sync_writes: bool,
    parse: CounterParse,
}

impl Counter {
    /// `tmp_path` must be in the same directory as `path`.
    pub fn new<P: AsRef<Path>, T: AsRef<Path>>(
        path: P,
        tmp_path: T,
        sync_writes: bool,
        parse: CounterParse,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            tmp_path: tmp_path.as_ref().to_path_buf(),
            sync_writes,
            parse,
        }
    }

    /// Current value. A missing file reads as 0.
    ///
    /// Contents that are not UTF-8 decimal text, invalid bytes included,
    /// are corrupt: an error under `Strict`, 0 under `Lenient`.
    pub fn read(&self) -> StorageResult<u64> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::io(&self.path, e, "Failed to read counter")),
        };

        let parsed = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|text| text.trim().parse::<u64>().ok());
        match parsed {
            Some(value) => Ok(value),
            None => {
                let preview: String = String::from_utf8_lossy(&bytes)
                    .trim()
                    .chars()
                    .take(CORRUPT_PREVIEW_LEN)
                    .collect();
                match self.parse {
                    CounterParse::Strict => Err(StorageError::CorruptCounter {
                        path: self.path.clone(),
                        contents: preview,
                    }),
                    CounterParse::Lenient => {
                        tracing::warn!(
                            path = %self.path.display(),
                            contents = %preview,
                            "counter file unparsable, treating as 0"
                        );
                        Ok(0)
                    }
                }
            }
        }
    }

    /// Add one and atomically replace the counter file. Returns the new value.
    ///
    /// No temp file remains on any exit path. Every error except
    /// `SyncFailed` leaves the visible counter unchanged. `SyncFailed` means
    /// the directory sync after the rename failed: the new value is already
    /// visible but may not survive power loss.
    pub fn increment(&self) -> StorageResult<u64> {
        let next = self
            .read()?
            .checked_add(1)
            .ok_or_else(|| StorageError::CounterOverflow { path: self.path.clone() })?;
        self.replace(next)?;
        tracing::debug!(path = %self.path.display(), value = next, "counter incremented");
        Ok(next)
    }

    /// Remove a temp file orphaned by a crash between write and rename.
    ///
    /// Returns true if one was found. The visible counter is not touched.
    pub fn recover(&self) -> StorageResult<bool> {
        match fs::remove_file(&self.tmp_path) {
            Ok(()) => {
                tracing::warn!(
                    path = %self.tmp_path.display(),
                    "removed orphaned counter temp file from interrupted increment"
                );
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(&self.tmp_path, e, "Failed to remove orphaned counter temp file")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Steps 1-4 of the rename protocol for an already computed value.
    fn replace(&self, value: u64) -> StorageResult<()> {
        let contents = format!("{}\n", value);

        let mut tmp = TempFile::create(&self.tmp_path)?;
        tmp.file
            .write_all(contents.as_bytes())
            .map_err(|e| StorageError::io(&self.tmp_path, e, "Failed to write counter temp file"))?;
        if self.sync_writes {
            durable_sync(&tmp.file)
                .map_err(|e| StorageError::io(&self.tmp_path, e, "Counter temp file durable_sync failed"))?;
        }

        tmp.persist(&self.path)?;

        if self.sync_writes {
            if let Some(parent) = self.path.parent() {
                sync_dir(parent)
                    .map_err(|e| StorageError::sync(parent, e, "Failed to sync directory after counter rename"))?;
            }
        }
        Ok(())
    }
}

/// Temp file that deletes itself unless `persist` renamed it into place.
struct TempFile {
    path: PathBuf,
    file: File,
    persisted: bool,
}

impl TempFile {
    /// Create or truncate. A leftover file of the same name is reused.
    fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| StorageError::io(path, e, "Failed to create counter temp file"))?;
        Ok(Self { path: path.to_path_buf(), file, persisted: false })
    }

    /// Rename over `target`. Renames never cross filesystems here: the temp
    /// file shares the target's directory, and a failure is returned as is.
    fn persist(mut self, target: &Path) -> StorageResult<()> {
        fs::rename(&self.path, target)
            .map_err(|e| StorageError::io(target, e, "Failed to rename counter temp file"))?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove counter temp file");
            }
        }
    }
}
