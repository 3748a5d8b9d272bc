//! Append-only message log
//!
//! Messages are stored one per line in a single UTF-8 file. The log is only
//! ever extended:
//! 1. Open the file with create + append (the OS positions every write at EOF)
//! 2. Write `message + "\n"` with ONE write call
//! 3. Optionally durable_sync() before reporting success
//!
//! A single append no larger than the platform's atomic-append limit is not
//! interleaved with other appenders, so a line is never torn. Message
//! validation keeps every line within that limit. The board additionally
//! serializes appends behind its write lock, so correctness does not rest on
//! filesystem atomicity alone.
//!
//! A short write is reported, not completed, so it leaves an unterminated
//! prefix at EOF. Nothing truncates it: the next successful append is joined
//! onto that prefix and both read back as one line. Errors raised after the
//! write call (`ShortWrite`, `SyncFailed`) therefore mean the log was touched.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{StorageError, StorageResult};
use crate::message::Message;
use crate::platform_durability::durable_sync;

/// The message log file. Holds no open handle between calls.
#[derive(Debug, Clone)]
pub struct MessageLog {
    path: PathBuf,
    sync_writes: bool,
}

impl MessageLog {
    /// The file is not created until the first append.
    pub fn new<P: AsRef<Path>>(path: P, sync_writes: bool) -> Self {
        Self { path: path.as_ref().to_path_buf(), sync_writes }
    }

    /// Append one message as a single line.
    ///
    /// Never seeks, truncates or retries. A short write is reported rather
    /// than completed with a second write, because a second write would no
    /// longer be covered by the single-append guarantee.
    pub fn append(&self, message: &Message) -> StorageResult<()> {
        let line = message.to_line();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::io(&self.path, e, "Failed to open message log"))?;

        let written = file
            .write(&line)
            .map_err(|e| StorageError::io(&self.path, e, "Message log write failed"))?;
        if written != line.len() {
            return Err(StorageError::ShortWrite {
                path: self.path.clone(),
                written,
                expected: line.len(),
            });
        }

        if self.sync_writes {
            durable_sync(&file)
                .map_err(|e| StorageError::sync(&self.path, e, "Message log durable_sync failed"))?;
        }

        tracing::debug!(path = %self.path.display(), bytes = line.len(), "appended message");
        Ok(())
    }

    /// Read every message in append order.
    ///
    /// A missing file is an empty log. The final terminator produces one
    /// trailing empty element, which is dropped; anything else is returned
    /// as stored.
    pub fn read_all(&self) -> StorageResult<Vec<String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.path, e, "Failed to read message log")),
        };

        let mut messages: Vec<String> = contents.split('\n').map(str::to_string).collect();
        if messages.last().is_some_and(|last| last.is_empty()) {
            messages.pop();
        }
        Ok(messages)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
