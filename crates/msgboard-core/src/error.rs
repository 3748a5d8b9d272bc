//! Error types for message board persistence
//!
//! Two kinds of failure can reach a caller: a [`ValidationError`], raised
//! before anything touches disk, and a [`StorageError`], raised by the log
//! or counter store. [`BoardError`] combines them for `submit_message` and
//! records which write phase a storage failure happened in.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A submitted message was rejected. No file was touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Nothing left after trimming surrounding whitespace
    #[error("message is empty")]
    Empty,

    /// Message contains `\n` or `\r`
    #[error("message contains a line terminator")]
    LineTerminator,

    /// Message plus its terminator would exceed the atomic-append bound
    #[error("message too long: {len} bytes plus terminator exceeds limit of {max} bytes")]
    TooLong {
        /// Byte length of the trimmed message
        len: usize,
        /// Configured atomic-append bound
        max: usize,
    },
}

/// Failure while reading or writing the log or counter file.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// I/O operation failed
    #[error("I/O error in {}: {message} ({kind})", path.display())]
    Io {
        /// The file path where the error occurred
        path: PathBuf,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// The OS accepted fewer bytes than the line being appended
    #[error("short write to {}: wrote {written} of {expected} bytes", path.display())]
    ShortWrite {
        path: PathBuf,
        written: usize,
        expected: usize,
    },

    /// Bytes were written but forcing them (or a rename) to stable storage
    /// failed. The write itself is already visible to readers.
    #[error("sync failed for {}: {message} ({kind})", path.display())]
    SyncFailed {
        path: PathBuf,
        kind: std::io::ErrorKind,
        message: String,
    },

    /// Counter file exists but does not hold a decimal integer
    #[error("counter file {} is corrupt: {contents:?}", path.display())]
    CorruptCounter {
        path: PathBuf,
        /// Trimmed file contents, truncated for display
        contents: String,
    },

    /// Counter is already at `u64::MAX`
    #[error("counter in {} cannot be incremented past u64::MAX", path.display())]
    CounterOverflow { path: PathBuf },
}

impl StorageError {
    /// Wrap an I/O error with the path it happened on and what was being done.
    pub(crate) fn io(path: &Path, err: std::io::Error, action: &str) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            kind: err.kind(),
            message: format!("{}: {}", action, err),
        }
    }

    /// Wrap a failed durable_sync / sync_dir that followed a completed write.
    pub(crate) fn sync(path: &Path, err: std::io::Error, action: &str) -> Self {
        StorageError::SyncFailed {
            path: path.to_path_buf(),
            kind: err.kind(),
            message: format!("{}: {}", action, err),
        }
    }

    /// True when the failure happened after bytes reached the file.
    pub fn after_write(&self) -> bool {
        matches!(self, StorageError::ShortWrite { .. } | StorageError::SyncFailed { .. })
    }
}

/// Where in a write request a storage failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePhase {
    Idle,
    AcquiringLock,
    Validating,
    Appending,
    Incrementing,
    ReleasingLock,
    Done,
}

impl fmt::Display for WritePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WritePhase::Idle => "idle",
            WritePhase::AcquiringLock => "acquiring lock",
            WritePhase::Validating => "validating",
            WritePhase::Appending => "appending",
            WritePhase::Incrementing => "incrementing",
            WritePhase::ReleasingLock => "releasing lock",
            WritePhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a failed `submit_message`.
#[derive(Debug, Clone, Error)]
pub enum BoardError {
    #[error("invalid message: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage failure while {phase}: {source}")]
    Storage {
        phase: WritePhase,
        #[source]
        source: StorageError,
    },
}

impl BoardError {
    pub fn is_validation(&self) -> bool {
        matches!(self, BoardError::Validation(_))
    }

    /// True if the message line, or part of it, may already be in the log.
    ///
    /// An increment failure happens after a completed append, so the counter
    /// is left one behind the log. An append that failed after its write (a
    /// short write, or a sync error) has also touched the log. That drift is
    /// accepted, not repaired.
    pub fn may_have_appended(&self) -> bool {
        match self {
            BoardError::Storage { phase: WritePhase::Incrementing, .. } => true,
            BoardError::Storage { phase: WritePhase::Appending, source } => source.after_write(),
            _ => false,
        }
    }

    /// True if the increment was renamed into place but the directory sync
    /// that makes it durable failed. The message is appended AND counted.
    pub fn counter_committed(&self) -> bool {
        matches!(
            self,
            BoardError::Storage { phase: WritePhase::Incrementing, source: StorageError::SyncFailed { .. } }
        )
    }

    /// The storage error, if this was not a validation failure.
    pub fn storage(&self) -> Option<&StorageError> {
        match self {
            BoardError::Storage { source, .. } => Some(source),
            BoardError::Validation(_) => None,
        }
    }
}

/// Configuration rejected at `MessageBoard::open`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// Failure to open a board.
#[derive(Debug, Clone, Error)]
pub enum OpenError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type alias for store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for board write operations
pub type BoardResult<T> = Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_display_includes_path_and_action() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StorageError::io(Path::new("/tmp/board/counter"), io_err, "Failed to open counter");

        let display = format!("{}", err);
        assert!(display.contains("/tmp/board/counter"));
        assert!(display.contains("Failed to open counter"));
        assert!(!err.after_write());
    }

    #[test]
    fn test_append_failures_after_write_may_have_appended() {
        let path = PathBuf::from("messages");

        let short = BoardError::Storage {
            phase: WritePhase::Appending,
            source: StorageError::ShortWrite { path: path.clone(), written: 3, expected: 6 },
        };
        assert!(short.may_have_appended());

        let eio = std::io::Error::new(std::io::ErrorKind::Other, "EIO");
        let unsynced = BoardError::Storage {
            phase: WritePhase::Appending,
            source: StorageError::sync(&path, eio, "Message log durable_sync failed"),
        };
        assert!(unsynced.may_have_appended());
        assert!(format!("{}", unsynced).contains("sync failed"));

        assert!(!unsynced.counter_committed());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let open_failed = BoardError::Storage {
            phase: WritePhase::Appending,
            source: StorageError::io(&path, denied, "Failed to open message log"),
        };
        assert!(!open_failed.may_have_appended());
    }

    #[test]
    fn test_unsynced_rename_is_committed() {
        let eio = std::io::Error::new(std::io::ErrorKind::Other, "EIO");
        let err = BoardError::Storage {
            phase: WritePhase::Incrementing,
            source: StorageError::sync(Path::new("/srv/board"), eio, "Failed to sync directory after counter rename"),
        };
        assert!(err.counter_committed());
        assert!(err.may_have_appended());

        let overflow = BoardError::Storage {
            phase: WritePhase::Incrementing,
            source: StorageError::CounterOverflow { path: PathBuf::from("counter") },
        };
        assert!(!overflow.counter_committed());
    }

    #[test]
    fn test_too_long_display() {
        let err = ValidationError::TooLong { len: 512, max: 512 };
        let display = format!("{}", err);
        assert!(display.contains("512 bytes"));
    }

    #[test]
    fn test_board_error_phase() {
        let source = StorageError::CounterOverflow { path: PathBuf::from("counter") };

        let during_increment = BoardError::Storage { phase: WritePhase::Incrementing, source: source.clone() };
        assert!(during_increment.may_have_appended());
        assert!(!during_increment.is_validation());
        assert!(format!("{}", during_increment).contains("while incrementing"));

        let during_append = BoardError::Storage { phase: WritePhase::Appending, source };
        assert!(!during_append.may_have_appended());
        assert!(during_append.storage().is_some());

        let invalid: BoardError = ValidationError::Empty.into();
        assert!(!invalid.may_have_appended());
        assert!(invalid.is_validation());
        assert!(invalid.storage().is_none());
    }
}
