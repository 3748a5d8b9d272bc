//! The message board store that request handlers talk to.
//!
//! MessageBoard owns the configuration, the two stores and the gate. It is
//! created once per process and shared by handlers through an `Arc`.
//!
//! **Write path**: exclusive gate → validate → append → increment → release
//! **Read path**: shared gate → read log + counter → release
//!
//! The write section covers BOTH the append and the increment, so no reader
//! ever sees a new line without its count, and writers are totally ordered.

use std::path::Path;

use crate::config::Config;
use crate::counter::Counter;
use crate::error::{BoardError, BoardResult, OpenError, StorageError, StorageResult, WritePhase};
use crate::gate::ConcurrencyGate;
use crate::log::MessageLog;
use crate::message::Message;
use crate::platform_durability::atomic_append_limit;

/// The log and the counter, guarded together.
#[derive(Debug)]
pub struct Stores {
    pub log: MessageLog,
    pub counter: Counter,
}

/// Result of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    /// Counter value after this message was counted
    pub count: u64,
}

/// Snapshot handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    /// Messages in append order
    pub messages: Vec<String>,
    /// Counter value
    pub count: u64,
}

impl BoardState {
    /// Log lines minus counter value. Zero unless a write failed (or the
    /// process died) between an append and its increment. Reported only;
    /// nothing reconciles it.
    pub fn drift(&self) -> i128 {
        self.messages.len() as i128 - self.count as i128
    }
}

/// Concurrency-safe message board persistence.
pub struct MessageBoard {
    gate: ConcurrencyGate<Stores>,
    config: Config,
}

impl MessageBoard {
    /// Open or create a board in `config.data_dir`.
    ///
    /// Validates the config, creates the directory, removes a counter temp
    /// file left by a crash, and reports any existing log/counter drift.
    pub fn open(config: Config) -> Result<Self, OpenError> {
        config.validate()?;

        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| StorageError::io(&config.data_dir, e, "Failed to create data directory"))?;

        let stores = Stores {
            log: MessageLog::new(config.log_path(), config.sync_writes),
            counter: Counter::new(
                config.counter_path(),
                config.counter_tmp_path(),
                config.sync_writes,
                config.counter_parse,
            ),
        };
        stores.counter.recover()?;

        if atomic_append_limit().is_none() {
            tracing::warn!("no atomic append guarantee on this platform, appends are serialized by the write lock only");
        }

        let board = Self { gate: ConcurrencyGate::new(stores), config };

        let state = board.get_state()?;
        if state.drift() != 0 {
            tracing::warn!(
                messages = state.messages.len(),
                count = state.count,
                drift = %state.drift(),
                "message log and counter disagree"
            );
        }

        tracing::info!(
            data_dir = %board.config.data_dir.display(),
            messages = state.messages.len(),
            count = state.count,
            max_atomic_append = board.config.max_atomic_append_size,
            sync_writes = board.config.sync_writes,
            "message board opened"
        );
        Ok(board)
    }

    /// Validate, append and count one message.
    ///
    /// `Ok` means both the append and the increment completed. After an
    /// error, [`BoardError::may_have_appended`] tells whether the log was
    /// touched and [`BoardError::counter_committed`] whether the new count
    /// is visible despite a failed directory sync.
    pub fn submit_message(&self, text: &str) -> BoardResult<Receipt> {
        trace_phase(WritePhase::Idle);
        trace_phase(WritePhase::AcquiringLock);
        let stores = self.gate.write();

        trace_phase(WritePhase::Validating);
        let message = Message::parse(text, self.config.max_atomic_append_size).map_err(|e| {
            tracing::debug!(error = %e, "message rejected");
            BoardError::from(e)
        })?;

        trace_phase(WritePhase::Appending);
        stores.log.append(&message).map_err(|e| storage_failure(WritePhase::Appending, e))?;

        trace_phase(WritePhase::Incrementing);
        let count = stores.counter.increment().map_err(|e| storage_failure(WritePhase::Incrementing, e))?;

        trace_phase(WritePhase::ReleasingLock);
        drop(stores);

        trace_phase(WritePhase::Done);
        Ok(Receipt { count })
    }

    /// All messages and the counter, read under shared access.
    pub fn get_state(&self) -> StorageResult<BoardState> {
        let stores = self.gate.read();
        let messages = stores.log.read_all()?;
        let count = stores.counter.read()?;
        Ok(BoardState { messages, count })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Number of completed or attempted write sections, for diagnostics.
    pub fn write_sections(&self) -> u64 {
        self.gate.write_count()
    }
}

fn trace_phase(phase: WritePhase) {
    tracing::trace!(%phase, "submit phase");
}

fn storage_failure(phase: WritePhase, source: StorageError) -> BoardError {
    tracing::warn!(%phase, error = %source, "message submission failed");
    BoardError::Storage { phase, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use std::fs;
    use tempfile::TempDir;

    fn test_board() -> (MessageBoard, TempDir) {
        let dir = TempDir::new().unwrap();
        let board = MessageBoard::open(Config::durable(dir.path())).unwrap();
        (board, dir)
    }

    #[test]
    fn test_open_empty() {
        let (board, _dir) = test_board();
        let state = board.get_state().unwrap();
        assert!(state.messages.is_empty());
        assert_eq!(state.count, 0);
        assert_eq!(state.drift(), 0);
    }

    #[test]
    fn test_open_creates_data_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let board = MessageBoard::open(Config::durable(&nested)).unwrap();
        assert!(nested.is_dir());
        assert_eq!(board.data_dir(), nested.as_path());
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let config = Config::durable(dir.path()).with_max_atomic_append_size(1);
        assert!(matches!(MessageBoard::open(config), Err(OpenError::Config(_))));
    }

    #[test]
    fn test_hello_world() {
        let (board, _dir) = test_board();
        assert_eq!(board.submit_message("hello").unwrap(), Receipt { count: 1 });
        assert_eq!(board.submit_message("world").unwrap(), Receipt { count: 2 });

        let state = board.get_state().unwrap();
        assert_eq!(state.messages, vec!["hello", "world"]);
        assert_eq!(state.count, 2);
    }

    #[test]
    fn test_newline_rejected_without_side_effects() {
        let (board, _dir) = test_board();
        board.submit_message("before").unwrap();
        let before = board.get_state().unwrap();

        let err = board.submit_message("a\nb").unwrap_err();
        assert!(matches!(err, BoardError::Validation(ValidationError::LineTerminator)));
        assert_eq!(board.get_state().unwrap(), before);
    }

    #[test]
    fn test_empty_rejected() {
        let (board, dir) = test_board();
        assert!(board.submit_message("   ").unwrap_err().is_validation());
        assert!(!dir.path().join("messages").exists());
        assert!(!dir.path().join("counter").exists());
    }

    #[test]
    fn test_length_boundary() {
        let (board, _dir) = test_board();
        assert!(board.submit_message(&"m".repeat(511)).is_ok());
        let err = board.submit_message(&"m".repeat(512)).unwrap_err();
        assert!(matches!(err, BoardError::Validation(ValidationError::TooLong { len: 512, max: 512 })));
        assert_eq!(board.get_state().unwrap().count, 1);
    }

    #[test]
    fn test_increment_failure_leaves_drift() {
        let (board, dir) = test_board();
        board.submit_message("counted").unwrap();

        // block the counter rename target
        let counter = dir.path().join("counter");
        fs::remove_file(&counter).unwrap();
        fs::create_dir(&counter).unwrap();
        fs::write(counter.join("occupied"), b"x").unwrap();

        let err = board.submit_message("uncounted").unwrap_err();
        assert!(err.may_have_appended());
        assert!(!dir.path().join("counter.tmp").exists());

        // restore a counter that reflects the last successful increment
        fs::remove_dir_all(&counter).unwrap();
        fs::write(&counter, "1\n").unwrap();

        let state = board.get_state().unwrap();
        assert_eq!(state.messages, vec!["counted", "uncounted"]);
        assert_eq!(state.count, 1);
        assert_eq!(state.drift(), 1);

        // the next increment does not reconcile; it only counts its own message
        assert_eq!(board.submit_message("later").unwrap().count, 2);
        assert_eq!(board.get_state().unwrap().drift(), 1);
    }

    #[test]
    fn test_append_failure_reports_phase() {
        let (board, dir) = test_board();
        // a directory where the log should be makes the open fail
        fs::create_dir(dir.path().join("messages")).unwrap();

        match board.submit_message("nowhere") {
            Err(BoardError::Storage { phase, .. }) => assert_eq!(phase, WritePhase::Appending),
            other => panic!("Expected Storage error, got {:?}", other),
        }
        assert!(!dir.path().join("counter").exists());
    }

    #[test]
    fn test_write_sections_counted() {
        let (board, _dir) = test_board();
        board.submit_message("one").unwrap();
        let _ = board.submit_message("");
        assert_eq!(board.write_sections(), 2);
    }
}
