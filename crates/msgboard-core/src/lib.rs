//! msgboard core — crash-safe persistence for a minimal message board
//!
//! Clients submit short text messages; each is appended to a shared log and
//! counted in a running total. This crate is the part with invariants: HTTP
//! routing and page rendering live elsewhere and call two operations,
//! [`MessageBoard::submit_message`] and [`MessageBoard::get_state`].
//!
//! # Architecture
//!
//! - **Message log**: one append-only file, one message per line, each line
//!   written with a single bounded append
//! - **Counter**: one file of decimal text, replaced by write-temp-then-rename
//! - **Gate**: one RwLock over both, so a write section covers append AND
//!   increment and readers see both effects or neither
//!
//! # Drift
//!
//! A crash (or I/O failure) between an append and its increment leaves the
//! counter behind the log. This is accepted and reported through
//! [`BoardState::drift`]; nothing reconciles it.

pub mod board;
pub mod config;
pub mod counter;
pub mod error;
pub mod gate;
pub mod log;
pub mod message;
pub mod platform_durability;

// Re-export key types for convenience
pub use board::{BoardState, MessageBoard, Receipt, Stores};
pub use config::{Config, CounterParse};
pub use counter::Counter;
pub use error::{
    BoardError, BoardResult, ConfigError, OpenError, StorageError, StorageResult, ValidationError, WritePhase,
};
pub use gate::ConcurrencyGate;
pub use log::MessageLog;
pub use message::Message;
