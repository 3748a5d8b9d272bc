//! Read/write gate over the board's shared state
//!
//! The log and the counter are guarded as ONE resource by a single RwLock.
//! Locking them separately would let a reader see an appended line whose
//! increment has not happened yet.
//!
//! Acquisition blocks the calling thread until granted. There is no timeout
//! and no deadlock detection; a writer that never returns stalls everyone.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Single shared read/write lock over a value `T`.
///
/// `read()` is AcquireRead; dropping the guard is ReleaseRead.
/// `write()` is AcquireWrite; dropping the guard is ReleaseWrite.
pub struct ConcurrencyGate<T> {
    inner: RwLock<T>,
    /// Write sections entered since creation
    writes: AtomicU64,
    /// Read sections entered since creation
    reads: AtomicU64,
}

impl<T> ConcurrencyGate<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
            writes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
        }
    }

    /// Shared access. Any number of readers, never alongside a writer.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        let guard = self.inner.read();
        self.reads.fetch_add(1, Ordering::Relaxed);
        guard
    }

    /// Exclusive access. Excludes every reader and every other writer.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        let guard = self.inner.write();
        self.writes.fetch_add(1, Ordering::Relaxed);
        guard
    }

    /// Total read sections entered.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total write sections entered.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}
