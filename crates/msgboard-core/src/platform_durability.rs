//! Platform-specific durability primitives
//!
//! The log and counter stores rely on three platform facts: how to force
//! file data to stable storage, how to make a rename durable, and how large
//! an `O_APPEND` write may be while staying indivisible with respect to
//! other appenders. Each is answered here with the strongest guarantee the
//! platform offers.

use std::fs::File;
use std::io;
use std::path::Path;

/// Largest append the platform is known to keep indivisible.
///
/// POSIX guarantees `PIPE_BUF` (at least 512 bytes) for pipes, and Linux,
/// macOS and the BSDs serialize `O_APPEND` writes of that size to regular
/// files on local filesystems. Elsewhere there is no documented guarantee and
/// this returns `None`; callers must then rely on their own locking.
pub fn atomic_append_limit() -> Option<usize> {
    #[cfg(unix)]
    {
        Some(512)
    }

    #[cfg(not(unix))]
    {
        None
    }
}

/// Ensures file data is durably written to persistent storage before returning.
///
/// Platform behaviors:
/// - Linux: fdatasync() - syncs data but not metadata (faster than fsync)
/// - macOS/iOS: fcntl(F_FULLFSYNC) - bypasses disk cache, ensures data reaches physical media
/// - Windows: FlushFileBuffers() - flushes internal buffers and requests device flush
/// - Other: file.sync_data() - Rust stdlib fallback
pub fn durable_sync(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: fdatasync operates on a descriptor borrowed from a live File.
        let result = unsafe { libc::fdatasync(fd) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        // Plain fsync() on Apple platforms stops at the drive's volatile cache.
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: fcntl(F_FULLFSYNC) operates on a descriptor borrowed from a live File.
        let result = unsafe { libc::fcntl(fd, libc::F_FULLFSYNC) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::io::AsRawHandle;
        use winapi::um::fileapi::FlushFileBuffers;
        let handle = file.as_raw_handle();
        // SAFETY: FlushFileBuffers operates on a handle borrowed from a live File.
        let result = unsafe { FlushFileBuffers(handle as *mut _) };
        if result != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios", target_os = "windows")))]
    {
        file.sync_data()
    }
}

/// Makes directory entry changes (create, rename) in `dir` durable.
///
/// Without this a renamed counter file can revert to its previous contents
/// after power loss even though the new file's data was synced.
/// Windows cannot open directories as files; NTFS journals renames, so this
/// is a no-op there.
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let handle = File::open(dir)?;
        handle.sync_all()
    }

    #[cfg(not(unix))]
    {
        let _ = dir;
        Ok(())
    }
}
