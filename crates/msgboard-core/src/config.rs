//! Configuration for the message board stores
//!
//! Provides a durable preset for production use and a relaxed preset that
//! matches a board running without fsync, plus builder-style setters.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::platform_durability::atomic_append_limit;

/// Default size bound for a single appended line, terminator included
pub const DEFAULT_MAX_ATOMIC_APPEND: usize = 512;

/// Suffix appended to the counter file name for its temporary replacement
pub const COUNTER_TMP_SUFFIX: &str = ".tmp";

/// How to treat a counter file whose contents are not a decimal integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterParse {
    /// Report `StorageError::CorruptCounter`
    Strict,
    /// Treat unparsable contents as 0 and log a warning
    Lenient,
}

/// Message board configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the log, the counter and the counter's temp file
    pub data_dir: PathBuf,
    /// File name of the message log inside `data_dir`
    pub log_file_name: String,
    /// File name of the counter inside `data_dir`
    pub counter_file_name: String,
    /// Largest append, terminator included, trusted to land in one piece
    pub max_atomic_append_size: usize,
    /// Call `durable_sync` after every append and counter write
    pub sync_writes: bool,
    /// Handling of malformed counter contents
    pub counter_parse: CounterParse,
}

impl Config {
    /// Every write is synced; corrupt counters are errors.
    pub fn durable<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            log_file_name: "messages".to_string(),
            counter_file_name: "counter".to_string(),
            max_atomic_append_size: DEFAULT_MAX_ATOMIC_APPEND,
            sync_writes: true,
            counter_parse: CounterParse::Strict,
        }
    }

    /// Writes reach the page cache only; corrupt counters read as 0.
    pub fn relaxed<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            sync_writes: false,
            counter_parse: CounterParse::Lenient,
            ..Self::durable(data_dir)
        }
    }

    pub fn with_log_file_name(mut self, name: impl Into<String>) -> Self {
        self.log_file_name = name.into();
        self
    }

    pub fn with_counter_file_name(mut self, name: impl Into<String>) -> Self {
        self.counter_file_name = name.into();
        self
    }

    pub fn with_max_atomic_append_size(mut self, bytes: usize) -> Self {
        self.max_atomic_append_size = bytes;
        self
    }

    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    pub fn with_counter_parse(mut self, mode: CounterParse) -> Self {
        self.counter_parse = mode;
        self
    }

    /// Full path of the message log
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file_name)
    }

    /// Full path of the counter file
    pub fn counter_path(&self) -> PathBuf {
        self.data_dir.join(&self.counter_file_name)
    }

    /// Full path of the counter's temporary replacement file.
    ///
    /// Lives in `data_dir` so the rename never crosses a filesystem.
    pub fn counter_tmp_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}{}", self.counter_file_name, COUNTER_TMP_SUFFIX))
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError("data_dir must not be empty".into()));
        }
        check_file_name("log_file_name", &self.log_file_name)?;
        check_file_name("counter_file_name", &self.counter_file_name)?;
        if self.log_file_name == self.counter_file_name {
            return Err(ConfigError("log and counter must use different files".into()));
        }
        if self.log_file_name == format!("{}{}", self.counter_file_name, COUNTER_TMP_SUFFIX) {
            return Err(ConfigError("log file collides with the counter temp file".into()));
        }
        // one content byte plus the terminator
        if self.max_atomic_append_size < 2 {
            return Err(ConfigError("max_atomic_append_size must be >= 2".into()));
        }
        if let Some(limit) = atomic_append_limit() {
            if self.max_atomic_append_size > limit {
                return Err(ConfigError(format!(
                    "max_atomic_append_size {} exceeds the platform atomic append limit of {} bytes",
                    self.max_atomic_append_size, limit
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::durable("./data")
    }
}

fn check_file_name(field: &str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError(format!("{} must not be empty", field)));
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(ConfigError(format!("{} must be a plain file name, got {:?}", field, name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_valid() {
        assert!(Config::durable("/var/lib/board").validate().is_ok());
        assert!(Config::relaxed("/var/lib/board").validate().is_ok());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_presets_differ_in_durability() {
        let d = Config::durable("/b");
        let r = Config::relaxed("/b");
        assert!(d.sync_writes);
        assert!(!r.sync_writes);
        assert_eq!(d.counter_parse, CounterParse::Strict);
        assert_eq!(r.counter_parse, CounterParse::Lenient);
        assert_eq!(d.max_atomic_append_size, r.max_atomic_append_size);
    }

    #[test]
    fn test_derived_paths_share_directory() {
        let c = Config::durable("/srv/board");
        assert_eq!(c.log_path(), PathBuf::from("/srv/board/messages"));
        assert_eq!(c.counter_path(), PathBuf::from("/srv/board/counter"));
        assert_eq!(c.counter_tmp_path(), PathBuf::from("/srv/board/counter.tmp"));
        assert_eq!(c.counter_path().parent(), c.counter_tmp_path().parent());
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(Config::durable("/b").with_log_file_name("").validate().is_err());
        assert!(Config::durable("/b").with_log_file_name("a/b").validate().is_err());
        assert!(Config::durable("/b").with_log_file_name("counter").validate().is_err());
        assert!(Config::durable("/b").with_log_file_name("counter.tmp").validate().is_err());
        assert!(Config::durable("").validate().is_err());
    }

    #[test]
    fn test_append_bound_limits() {
        assert!(Config::durable("/b").with_max_atomic_append_size(1).validate().is_err());
        assert!(Config::durable("/b").with_max_atomic_append_size(2).validate().is_ok());
        if atomic_append_limit().is_some() {
            assert!(Config::durable("/b").with_max_atomic_append_size(4096).validate().is_err());
        }
    }
}
