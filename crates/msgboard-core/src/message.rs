//! Validated board messages

use std::fmt;

use crate::error::ValidationError;

/// A message that is safe to append as one line.
///
/// Construction trims surrounding whitespace and enforces: non-empty, no
/// `\n` or `\r`, and `len + 1 <= max_atomic_append` so the line and its
/// terminator fit in a single indivisible append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message(String);

impl Message {
    pub fn parse(raw: &str, max_atomic_append: usize) -> Result<Self, ValidationError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(ValidationError::Empty);
        }
        if text.contains(['\n', '\r']) {
            return Err(ValidationError::LineTerminator);
        }
        if text.len() + 1 > max_atomic_append {
            return Err(ValidationError::TooLong { len: text.len(), max: max_atomic_append });
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The exact bytes written to the log: text plus `\n`.
    pub fn to_line(&self) -> Vec<u8> {
        let mut line = Vec::with_capacity(self.0.len() + 1);
        line.extend_from_slice(self.0.as_bytes());
        line.push(b'\n');
        line
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Message {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
