//! Error and warning types shared by the parsers.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Failure to turn a file (or a single field) into model data.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file is structurally invalid.
    #[error("{file}: malformed file: {reason}")]
    Malformed { file: String, reason: String },

    /// A byte is not valid in the timing system's code page.
    #[error("{file}: byte 0x{byte:02X} at offset {offset} is not valid in code page 1252")]
    Encoding { file: String, offset: usize, byte: u8 },

    /// A single time field could not be decoded.
    #[error("invalid time format: {0:?}")]
    InvalidTimeFormat(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    pub(crate) fn malformed(file: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            file: file.to_string(),
            reason: reason.into(),
        }
    }
}

/// A record that was skipped while the rest of its file parsed fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordWarning {
    /// 1-based line number, or 0 when the warning concerns the whole file.
    pub line: usize,
    pub reason: String,
}

impl RecordWarning {
    pub(crate) fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for RecordWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            f.write_str(&self.reason)
        } else {
            write!(f, "line {}: {}", self.line, self.reason)
        }
    }
}

/// Parsed data plus the record-level warnings collected on the way.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub value: T,
    pub warnings: Vec<RecordWarning>,
}

impl<T> Parsed<T> {
    pub const fn new(value: T, warnings: Vec<RecordWarning>) -> Self {
        Self { value, warnings }
    }
}
