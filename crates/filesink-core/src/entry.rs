//! Log entry handed to the writer.

use chrono::{DateTime, Local};

use crate::severity::Severity;

/// A single rendered log entry.
///
/// The timestamp doubles as the `now` the writer uses for rotation
/// decisions, so replaying entries reproduces the same file layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
}

impl LogEntry {
    /// Create a new entry stamped with the current local time.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self::at(Local::now(), severity, message)
    }

    /// Create an entry with an explicit timestamp.
    pub fn at(timestamp: DateTime<Local>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            severity,
            message: message.into(),
        }
    }

    /// Bytes appended to the file for this entry: the message and a newline.
    pub fn encoded_len(&self) -> u64 {
        self.message.len() as u64 + 1
    }
}
