use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SinkError, SinkResult};
use crate::severity::Severity;

pub const DEFAULT_FILENAME: &str = "logs/app.log";
pub const DEFAULT_MAX_LINES: u64 = 10_000;
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 1024;
pub const DEFAULT_MAX_RETAINED_DAYS: u32 = 7;
pub const DEFAULT_FILE_MODE: &str = "0660";
pub const DEFAULT_ROTATED_FILE_MODE: &str = "0440";

/// Unix permission bits parsed from a textual octal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileMode(u32);

impl FileMode {
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & 0o7777)
    }

    /// Parse `"0660"`, `"660"` or `"0o660"`.
    pub fn parse(text: &str) -> SinkResult<Self> {
        let trimmed = text.trim();
        let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);

        let octal = digits.bytes().all(|b| (b'0'..=b'7').contains(&b));
        if digits.is_empty() || digits.len() > 5 || !octal {
            return Err(SinkError::InvalidMode(text.to_string()));
        }

        let bits = u32::from_str_radix(digits, 8)
            .map_err(|_| SinkError::InvalidMode(text.to_string()))?;
        if bits > 0o7777 {
            return Err(SinkError::InvalidMode(text.to_string()));
        }

        Ok(Self(bits))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl FromStr for FileMode {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

/// Where the retention sweep runs after a rotation.
///
/// Neither mode holds the write lock while scanning the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMode {
    /// On the writing thread, after the lock is released
    #[default]
    Inline,
    /// On a dedicated worker thread
    Background,
}

/// What a write does when the rotation it triggered fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationFailurePolicy {
    /// Append to the still-open file and report the rotation error
    #[default]
    Degrade,
    /// Report the rotation error without appending
    Fail,
}

/// Immutable settings for a [`FileWriter`](crate::FileWriter).
///
/// Reconfiguring means building a new writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Active file path; rotated files live next to it
    pub path: PathBuf,
    /// Maximum lines per file, 0 for unlimited
    pub max_lines: u64,
    /// Maximum bytes per file, 0 for unlimited
    pub max_size_bytes: u64,
    pub daily_rotation: bool,
    pub hourly_rotation: bool,
    /// Rotated files older than this many days are deleted, 0 disables
    pub max_retained_days: u32,
    /// Master switch for every rotation trigger
    pub rotate_enabled: bool,
    pub file_mode: FileMode,
    pub rotated_file_mode: FileMode,
    /// Carried for the adapter; the writer itself never filters
    pub min_severity: Option<Severity>,
    pub retention_mode: RetentionMode,
    pub on_rotation_failure: RotationFailurePolicy,
}

impl WriterConfig {
    /// Creates a configuration for `path` with the documented defaults.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_lines: DEFAULT_MAX_LINES,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            daily_rotation: true,
            hourly_rotation: true,
            max_retained_days: DEFAULT_MAX_RETAINED_DAYS,
            rotate_enabled: true,
            file_mode: FileMode::from_bits(0o660),
            rotated_file_mode: FileMode::from_bits(0o440),
            min_severity: None,
            retention_mode: RetentionMode::Inline,
            on_rotation_failure: RotationFailurePolicy::Degrade,
        }
    }

    pub fn with_max_lines(mut self, max_lines: u64) -> Self {
        self.max_lines = max_lines;
        self
    }

    pub fn with_max_size_bytes(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn with_daily_rotation(mut self, enabled: bool) -> Self {
        self.daily_rotation = enabled;
        self
    }

    pub fn with_hourly_rotation(mut self, enabled: bool) -> Self {
        self.hourly_rotation = enabled;
        self
    }

    pub fn with_max_retained_days(mut self, days: u32) -> Self {
        self.max_retained_days = days;
        self
    }

    pub fn with_rotation(mut self, enabled: bool) -> Self {
        self.rotate_enabled = enabled;
        self
    }

    pub fn with_file_mode(mut self, mode: FileMode) -> Self {
        self.file_mode = mode;
        self
    }

    pub fn with_rotated_file_mode(mut self, mode: FileMode) -> Self {
        self.rotated_file_mode = mode;
        self
    }

    pub fn with_min_severity(mut self, severity: Option<Severity>) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn with_retention_mode(mut self, mode: RetentionMode) -> Self {
        self.retention_mode = mode;
        self
    }

    pub fn with_rotation_failure_policy(mut self, policy: RotationFailurePolicy) -> Self {
        self.on_rotation_failure = policy;
        self
    }

    /// Directory holding the active and rotated files.
    pub fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Rejects paths that cannot name a regular file.
    pub fn validate(&self) -> SinkResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(SinkError::Config("log file path is empty".to_string()));
        }

        // Rotated names are built from the file name, so it must be UTF-8.
        if self.path.file_name().and_then(|n| n.to_str()).is_none() {
            return Err(SinkError::Config(format!(
                "log file path {} has no valid UTF-8 file name",
                self.path.display()
            )));
        }

        Ok(())
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FILENAME)
    }
}
