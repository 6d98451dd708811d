//! The configuration bag a logging front-end hands over.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{
    FileMode, RetentionMode, RotationFailurePolicy, WriterConfig, DEFAULT_FILENAME,
    DEFAULT_FILE_MODE, DEFAULT_MAX_LINES, DEFAULT_MAX_RETAINED_DAYS, DEFAULT_MAX_SIZE_BYTES,
    DEFAULT_ROTATED_FILE_MODE,
};
use crate::error::{SinkError, SinkResult};
use crate::severity::Severity;

/// Loosely typed hook settings, as read from JSON.
///
/// Every key is optional and falls back to the documented default:
///
/// ```json
/// {
///   "filename": "logs/app.log",
///   "strip-colors": true,
///   "daily": true,
///   "hourly": true,
///   "max-days": 7,
///   "rotate": true,
///   "max-lines": 10000,
///   "max-size": 1024,
///   "perm": "0660",
///   "rotate-perm": "0440",
///   "level": "info"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HookConfig {
    pub filename: PathBuf,
    pub strip_colors: bool,
    pub daily: bool,
    pub hourly: bool,
    /// Negative values disable retention like zero does
    pub max_days: i64,
    pub rotate: bool,
    pub max_lines: u64,
    pub max_size: u64,
    pub perm: String,
    pub rotate_perm: String,
    /// Minimum severity written; all levels when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Severity>,
    pub retention: RetentionMode,
    pub on_rotation_failure: RotationFailurePolicy,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::from(DEFAULT_FILENAME),
            strip_colors: true,
            daily: true,
            hourly: true,
            max_days: i64::from(DEFAULT_MAX_RETAINED_DAYS),
            rotate: true,
            max_lines: DEFAULT_MAX_LINES,
            max_size: DEFAULT_MAX_SIZE_BYTES,
            perm: DEFAULT_FILE_MODE.to_string(),
            rotate_perm: DEFAULT_ROTATED_FILE_MODE.to_string(),
            level: None,
            retention: RetentionMode::default(),
            on_rotation_failure: RotationFailurePolicy::default(),
        }
    }
}

impl HookConfig {
    pub fn from_json_str(json: &str) -> SinkResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> SinkResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Resolve into typed writer settings. Fails on an empty filename or a
    /// malformed permission string.
    pub fn to_writer_config(&self) -> SinkResult<WriterConfig> {
        let max_days = u32::try_from(self.max_days.max(0)).unwrap_or(u32::MAX);

        let config = WriterConfig::new(self.filename.clone())
            .with_max_lines(self.max_lines)
            .with_max_size_bytes(self.max_size)
            .with_daily_rotation(self.daily)
            .with_hourly_rotation(self.hourly)
            .with_max_retained_days(max_days)
            .with_rotation(self.rotate)
            .with_file_mode(FileMode::parse(&self.perm)?)
            .with_rotated_file_mode(FileMode::parse(&self.rotate_perm)?)
            .with_min_severity(self.level)
            .with_retention_mode(self.retention)
            .with_rotation_failure_policy(self.on_rotation_failure);

        config.validate()?;
        Ok(config)
    }
}
