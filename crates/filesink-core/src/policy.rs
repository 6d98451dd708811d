//! Rotation decisions.
//!
//! Pure logic: given the stats of the active file, the writer configuration,
//! the wall-clock time of the pending write and its size, decide whether the
//! file must be retired first. Time buckets are compared on local wall-clock
//! time.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::config::WriterConfig;

/// Counters describing the active file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    /// Bytes flushed to the active file
    pub size_bytes: u64,
    /// Entries flushed to the active file
    pub line_count: u64,
    pub opened_at: NaiveDateTime,
    /// Start of the time period the active file belongs to
    pub period_start: NaiveDateTime,
}

impl FileStats {
    /// Stats for a freshly created, empty file.
    pub fn empty(now: NaiveDateTime) -> Self {
        Self {
            size_bytes: 0,
            line_count: 0,
            opened_at: now,
            period_start: now,
        }
    }
}

/// Why the active file has to be rotated, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDecision {
    None,
    BySize,
    ByLineCount,
    ByHour,
    ByDay,
}

impl RotationDecision {
    pub fn is_due(&self) -> bool {
        !matches!(self, RotationDecision::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RotationDecision::None => "none",
            RotationDecision::BySize => "size",
            RotationDecision::ByLineCount => "lines",
            RotationDecision::ByHour => "hour",
            RotationDecision::ByDay => "day",
        }
    }
}

/// Start of the hour containing `ts`.
pub fn hour_bucket(ts: NaiveDateTime) -> NaiveDateTime {
    // Every hour of a valid date has a valid HH:00:00.
    ts.date()
        .and_hms_opt(ts.hour(), 0, 0)
        .unwrap_or(ts)
}

/// Calendar day containing `ts`.
pub fn day_bucket(ts: NaiveDateTime) -> NaiveDate {
    ts.date()
}

/// Decide whether the active file must be rotated before appending
/// `pending_bytes`.
///
/// Checks run in precedence order and the first match wins: hour boundary,
/// day boundary, size, line count. Time boundaries only fire when `now` is in
/// a strictly later bucket than the file's period, so an entry stamped
/// slightly in the past never rotates a file that was just opened.
pub fn should_rotate(
    stats: &FileStats,
    config: &WriterConfig,
    now: NaiveDateTime,
    pending_bytes: u64,
) -> RotationDecision {
    if !config.rotate_enabled {
        return RotationDecision::None;
    }

    if config.hourly_rotation && hour_bucket(now) > hour_bucket(stats.period_start) {
        return RotationDecision::ByHour;
    }

    if config.daily_rotation && day_bucket(now) > day_bucket(stats.period_start) {
        return RotationDecision::ByDay;
    }

    // An empty file is never rotated for size; the oversized entry lands
    // alone in it instead.
    if config.max_size_bytes > 0
        && stats.size_bytes > 0
        && stats.size_bytes.saturating_add(pending_bytes) > config.max_size_bytes
    {
        return RotationDecision::BySize;
    }

    if config.max_lines > 0 && stats.line_count.saturating_add(1) > config.max_lines {
        return RotationDecision::ByLineCount;
    }

    RotationDecision::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn stats(size: u64, lines: u64, start: NaiveDateTime) -> FileStats {
        FileStats {
            size_bytes: size,
            line_count: lines,
            opened_at: start,
            period_start: start,
        }
    }

    fn config() -> WriterConfig {
        WriterConfig::new("logs/app.log")
            .with_daily_rotation(false)
            .with_hourly_rotation(false)
            .with_max_size_bytes(0)
            .with_max_lines(0)
    }

    #[test]
    fn test_disabled_never_rotates() {
        let cfg = WriterConfig::new("logs/app.log")
            .with_rotation(false)
            .with_max_lines(1)
            .with_max_size_bytes(1);
        let start = at(2024, 3, 10, 10, 0, 0);
        let now = at(2024, 3, 12, 10, 0, 0);
        assert_eq!(
            should_rotate(&stats(500, 500, start), &cfg, now, 100),
            RotationDecision::None
        );
    }

    #[test]
    fn test_hour_boundary() {
        let cfg = config().with_hourly_rotation(true);
        let start = at(2024, 3, 10, 10, 59, 59);
        assert_eq!(
            should_rotate(&stats(0, 0, start), &cfg, at(2024, 3, 10, 10, 59, 59), 1),
            RotationDecision::None
        );
        assert_eq!(
            should_rotate(&stats(0, 0, start), &cfg, at(2024, 3, 10, 11, 0, 0), 1),
            RotationDecision::ByHour
        );
    }

    #[test]
    fn test_day_boundary() {
        let cfg = config().with_daily_rotation(true);
        let start = at(2024, 3, 10, 23, 59, 59);
        assert_eq!(
            should_rotate(&stats(10, 1, start), &cfg, at(2024, 3, 10, 23, 59, 59), 1),
            RotationDecision::None
        );
        assert_eq!(
            should_rotate(&stats(10, 1, start), &cfg, at(2024, 3, 11, 0, 0, 1), 1),
            RotationDecision::ByDay
        );
    }

    #[test]
    fn test_hourly_takes_precedence_over_daily() {
        let cfg = config().with_daily_rotation(true).with_hourly_rotation(true);
        let start = at(2024, 3, 10, 23, 30, 0);
        assert_eq!(
            should_rotate(&stats(10, 1, start), &cfg, at(2024, 3, 11, 0, 0, 1), 1),
            RotationDecision::ByHour
        );
    }

    #[test]
    fn test_time_boundaries_precede_size() {
        let cfg = config().with_daily_rotation(true).with_max_size_bytes(10);
        let start = at(2024, 3, 10, 12, 0, 0);
        assert_eq!(
            should_rotate(&stats(9, 1, start), &cfg, at(2024, 3, 11, 12, 0, 0), 50),
            RotationDecision::ByDay
        );
    }

    #[test]
    fn test_earlier_timestamp_does_not_rotate() {
        let cfg = config().with_daily_rotation(true).with_hourly_rotation(true);
        let start = at(2024, 3, 11, 0, 0, 1);
        assert_eq!(
            should_rotate(&stats(10, 1, start), &cfg, at(2024, 3, 10, 23, 59, 59), 1),
            RotationDecision::None
        );
    }

    #[test]
    fn test_size_limit() {
        let cfg = config().with_max_size_bytes(100);
        let start = at(2024, 3, 10, 12, 0, 0);
        assert_eq!(
            should_rotate(&stats(90, 1, start), &cfg, start, 10),
            RotationDecision::None
        );
        assert_eq!(
            should_rotate(&stats(90, 1, start), &cfg, start, 11),
            RotationDecision::BySize
        );
    }

    #[test]
    fn test_size_limit_ignores_empty_file() {
        let cfg = config().with_max_size_bytes(100);
        let start = at(2024, 3, 10, 12, 0, 0);
        assert_eq!(
            should_rotate(&stats(0, 0, start), &cfg, start, 1000),
            RotationDecision::None
        );
    }

    #[test]
    fn test_line_limit() {
        let cfg = config().with_max_lines(3);
        let start = at(2024, 3, 10, 12, 0, 0);
        assert_eq!(
            should_rotate(&stats(10, 2, start), &cfg, start, 1),
            RotationDecision::None
        );
        assert_eq!(
            should_rotate(&stats(10, 3, start), &cfg, start, 1),
            RotationDecision::ByLineCount
        );
    }

    #[test]
    fn test_size_precedes_lines() {
        let cfg = config().with_max_lines(3).with_max_size_bytes(10);
        let start = at(2024, 3, 10, 12, 0, 0);
        assert_eq!(
            should_rotate(&stats(10, 3, start), &cfg, start, 1),
            RotationDecision::BySize
        );
    }

    #[test]
    fn test_hour_bucket_truncates() {
        assert_eq!(hour_bucket(at(2024, 3, 10, 13, 45, 12)), at(2024, 3, 10, 13, 0, 0));
    }
}
