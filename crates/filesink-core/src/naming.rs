//! Names of rotated files.
//!
//! `logs/app.log` rotates to `logs/app.2024-03-10.log`, or
//! `logs/app.2024-03-10-13.log` with hourly rotation. Further rotations in the
//! same bucket append a sequence: `logs/app.2024-03-10.1.log`,
//! `logs/app.2024-03-10.2.log`, and so on.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::error::{SinkError, SinkResult};
use crate::policy::{day_bucket, hour_bucket};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Identifier appended to the base name of a retired file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RotationSuffix {
    /// Start of the bucket, truncated to the hour or the day
    pub period: NaiveDateTime,
    pub hourly: bool,
    pub sequence: Option<u32>,
}

impl RotationSuffix {
    /// Suffix for the bucket containing `period_start`.
    pub fn new(period_start: NaiveDateTime, hourly: bool) -> Self {
        let period = if hourly {
            hour_bucket(period_start)
        } else {
            day_bucket(period_start)
                .and_hms_opt(0, 0, 0)
                .unwrap_or(period_start)
        };
        Self {
            period,
            hourly,
            sequence: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Calendar day this suffix belongs to.
    pub fn date(&self) -> NaiveDate {
        self.period.date()
    }

    /// Parse the text between the base stem and extension, e.g.
    /// `2024-03-10-13.2`.
    pub fn parse(text: &str) -> Option<Self> {
        let (bucket, sequence) = match text.split_once('.') {
            Some((bucket, seq)) => {
                if seq.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let n: u32 = seq.parse().ok()?;
                if n == 0 {
                    return None;
                }
                (bucket, Some(n))
            }
            None => (text, None),
        };

        let (date_text, hour) = match bucket.len() {
            10 => (bucket, None),
            13 if bucket.as_bytes()[10] == b'-' => {
                let hour_text = &bucket[11..];
                if !hour_text.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let hour: u32 = hour_text.parse().ok()?;
                (&bucket[..10], Some(hour))
            }
            _ => return None,
        };

        let date = NaiveDate::parse_from_str(date_text, DATE_FORMAT).ok()?;
        // Reject loosely formatted dates that chrono accepts.
        if date.format(DATE_FORMAT).to_string() != date_text {
            return None;
        }

        let period = date.and_hms_opt(hour.unwrap_or(0), 0, 0)?;
        Some(Self {
            period,
            hourly: hour.is_some(),
            sequence,
        })
    }
}

impl fmt::Display for RotationSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.period.format(DATE_FORMAT))?;
        if self.hourly {
            write!(f, "-{:02}", self.period.hour())?;
        }
        if let Some(sequence) = self.sequence {
            write!(f, ".{sequence}")?;
        }
        Ok(())
    }
}

/// The active file name split into the parts rotated names are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseName {
    /// File name without its extension, e.g. `app`
    pub stem: String,
    /// Extension including the dot, e.g. `.log`, or empty
    pub extension: String,
}

impl BaseName {
    pub fn from_path(path: &Path) -> SinkResult<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| SinkError::Config(format!("{} has no file name", path.display())))?;
        let extension = match path.extension() {
            Some(ext) => {
                let ext = ext.to_str().ok_or_else(|| {
                    SinkError::Config(format!("{} has a non UTF-8 extension", path.display()))
                })?;
                format!(".{ext}")
            }
            None => String::new(),
        };

        Ok(Self {
            stem: stem.to_string(),
            extension,
        })
    }

    pub fn rotated_file_name(&self, suffix: &RotationSuffix) -> String {
        format!("{}.{}{}", self.stem, suffix, self.extension)
    }

    /// Recover the suffix from a rotated file name, or `None` if the name was
    /// not produced by [`BaseName::rotated_file_name`].
    pub fn parse_rotated(&self, file_name: &str) -> Option<RotationSuffix> {
        let rest = file_name.strip_prefix(&self.stem)?.strip_prefix('.')?;
        let middle = if self.extension.is_empty() {
            rest
        } else {
            rest.strip_suffix(&self.extension)?
        };
        RotationSuffix::parse(middle)
    }
}

/// Pick the path the active file is renamed to when it retires.
///
/// The first rotation of a bucket takes the bare suffix; later ones take the
/// smallest free sequence number. An existing file is never chosen.
pub fn next_rotated_path(
    active: &Path,
    period_start: NaiveDateTime,
    hourly: bool,
) -> SinkResult<PathBuf> {
    let base = BaseName::from_path(active)?;
    let suffix = RotationSuffix::new(period_start, hourly);

    let candidate = active.with_file_name(base.rotated_file_name(&suffix));
    if !candidate.exists() {
        return Ok(candidate);
    }

    for sequence in 1..=u32::MAX {
        let name = base.rotated_file_name(&suffix.with_sequence(sequence));
        let candidate = active.with_file_name(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(SinkError::Config(format!(
        "no free rotated file name left for {}",
        active.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 17, 42)
            .unwrap()
    }

    #[test]
    fn test_render_daily_and_hourly() {
        assert_eq!(RotationSuffix::new(at(2024, 3, 10, 9), false).to_string(), "2024-03-10");
        assert_eq!(RotationSuffix::new(at(2024, 3, 10, 9), true).to_string(), "2024-03-10-09");
        assert_eq!(
            RotationSuffix::new(at(2024, 3, 10, 9), true)
                .with_sequence(3)
                .to_string(),
            "2024-03-10-09.3"
        );
    }

    #[test]
    fn test_parse_suffixes() {
        let daily = RotationSuffix::parse("2024-03-10").unwrap();
        assert!(!daily.hourly);
        assert_eq!(daily.sequence, None);
        assert_eq!(daily.date(), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());

        let hourly = RotationSuffix::parse("2024-03-10-23.12").unwrap();
        assert!(hourly.hourly);
        assert_eq!(hourly.period.hour(), 23);
        assert_eq!(hourly.sequence, Some(12));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in [
            "",
            "2024-3-10",
            "2024-03-10-24",
            "2024-03-10-9x",
            "2024-03-10.",
            "2024-03-10.0",
            "2024-03-10.+1",
            "2024-13-01",
            "latest",
        ] {
            assert!(RotationSuffix::parse(bad).is_none(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_base_name_split() {
        let base = BaseName::from_path(Path::new("logs/my.app.log")).unwrap();
        assert_eq!(base.stem, "my.app");
        assert_eq!(base.extension, ".log");

        let bare = BaseName::from_path(Path::new("logs/app")).unwrap();
        assert_eq!(bare.extension, "");
        assert_eq!(
            bare.rotated_file_name(&RotationSuffix::new(at(2024, 1, 2, 0), false)),
            "app.2024-01-02"
        );
    }

    #[test]
    fn test_parse_rotated_roundtrip_names() {
        let base = BaseName::from_path(Path::new("app.log")).unwrap();
        let suffix = RotationSuffix::new(at(2024, 3, 10, 5), true).with_sequence(2);
        let name = base.rotated_file_name(&suffix);
        assert_eq!(name, "app.2024-03-10-05.2.log");
        assert_eq!(base.parse_rotated(&name), Some(suffix));

        assert_eq!(base.parse_rotated("app.log"), None);
        assert_eq!(base.parse_rotated("other.2024-03-10.log"), None);
        assert_eq!(base.parse_rotated("app.2024-03-10.txt"), None);
        assert_eq!(base.parse_rotated("application.2024-03-10.log"), None);
    }

    #[test]
    fn test_next_rotated_path_uses_sequence_on_collision() {
        let temp = TempDir::new().unwrap();
        let active = temp.path().join("app.log");
        let period = at(2024, 3, 10, 8);

        let first = next_rotated_path(&active, period, false).unwrap();
        assert_eq!(first, temp.path().join("app.2024-03-10.log"));
        std::fs::write(&first, "x").unwrap();

        let second = next_rotated_path(&active, period, false).unwrap();
        assert_eq!(second, temp.path().join("app.2024-03-10.1.log"));
        std::fs::write(&second, "x").unwrap();

        let third = next_rotated_path(&active, period, false).unwrap();
        assert_eq!(third, temp.path().join("app.2024-03-10.2.log"));
    }
}
