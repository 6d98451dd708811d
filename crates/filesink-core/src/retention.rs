//! Deletion of rotated files that have outlived the retention window.
//!
//! Only names produced by [`crate::naming`] are considered, so the active
//! file and anything else sharing the directory are left alone. The sweep
//! never touches the live file handle and can run while writes continue.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use chrono::{Days, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::{SinkError, SinkResult};
use crate::naming::BaseName;

/// Result of one sweep: what was removed and what could not be.
#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

impl SweepOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// The deleted paths, or [`SinkError::Retention`] if any deletion failed.
    pub fn into_result(self) -> SinkResult<Vec<PathBuf>> {
        if self.failed.is_empty() {
            Ok(self.deleted)
        } else {
            Err(SinkError::Retention {
                deleted: self.deleted,
                failed: self.failed,
            })
        }
    }
}

/// Applies the max-age policy to the rotated siblings of one active file.
#[derive(Debug, Clone)]
pub struct RetentionManager {
    directory: PathBuf,
    base: BaseName,
    max_retained_days: u32,
}

impl RetentionManager {
    pub fn new(active_path: &Path, max_retained_days: u32) -> SinkResult<Self> {
        let directory = match active_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self {
            directory,
            base: BaseName::from_path(active_path)?,
            max_retained_days,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_enabled(&self) -> bool {
        self.max_retained_days > 0
    }

    /// First day that is kept. Files dated strictly before it are eligible.
    pub fn cutoff(&self, now: NaiveDateTime) -> Option<NaiveDate> {
        if !self.is_enabled() {
            return None;
        }
        now.date()
            .checked_sub_days(Days::new(u64::from(self.max_retained_days)))
    }

    /// Names from `file_names` that should be deleted at `now`.
    pub fn eligible<'a, I>(&self, file_names: I, now: NaiveDateTime) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(cutoff) = self.cutoff(now) else {
            return Vec::new();
        };

        file_names
            .into_iter()
            .filter(|name| {
                self.base
                    .parse_rotated(name)
                    .is_some_and(|suffix| suffix.date() < cutoff)
            })
            .collect()
    }

    /// List the directory and delete every eligible rotated file.
    ///
    /// A failed deletion is recorded and the sweep moves on; only a failure
    /// to list the directory aborts it.
    #[tracing::instrument(
        skip_all,
        fields(dir = %self.directory.display(), days = self.max_retained_days)
    )]
    pub fn sweep(&self, now: NaiveDateTime) -> SinkResult<SweepOutcome> {
        self.sweep_with(now, |path| std::fs::remove_file(path))
    }

    fn sweep_with<F>(&self, now: NaiveDateTime, mut remove: F) -> SinkResult<SweepOutcome>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        let mut outcome = SweepOutcome::default();
        if !self.is_enabled() {
            return Ok(outcome);
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let Ok(entry) = entry else {
                continue;
            };
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        for name in self.eligible(names.iter().map(String::as_str), now) {
            let path = self.directory.join(name);
            match remove(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "deleted expired log file");
                    outcome.deleted.push(path);
                }
                // A concurrent sweep got there first.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to delete expired log file");
                    outcome.failed.push((path, e));
                }
            }
        }

        Ok(outcome)
    }
}

/// One-off sweep of `directory` for files rotated from `base_filename`.
/// Returns the deleted paths.
pub fn sweep(
    directory: &Path,
    base_filename: &str,
    max_retained_days: u32,
    now: NaiveDateTime,
) -> SinkResult<Vec<PathBuf>> {
    RetentionManager::new(&directory.join(base_filename), max_retained_days)?
        .sweep(now)?
        .into_result()
}

/// Log the result of a sweep that has no caller waiting on it.
pub(crate) fn report(result: SinkResult<SweepOutcome>) {
    match result {
        Ok(outcome) => {
            if !outcome.deleted.is_empty() {
                info!(
                    deleted = outcome.deleted.len(),
                    failed = outcome.failed.len(),
                    "retention sweep finished"
                );
            }
        }
        Err(e) => warn!(error = %e, "retention sweep failed"),
    }
}

/// Background thread running sweeps so writers never wait on directory
/// scans.
#[derive(Debug)]
pub struct RetentionWorker {
    tx: Option<mpsc::Sender<NaiveDateTime>>,
    handle: Option<JoinHandle<()>>,
}

impl RetentionWorker {
    pub fn spawn(manager: RetentionManager) -> SinkResult<Self> {
        let (tx, rx) = mpsc::channel::<NaiveDateTime>();

        let handle = thread::Builder::new()
            .name("filesink-retention".to_string())
            .spawn(move || {
                for now in rx {
                    report(manager.sweep(now));
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue a sweep for `now`. Never blocks.
    pub fn request(&self, now: NaiveDateTime) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(now).is_err() {
            warn!("retention worker is gone, sweep skipped");
        }
    }

    /// Stop accepting requests and wait for queued sweeps to finish.
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("retention worker panicked");
            }
        }
    }
}

impl Drop for RetentionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_eligible_respects_window() {
        let manager = RetentionManager::new(Path::new("logs/app.log"), 7).unwrap();
        let now = noon(2024, 3, 20);
        let names = [
            "app.2024-03-12.log",    // 8 days old
            "app.2024-03-13.log",    // 7 days old
            "app.2024-03-14.log",    // 6 days old
            "app.2024-03-01-23.4.log",
            "app.log",
            "other.2024-01-01.log",
            "app.notadate.log",
        ];

        let eligible = manager.eligible(names, now);
        assert_eq!(eligible, vec!["app.2024-03-12.log", "app.2024-03-01-23.4.log"]);
    }

    #[test]
    fn test_disabled_retention_deletes_nothing() {
        let manager = RetentionManager::new(Path::new("app.log"), 0).unwrap();
        assert!(!manager.is_enabled());
        assert!(manager
            .eligible(["app.1999-01-01.log"], noon(2024, 3, 20))
            .is_empty());
    }

    #[test]
    fn test_sweep_deletes_only_expired_files() {
        let temp = TempDir::new().unwrap();
        let active = temp.path().join("app.log");
        for name in ["app.log", "app.2024-03-12.log", "app.2024-03-14.log", "notes.txt"] {
            fs::write(temp.path().join(name), "x\n").unwrap();
        }

        let manager = RetentionManager::new(&active, 7).unwrap();
        let outcome = manager.sweep(noon(2024, 3, 20)).unwrap();

        assert!(outcome.is_clean());
        assert_eq!(outcome.deleted, vec![temp.path().join("app.2024-03-12.log")]);
        assert!(active.exists());
        assert!(temp.path().join("app.2024-03-14.log").exists());
        assert!(temp.path().join("notes.txt").exists());
    }

    #[test]
    fn test_sweep_ignores_directories_with_matching_names() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("app.2020-01-01.log")).unwrap();

        let manager = RetentionManager::new(&temp.path().join("app.log"), 1).unwrap();
        let outcome = manager.sweep(noon(2024, 3, 20)).unwrap();
        assert!(outcome.deleted.is_empty());
        assert!(temp.path().join("app.2020-01-01.log").is_dir());
    }

    #[test]
    fn test_sweep_missing_directory_is_error() {
        let temp = TempDir::new().unwrap();
        let manager = RetentionManager::new(&temp.path().join("gone/app.log"), 3).unwrap();
        assert!(matches!(
            manager.sweep(noon(2024, 3, 20)),
            Err(SinkError::Io(_))
        ));
    }

    #[test]
    fn test_one_off_sweep_returns_deleted_paths() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("svc.2024-01-01-07.log"), "x\n").unwrap();
        fs::write(temp.path().join("svc.2024-03-19.log"), "x\n").unwrap();

        let deleted = sweep(temp.path(), "svc.log", 7, noon(2024, 3, 20)).unwrap();
        assert_eq!(deleted, vec![temp.path().join("svc.2024-01-01-07.log")]);
        assert!(temp.path().join("svc.2024-03-19.log").exists());
    }

    #[test]
    fn test_sweep_continues_past_failed_deletion() {
        let temp = TempDir::new().unwrap();
        for name in ["app.2024-03-01.log", "app.2024-03-02.log", "app.2024-03-03.log"] {
            fs::write(temp.path().join(name), "x\n").unwrap();
        }
        let stuck = temp.path().join("app.2024-03-02.log");

        let manager = RetentionManager::new(&temp.path().join("app.log"), 7).unwrap();
        let outcome = manager
            .sweep_with(noon(2024, 3, 20), |path| {
                if path == stuck.as_path() {
                    Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
                } else {
                    fs::remove_file(path)
                }
            })
            .unwrap();

        let mut deleted = outcome.deleted.clone();
        deleted.sort();
        assert_eq!(
            deleted,
            vec![
                temp.path().join("app.2024-03-01.log"),
                temp.path().join("app.2024-03-03.log"),
            ]
        );
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, stuck);
        assert!(stuck.exists());
        assert!(matches!(
            outcome.into_result(),
            Err(SinkError::Retention { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_sweep_records_real_permission_failure() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let logs = temp.path().join("logs");
        fs::create_dir(&logs).unwrap();
        fs::write(logs.join("app.2024-03-01.log"), "x\n").unwrap();
        fs::set_permissions(&logs, fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users ignore directory permissions.
        let canary = logs.join(".writable");
        if fs::write(&canary, "").is_ok() {
            let _ = fs::remove_file(&canary);
            fs::set_permissions(&logs, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let manager = RetentionManager::new(&logs.join("app.log"), 7).unwrap();
        let outcome = manager.sweep(noon(2024, 3, 20)).unwrap();
        fs::set_permissions(&logs, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(outcome.deleted.is_empty());
        assert_eq!(outcome.failed.len(), 1);
        assert!(logs.join("app.2024-03-01.log").exists());
    }

    #[test]
    fn test_into_result_reports_failures() {
        let outcome = SweepOutcome {
            deleted: vec![PathBuf::from("a")],
            failed: vec![(PathBuf::from("b"), io::Error::other("busy"))],
        };
        match outcome.into_result() {
            Err(SinkError::Retention { deleted, failed }) => {
                assert_eq!(deleted.len(), 1);
                assert_eq!(failed.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_worker_drains_on_shutdown() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("app.2024-01-01.log"), "x\n").unwrap();

        let manager = RetentionManager::new(&temp.path().join("app.log"), 7).unwrap();
        let mut worker = RetentionWorker::spawn(manager).unwrap();
        worker.request(noon(2024, 3, 20));
        worker.shutdown();

        assert!(!temp.path().join("app.2024-01-01.log").exists());
    }
}
