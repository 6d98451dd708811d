//! The rotating file writer.
//!
//! One mutex guards the whole check-rotate-append sequence so concurrent
//! writers never interleave partial lines and never both decide to rotate.
//! Diagnostics and retention sweeps happen after the lock is released.

mod active;
use active::{set_mode, ActiveFile};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::{RetentionMode, RotationFailurePolicy, WriterConfig};
use crate::entry::LogEntry;
use crate::error::{SinkError, SinkResult};
use crate::naming;
use crate::policy::{self, FileStats, RotationDecision};
use crate::retention::{self, RetentionManager, RetentionWorker, SweepOutcome};

/// A completed rotation.
struct Retired {
    decision: RotationDecision,
    path: PathBuf,
}

/// Everything the locked section produced, handled once the lock is gone.
struct LockedWrite {
    retired: Option<Retired>,
    rotation_error: Option<(RotationDecision, SinkError)>,
    append: SinkResult<()>,
}

/// Appends log lines to a file, rotating it on size, line-count, hour or day
/// boundaries and pruning rotated files past the retention window.
///
/// The writer is `Sync`; share it between producer threads with an `Arc`.
pub struct FileWriter {
    config: WriterConfig,
    active: Mutex<Option<ActiveFile>>,
    retention: Option<RetentionManager>,
    worker: Mutex<Option<RetentionWorker>>,
}

impl FileWriter {
    /// Open the writer at the current local time.
    pub fn new(config: WriterConfig) -> SinkResult<Self> {
        Self::open_at(config, Local::now())
    }

    /// Open the writer as if the current time were `now`.
    ///
    /// The active file is created along with its parent directories. If
    /// retention is enabled, rotated files already past the window are
    /// removed before this returns.
    pub fn open_at(config: WriterConfig, now: DateTime<Local>) -> SinkResult<Self> {
        config.validate()?;
        let now = now.naive_local();

        let active = ActiveFile::open(&config.path, config.file_mode, now)?;
        let stats = active.stats();

        let retention = if config.rotate_enabled && config.max_retained_days > 0 {
            Some(RetentionManager::new(&config.path, config.max_retained_days)?)
        } else {
            None
        };

        let worker = match (&retention, config.retention_mode) {
            (Some(manager), RetentionMode::Background) => {
                Some(RetentionWorker::spawn(manager.clone())?)
            }
            _ => None,
        };

        info!(
            path = %config.path.display(),
            size = stats.size_bytes,
            lines = stats.line_count,
            "opened log file"
        );

        let writer = Self {
            config,
            active: Mutex::new(Some(active)),
            retention,
            worker: Mutex::new(worker),
        };
        writer.dispatch_sweep(now);

        Ok(writer)
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Counters of the active file, or `None` once closed.
    pub fn stats(&self) -> Option<FileStats> {
        self.active.lock().as_ref().map(|active| active.stats())
    }

    /// Append `entry.message` and a newline, rotating first if a limit or
    /// time boundary has been crossed.
    ///
    /// No severity filtering happens here. If the rotation fails the entry is
    /// still appended to the old file and [`SinkError::Rotation`] is
    /// returned, unless the config asks to fail instead.
    pub fn write(&self, entry: &LogEntry) -> SinkResult<()> {
        self.write_message(entry.timestamp, &entry.message)
    }

    /// Append `message` as one line stamped `timestamp`.
    pub fn write_message(&self, timestamp: DateTime<Local>, message: &str) -> SinkResult<()> {
        let mut line = Vec::with_capacity(message.len() + 1);
        line.extend_from_slice(message.as_bytes());
        line.push(b'\n');

        let now = timestamp.naive_local();

        let locked = {
            let mut guard = self.active.lock();
            let active = guard.as_mut().ok_or(SinkError::Closed)?;
            self.write_locked(active, now, &line)
        };

        self.finish(locked, now)
    }

    fn write_locked(
        &self,
        active: &mut ActiveFile,
        now: NaiveDateTime,
        line: &[u8],
    ) -> LockedWrite {
        let pending = line.len() as u64;
        let decision = policy::should_rotate(&active.stats(), &self.config, now, pending);

        let mut retired = None;
        let mut rotation_error = None;

        if decision.is_due() {
            match self.rotate(active, now) {
                Ok((path, chmod_error)) => {
                    retired = Some(Retired { decision, path });
                    rotation_error = chmod_error.map(|e| (decision, e));
                }
                Err(e) => match self.config.on_rotation_failure {
                    RotationFailurePolicy::Fail => {
                        return LockedWrite {
                            retired: None,
                            rotation_error: None,
                            append: Err(e),
                        };
                    }
                    RotationFailurePolicy::Degrade => rotation_error = Some((decision, e)),
                },
            }
        }

        LockedWrite {
            retired,
            rotation_error,
            append: active.append(line),
        }
    }

    /// Retire the active file and swap in a fresh one.
    ///
    /// On error the old file stays active and untouched. A failure to apply
    /// the rotated mode does not undo the rotation and is handed back
    /// separately.
    fn rotate(
        &self,
        active: &mut ActiveFile,
        now: NaiveDateTime,
    ) -> SinkResult<(PathBuf, Option<SinkError>)> {
        active.sync()?;

        let period_start = active.stats().period_start;
        // Periods only move forward, even for entries stamped out of order.
        let now = now.max(period_start);

        let path = &self.config.path;
        let retired = naming::next_rotated_path(path, period_start, self.config.hourly_rotation)?;

        fs::rename(path, &retired).map_err(|source| SinkError::Rename {
            from: path.clone(),
            to: retired.clone(),
            source,
        })?;

        let fresh = match ActiveFile::open(path, self.config.file_mode, now) {
            Ok(fresh) => fresh,
            Err(e) => return Err(restore(&retired, path, e)),
        };

        let chmod_error = set_mode(&retired, self.config.rotated_file_mode)
            .err()
            .map(|source| SinkError::Permissions {
                path: retired.clone(),
                source,
            });

        *active = fresh;
        Ok((retired, chmod_error))
    }

    fn finish(&self, locked: LockedWrite, now: NaiveDateTime) -> SinkResult<()> {
        let path = &self.config.path;

        if let Some(retired) = &locked.retired {
            info!(
                path = %path.display(),
                retired = %retired.path.display(),
                reason = retired.decision.as_str(),
                "rotated log file"
            );
        }

        if let Err(e) = &locked.append {
            warn!(path = %path.display(), error = %e, "log write failed");
        }

        if let Some((decision, e)) = &locked.rotation_error {
            warn!(
                path = %path.display(),
                reason = decision.as_str(),
                error = %e,
                "log rotation failed"
            );
        }

        if locked.retired.is_some() {
            self.dispatch_sweep(now);
        }

        locked.append?;

        match locked.rotation_error {
            Some((_, source)) => Err(SinkError::Rotation {
                path: path.clone(),
                source: Box::new(source),
            }),
            None => Ok(()),
        }
    }

    /// Run or queue a retention sweep. Must not be called with the file lock
    /// held.
    fn dispatch_sweep(&self, now: NaiveDateTime) {
        let Some(manager) = &self.retention else {
            return;
        };

        if self.config.retention_mode == RetentionMode::Background {
            // No worker means the writer is closing.
            if let Some(worker) = self.worker.lock().as_ref() {
                worker.request(now);
            }
            return;
        }

        retention::report(manager.sweep(now));
    }

    /// Run a retention sweep now and return what it did.
    pub fn sweep_now(&self) -> SinkResult<SweepOutcome> {
        self.sweep_at(Local::now())
    }

    /// Run a retention sweep as of `now`.
    pub fn sweep_at(&self, now: DateTime<Local>) -> SinkResult<SweepOutcome> {
        match &self.retention {
            Some(manager) => manager.sweep(now.naive_local()),
            None => Ok(SweepOutcome::default()),
        }
    }

    /// Flush written data to stable storage.
    pub fn flush(&self) -> SinkResult<()> {
        match self.active.lock().as_mut() {
            Some(active) => active.sync(),
            None => Err(SinkError::Closed),
        }
    }

    /// Sync and close the active file and stop the retention worker once
    /// its queue is drained. Calling it again is a no-op.
    pub fn close(&self) -> SinkResult<()> {
        let closed = self.active.lock().take();
        let result = match closed {
            Some(mut active) => active.sync(),
            None => Ok(()),
        };

        if let Some(mut worker) = self.worker.lock().take() {
            worker.shutdown();
        }

        result
    }

    pub fn is_closed(&self) -> bool {
        self.active.lock().is_none()
    }
}

/// Move a retired file back after its replacement failed to open, so the
/// open handle and the active path agree again.
fn restore(retired: &Path, path: &Path, open_error: SinkError) -> SinkError {
    match fs::rename(retired, path) {
        Ok(()) => open_error,
        Err(rollback) => SinkError::RollbackFailed {
            path: path.to_path_buf(),
            retired: retired.to_path_buf(),
            source: Box::new(open_error),
            rollback,
        },
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.config.path.display(), error = %e, "failed to close log file");
        }
    }
}
