use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};

use crate::config::FileMode;
use crate::error::{SinkError, SinkResult};
use crate::policy::FileStats;

/// The open log file and the counters describing it.
///
/// Counters only move after bytes have been handed to the OS, and are reset
/// exactly when a new file is opened.
#[derive(Debug)]
pub(super) struct ActiveFile {
    path: PathBuf,
    file: File,
    stats: FileStats,
    /// A failed write left an unterminated fragment that could not be cut
    torn: bool,
}

impl ActiveFile {
    /// Open or create the file at `path`, creating parent directories.
    ///
    /// An existing non-empty file keeps its size and line count, and its
    /// period starts at its modification time so a file left over from an
    /// earlier period rotates on the first write.
    pub(super) fn open(path: &Path, mode: FileMode, now: NaiveDateTime) -> SinkResult<Self> {
        let open_err = |source: io::Error| SinkError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode.bits());
        }
        let mut file = options.open(path).map_err(open_err)?;

        let metadata = file.metadata().map_err(open_err)?;
        let size = metadata.len();

        if size == 0 {
            // The process umask may have narrowed the mode passed to open.
            set_mode(path, mode).map_err(|source| SinkError::Permissions {
                path: path.to_path_buf(),
                source,
            })?;

            return Ok(Self {
                path: path.to_path_buf(),
                file,
                stats: FileStats::empty(now),
                torn: false,
            });
        }

        let period_start = metadata
            .modified()
            .map(|t| DateTime::<Local>::from(t).naive_local().min(now))
            .unwrap_or(now);

        let (mut line_count, ends_with_newline) = scan_lines(path).map_err(open_err)?;
        let mut size_bytes = size;

        // A torn last line from a crash is closed off so the next entry
        // starts on its own line.
        if !ends_with_newline {
            file.write_all(b"\n").map_err(open_err)?;
            size_bytes += 1;
            line_count += 1;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            stats: FileStats {
                size_bytes,
                line_count,
                opened_at: now,
                period_start,
            },
            torn: false,
        })
    }

    pub(super) fn stats(&self) -> FileStats {
        self.stats
    }

    /// Append one encoded entry and count it.
    ///
    /// A write that fails partway is cut back so the counters keep matching
    /// the file and the next entry starts on its own line.
    pub(super) fn append(&mut self, line: &[u8]) -> SinkResult<()> {
        let result = if self.torn {
            let mut buf = Vec::with_capacity(line.len() + 1);
            buf.push(b'\n');
            buf.extend_from_slice(line);
            self.file.write_all(&buf).map(|()| buf.len())
        } else {
            self.file.write_all(line).map(|()| line.len())
        };

        match result {
            Ok(written) => {
                self.torn = false;
                self.stats.size_bytes += written as u64;
                self.stats.line_count += 1;
                Ok(())
            }
            Err(source) => {
                self.discard_partial();
                Err(SinkError::Write {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }

    /// Drop bytes past the counted size after a failed write.
    ///
    /// If the file cannot be truncated the fragment is counted as a line and
    /// the next append terminates it first.
    pub(super) fn discard_partial(&mut self) {
        if self.file.set_len(self.stats.size_bytes).is_ok() {
            return;
        }

        let Ok(metadata) = self.file.metadata() else {
            return;
        };
        if metadata.len() > self.stats.size_bytes {
            self.stats.size_bytes = metadata.len();
            if !self.torn {
                self.stats.line_count += 1;
            }
            self.torn = true;
        }
    }

    /// Push written data to stable storage.
    pub(super) fn sync(&mut self) -> SinkResult<()> {
        self.file
            .sync_data()
            .map_err(|source| SinkError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// Apply `mode` to `path`. A no-op off Unix.
pub(super) fn set_mode(path: &Path, mode: FileMode) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode.bits()))
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(())
    }
}

/// Count newlines in `path` and report whether it ends with one.
fn scan_lines(path: &Path) -> io::Result<(u64, bool)> {
    let mut file = File::open(path)?;

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    file.seek(SeekFrom::Start(0))?;

    let mut buf = vec![0u8; 64 * 1024];
    let mut count = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        count += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
    }

    Ok((count, last[0] == b'\n'))
}
