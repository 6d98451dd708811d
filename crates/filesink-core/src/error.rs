//! Error types for the file sink

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for file sink operations
#[derive(Error, Debug)]
pub enum SinkError {
    /// Configuration could not be turned into a usable writer
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Permission string was not a valid octal mode
    #[error("Invalid permission mode {0:?}: expected an octal string such as \"0640\"")]
    InvalidMode(String),

    /// Configuration bag could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Failed to create parent directories or open the active file
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to append to the active file
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to move the active file aside
    #[error("Failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to apply a file mode
    #[error("Failed to set permissions on {path}: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Rotation did not complete. The entry that triggered it was still
    /// written unless the writer is configured to fail instead.
    #[error("Rotation of {path} failed: {source}")]
    Rotation {
        path: PathBuf,
        #[source]
        source: Box<SinkError>,
    },

    /// The fresh file could not be opened and the retired file could not be
    /// moved back, so the open handle now points at `retired`
    #[error("Failed to reopen {path} ({source}) or restore it from {retired}: {rollback}")]
    RollbackFailed {
        path: PathBuf,
        retired: PathBuf,
        #[source]
        source: Box<SinkError>,
        rollback: io::Error,
    },

    /// Some rotated files could not be deleted
    #[error(
        "Retention sweep failed to delete {} file(s), deleted {}",
        .failed.len(),
        .deleted.len()
    )]
    Retention {
        deleted: Vec<PathBuf>,
        failed: Vec<(PathBuf, io::Error)>,
    },

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The writer has been closed
    #[error("Writer is closed")]
    Closed,
}

impl SinkError {
    /// True when the error describes a rotation problem that happened after
    /// (or instead of) a successful append, so the entry is on disk.
    pub fn entry_persisted(&self) -> bool {
        matches!(self, SinkError::Rotation { .. })
    }
}

/// Result type alias using SinkError
pub type SinkResult<T> = Result<T, SinkError>;
