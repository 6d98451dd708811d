//! Filesink Core Library
//!
//! Durable, rotating file sink for application logs.
//!
//! ## Overview
//!
//! A [`FileWriter`] appends one line per log entry to an active file and
//! retires that file when it crosses a size, line-count, hour or day
//! boundary. Retired files are renamed with a date suffix
//! (`app.2024-03-10.log`, `app.2024-03-10-13.2.log`) and deleted once they
//! fall outside the retention window.
//!
//! Logging front-ends talk to a [`FileHook`], which filters by severity and
//! strips ANSI colors, or install a [`FileSinkLayer`] on a `tracing`
//! subscriber.
//!
//! ## Quick Start
//!
//! ```no_run
//! use filesink_core::{FileWriter, LogEntry, Severity, WriterConfig};
//!
//! fn main() -> Result<(), filesink_core::SinkError> {
//!     let config = WriterConfig::new("logs/app.log")
//!         .with_max_lines(50_000)
//!         .with_hourly_rotation(false);
//!     let writer = FileWriter::new(config)?;
//!
//!     writer.write(&LogEntry::new(Severity::Info, "service started"))?;
//!     writer.close()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod hook;
pub mod naming;
pub mod policy;
pub mod retention;
pub mod severity;
pub mod writer;

// Re-exports
pub use config::{FileMode, RetentionMode, RotationFailurePolicy, WriterConfig};
pub use entry::LogEntry;
pub use error::{SinkError, SinkResult};
pub use hook::{FileHook, FileSinkLayer, HookConfig};
pub use naming::{BaseName, RotationSuffix};
pub use policy::{should_rotate, FileStats, RotationDecision};
pub use retention::{RetentionManager, RetentionWorker, SweepOutcome};
pub use severity::Severity;
pub use writer::FileWriter;
