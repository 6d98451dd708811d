//! Adapter between logging front-ends and the [`FileWriter`].
//!
//! A [`FileHook`] filters by severity and optionally strips ANSI color
//! codes before handing text to the writer. [`FileSinkLayer`] plugs a hook
//! into a `tracing` subscriber.

mod config;
mod layer;

pub use config::HookConfig;
pub use layer::FileSinkLayer;

use std::borrow::Cow;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::SinkResult;
use crate::severity::Severity;
use crate::writer::FileWriter;

/// A severity-filtered, color-stripping front for one [`FileWriter`].
pub struct FileHook {
    writer: FileWriter,
    min_severity: Option<Severity>,
    strip_colors: bool,
}

impl FileHook {
    /// Resolve `config` and open its writer.
    pub fn new(config: &HookConfig) -> SinkResult<Self> {
        let writer = FileWriter::new(config.to_writer_config()?)?;
        Ok(Self::from_writer(writer, config.strip_colors))
    }

    /// Wrap an existing writer. The minimum severity is taken from the
    /// writer's config.
    pub fn from_writer(writer: FileWriter, strip_colors: bool) -> Self {
        let min_severity = writer.config().min_severity;
        Self {
            writer,
            min_severity,
            strip_colors,
        }
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    pub fn writer(&self) -> &FileWriter {
        &self.writer
    }

    /// Whether entries at `severity` are written.
    pub fn enabled(&self, severity: Severity) -> bool {
        severity.admits(self.min_severity)
    }

    /// Persist `text` as one entry. Entries below the minimum severity are
    /// dropped and report success.
    pub fn fire(
        &self,
        severity: Severity,
        timestamp: DateTime<Local>,
        text: &str,
    ) -> SinkResult<()> {
        if !self.enabled(severity) {
            return Ok(());
        }

        let text = text.trim_end_matches(['\r', '\n']);
        let message = if self.strip_colors {
            strip_colors(text)
        } else {
            Cow::Borrowed(text)
        };

        self.writer.write_message(timestamp, &message)
    }

    pub fn close(&self) -> SinkResult<()> {
        self.writer.close()
    }
}

fn strip_colors(text: &str) -> Cow<'_, str> {
    if !text.contains('\u{1b}') {
        return Cow::Borrowed(text);
    }
    let stripped = strip_ansi_escapes::strip(text);
    Cow::Owned(String::from_utf8_lossy(&stripped).into_owned())
}
