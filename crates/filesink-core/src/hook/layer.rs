//! Tracing layer that writes events through a [`FileHook`].

use std::fmt::{self, Write as FmtWrite};
use std::sync::Arc;

use chrono::{Local, SecondsFormat};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use super::FileHook;
use crate::severity::Severity;

/// Events from this crate are never written back into the sink.
const OWN_TARGET: &str = "filesink_core";

/// A tracing `Layer` rendering each event as one line:
///
/// ```text
/// 2024-03-10T13:05:00.123+01:00  INFO my_app::db: connected attempts=3
/// ```
#[derive(Clone)]
pub struct FileSinkLayer {
    hook: Arc<FileHook>,
}

impl FileSinkLayer {
    pub fn new(hook: Arc<FileHook>) -> Self {
        Self { hook }
    }

    pub fn hook(&self) -> &Arc<FileHook> {
        &self.hook
    }
}

impl<S: Subscriber> Layer<S> for FileSinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if target.starts_with(OWN_TARGET) {
            return;
        }

        let severity = Severity::from(*metadata.level());
        if !self.hook.enabled(severity) {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let now = Local::now();
        let mut line = format!(
            "{} {:>5} {}: {}",
            now.to_rfc3339_opts(SecondsFormat::Millis, false),
            metadata.level(),
            target,
            visitor.message,
        );
        line.push_str(&visitor.fields);

        // Logging must never take the application down.
        if let Err(e) = self.hook.fire(severity, now, &line) {
            eprintln!("filesink: failed to write to {}: {e}", self.hook.path().display());
        }
    }
}

/// Collects the message and renders other fields as ` key=value`.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        let _ = write!(self.fields, " {}={}", field.name(), value);
    }
}
