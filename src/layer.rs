use crate::capture::LogCapture;
use crate::record::{CaptureSource, LogRecord, LogType};
use std::collections::BTreeMap;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events under this target come from the pipeline itself and are never
/// captured.
pub const INTERNAL_TARGET: &str = "log_capture";

/// `tracing_subscriber` layer that turns events into captured
/// [`LogRecord`]s.
///
/// By default events at `INFO` and above are captured. The `message` field
/// becomes the record message; every other field, plus the event's target,
/// module, file and line, lands in the record's `data` object.
pub struct CaptureLayer {
    capture: Arc<LogCapture>,
    min_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events turned into records.
    pub captured_events: Arc<AtomicU64>,
}

impl CaptureLayer {
    pub fn new(capture: Arc<LogCapture>) -> Self {
        Self {
            capture,
            min_level: Level::INFO,
            total_events: Arc::new(AtomicU64::new(0)),
            captured_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Capture events at `level` and above.
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }
}

fn is_internal(target: &str) -> bool {
    target == INTERNAL_TARGET
        || target
            .strip_prefix(INTERNAL_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

fn log_type_for(level: &Level) -> LogType {
    match *level {
        Level::ERROR => LogType::Error,
        Level::WARN => LogType::Warning,
        Level::INFO => LogType::Info,
        _ => LogType::Debug,
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if *meta.level() > self.min_level || is_internal(meta.target()) {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        fields.insert("target".to_string(), serde_json::Value::from(meta.target()));
        if let Some(module_path) = meta.module_path() {
            fields.insert("module_path".to_string(), serde_json::Value::from(module_path));
        }
        if let Some(file) = meta.file() {
            fields.insert("file".to_string(), serde_json::Value::from(file));
        }
        if let Some(line) = meta.line() {
            fields.insert("line".to_string(), serde_json::Value::from(line));
        }

        let mut record = LogRecord::new(
            CaptureSource::Message(message.unwrap_or_default()),
            log_type_for(meta.level()),
        );
        record.data = Some(serde_json::Value::Object(fields.into_iter().collect()));

        self.capture.submit(record);
        self.captured_events.fetch_add(1, Ordering::Relaxed);
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // `message` arrives here when built from format_args!.
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
