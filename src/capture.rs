use crate::console;
use crate::error::Result;
use crate::file_sink::FileSink;
use crate::path::{PathResolver, DEFAULT_PATH_FORMAT};
use crate::queue::{BatchHandler, BatchOptions, BatchQueue};
use crate::record::{CallSite, CaptureSource, ExceptionInfo, LogRecord, LogType, RequestContext};
use crate::sink::LogSink;
use async_trait::async_trait;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::warn;

/// Runs before a record is written. Returning `None` vetoes the record: it
/// is neither persisted nor counted.
pub type BeforeLogHook = Arc<dyn Fn(LogRecord) -> Option<LogRecord> + Send + Sync>;

/// Runs after a record was written. The returned record is discarded.
pub type AfterLogHook = Arc<dyn Fn(LogRecord) -> LogRecord + Send + Sync>;

/// What the flush stage does when the sink rejects a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteErrorPolicy {
    /// Abandon the rest of the batch and report the error.
    #[default]
    StopBatch,
    /// Log the failure and continue with the next record.
    SkipRecord,
}

/// Configuration of a [`LogCapture`] service.
///
/// **Fields**
/// - `batch_size`: buffered records that force a flush.
/// - `threshold`: maximum age of a buffered record before a flush.
/// - `log_full_info`: keep request/runtime/environment snapshots in the
///   persisted record. Console output is not affected.
/// - `enable_console`: render every record to stdout on capture.
/// - `enable_file`: queue records for the sink.
/// - `path_format`: default path template of the file sink.
/// - `base_dir`: directory relative templates resolve against; the working
///   directory when `None`.
/// - `before_log` / `after_log`: optional hooks around each write.
/// - `write_error_policy`: see [`WriteErrorPolicy`].
#[derive(Clone)]
pub struct CaptureConfig {
    pub batch_size: usize,
    pub threshold: Duration,
    pub log_full_info: bool,
    pub enable_console: bool,
    pub enable_file: bool,
    pub path_format: String,
    pub base_dir: Option<PathBuf>,
    pub before_log: Option<BeforeLogHook>,
    pub after_log: Option<AfterLogHook>,
    pub write_error_policy: WriteErrorPolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            threshold: Duration::from_secs(2),
            log_full_info: false,
            enable_console: true,
            enable_file: true,
            path_format: DEFAULT_PATH_FORMAT.to_string(),
            base_dir: None,
            before_log: None,
            after_log: None,
            write_error_policy: WriteErrorPolicy::default(),
        }
    }
}

impl CaptureConfig {
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            batch_size: self.batch_size,
            threshold: self.threshold,
        }
    }

    pub fn with_before_log<F>(mut self, hook: F) -> Self
    where
        F: Fn(LogRecord) -> Option<LogRecord> + Send + Sync + 'static,
    {
        self.before_log = Some(Arc::new(hook));
        self
    }

    pub fn with_after_log<F>(mut self, hook: F) -> Self
    where
        F: Fn(LogRecord) -> LogRecord + Send + Sync + 'static,
    {
        self.after_log = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for CaptureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfig")
            .field("batch_size", &self.batch_size)
            .field("threshold", &self.threshold)
            .field("log_full_info", &self.log_full_info)
            .field("enable_console", &self.enable_console)
            .field("enable_file", &self.enable_file)
            .field("path_format", &self.path_format)
            .field("base_dir", &self.base_dir)
            .field("before_log", &self.before_log.is_some())
            .field("after_log", &self.after_log.is_some())
            .field("write_error_policy", &self.write_error_policy)
            .finish()
    }
}

/// Per-call extras of a capture.
#[derive(Clone, Debug, Default)]
pub struct CaptureOptions {
    pub context: Option<RequestContext>,
    /// Path template for this record only.
    pub path_override: Option<String>,
}

impl CaptureOptions {
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_path(mut self, template: impl Into<String>) -> Self {
        self.path_override = Some(template.into());
        self
    }
}

/// Filter and hooks applied to every flushed record before it reaches the
/// sink.
struct FlushStage {
    sink: Arc<dyn LogSink>,
    log_full_info: bool,
    before_log: Option<BeforeLogHook>,
    after_log: Option<AfterLogHook>,
    write_error_policy: WriteErrorPolicy,
}

#[async_trait]
impl BatchHandler<LogRecord> for FlushStage {
    async fn execute(&self, batch: Vec<LogRecord>) -> Result<()> {
        for mut record in batch {
            if !self.log_full_info {
                record.strip_context();
            }

            let record = match &self.before_log {
                Some(hook) => match hook(record) {
                    Some(record) => record,
                    None => continue,
                },
                None => record,
            };

            if let Err(e) = self.sink.send(&record).await {
                match self.write_error_policy {
                    WriteErrorPolicy::StopBatch => return Err(e),
                    WriteErrorPolicy::SkipRecord => {
                        warn!(target: "log_capture::capture", error = %e, "skipping unwritable log record");
                        continue;
                    }
                }
            }

            if let Some(hook) = &self.after_log {
                let _ = hook(record);
            }
        }

        self.sink.flush().await
    }
}

/// Entry point of the pipeline: builds records, renders them to the console
/// on the calling thread and queues them for the sink.
pub struct LogCapture {
    enable_console: bool,
    enable_file: bool,
    queue: BatchQueue<LogRecord>,
}

impl LogCapture {
    /// Create a service writing through `sink`. Must be called inside a
    /// Tokio runtime; the returned handle belongs to the flush worker.
    pub fn new(config: CaptureConfig, sink: Arc<dyn LogSink>) -> (Self, JoinHandle<()>) {
        let stage = Arc::new(FlushStage {
            sink,
            log_full_info: config.log_full_info,
            before_log: config.before_log.clone(),
            after_log: config.after_log.clone(),
            write_error_policy: config.write_error_policy,
        });
        let (queue, handle) = BatchQueue::new(config.batch_options(), stage);

        (
            Self {
                enable_console: config.enable_console,
                enable_file: config.enable_file,
                queue,
            },
            handle,
        )
    }

    /// Create a service backed by a [`FileSink`] using the config's
    /// `path_format` and `base_dir`.
    pub fn with_file_sink(config: CaptureConfig) -> Result<(Self, JoinHandle<()>)> {
        let resolver = match &config.base_dir {
            Some(dir) => PathResolver::new(dir),
            None => PathResolver::from_current_dir()?,
        };
        let sink = Arc::new(FileSink::new(resolver, config.path_format.clone()));
        Ok(Self::new(config, sink))
    }

    /// Build a record from `source` and submit it.
    pub fn capture(&self, source: CaptureSource, log_type: LogType, options: CaptureOptions) -> LogRecord {
        let mut record = LogRecord::new(source, log_type);
        record.context = options.context;
        record.path_override = options.path_override;
        self.submit(record)
    }

    pub fn capture_message(
        &self,
        message: impl Into<String>,
        log_type: LogType,
        options: CaptureOptions,
    ) -> LogRecord {
        self.capture(CaptureSource::Message(message.into()), log_type, options)
    }

    /// Capture an error value. The caller's location becomes the exception
    /// place.
    #[track_caller]
    pub fn capture_error<E: StdError + ?Sized>(
        &self,
        err: &E,
        log_type: LogType,
        options: CaptureOptions,
    ) -> LogRecord {
        let place = CallSite::from_location(Location::caller());
        let info = ExceptionInfo::from_error(err).with_place(place);
        self.capture(CaptureSource::Exception(info), log_type, options)
    }

    /// Capture any serializable value; its JSON text becomes the message.
    pub fn capture_object<T: Serialize + ?Sized>(
        &self,
        value: &T,
        log_type: LogType,
        options: CaptureOptions,
    ) -> LogRecord {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|e| serde_json::Value::String(format!("<unserializable: {}>", e)));
        self.capture(CaptureSource::Object(value), log_type, options)
    }

    pub fn debug(&self, message: impl Into<String>) -> LogRecord {
        self.capture_message(message, LogType::Debug, CaptureOptions::default())
    }

    pub fn info(&self, message: impl Into<String>) -> LogRecord {
        self.capture_message(message, LogType::Info, CaptureOptions::default())
    }

    pub fn warning(&self, message: impl Into<String>) -> LogRecord {
        self.capture_message(message, LogType::Warning, CaptureOptions::default())
    }

    pub fn error(&self, message: impl Into<String>) -> LogRecord {
        self.capture_message(message, LogType::Error, CaptureOptions::default())
    }

    pub fn fatal(&self, message: impl Into<String>) -> LogRecord {
        self.capture_message(message, LogType::Fatal, CaptureOptions::default())
    }

    /// Render and queue an already built record.
    pub fn submit(&self, record: LogRecord) -> LogRecord {
        if self.enable_console {
            console::print(&record);
        }
        if self.enable_file {
            if let Err(e) = self.queue.push(record.clone()) {
                warn!(target: "log_capture::capture", error = %e, "dropping log record");
            }
        }
        record
    }

    /// Write out everything buffered so far.
    pub async fn flush(&self) -> Result<usize> {
        self.queue.flush().await
    }

    /// Drain the queue and stop its worker. Later captures still reach the
    /// console but are no longer persisted.
    pub async fn shutdown(&self) -> Result<usize> {
        self.queue.close().await
    }

    pub fn queue(&self) -> &BatchQueue<LogRecord> {
        &self.queue
    }
}
