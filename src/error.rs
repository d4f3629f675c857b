use std::error::Error as StdError;
use std::path::PathBuf;

/// Errors produced while capturing, flushing or persisting log records.
///
/// Path routing never produces an error: a malformed template degrades to a
/// literal path. Everything that touches the file system does, and those
/// errors surface to whoever awaited the flush.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("log file i/o failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed log document {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("batch queue is closed")]
    QueueClosed,

    #[error("log sink failed: {0}")]
    Sink(#[source] Box<dyn StdError + Send + Sync>),

    #[error("invalid value {value:?} for {key}")]
    Config { key: String, value: String },

    #[error("a global tracing subscriber is already installed")]
    SubscriberInstalled,
}

impl CaptureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaptureError::Io { path: path.into(), source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        CaptureError::Json { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
