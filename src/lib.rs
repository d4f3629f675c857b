pub mod error;
pub mod record;
pub mod queue;
pub mod datefmt;
pub mod path;
pub mod document;
pub mod store;
pub mod sink;
pub mod file_sink;
pub mod noop_sink;
pub mod console;
pub mod capture;
pub mod layer;
pub mod init;
pub mod env;

pub use capture::{CaptureConfig, CaptureOptions, LogCapture, WriteErrorPolicy};
pub use error::{CaptureError, Result};
pub use record::{CaptureSource, LogRecord, LogType, RequestContext};
