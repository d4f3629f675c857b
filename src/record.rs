use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;

/// Severity of a captured record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogType {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Debug => "Debug",
            LogType::Info => "Info",
            LogType::Warning => "Warning",
            LogType::Error => "Error",
            LogType::Fatal => "Fatal",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source location a record was captured from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl CallSite {
    pub fn from_location(location: &Location<'_>) -> Self {
        CallSite {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Normalized description of an error value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInfo {
    pub type_name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<CallSite>,
}

impl ExceptionInfo {
    /// Build from any error, walking its `source()` chain.
    pub fn from_error<E: StdError + ?Sized>(err: &E) -> Self {
        let mut sources = Vec::new();
        let mut source = err.source();
        while let Some(inner) = source {
            sources.push(inner.to_string());
            source = inner.source();
        }

        ExceptionInfo {
            type_name: std::any::type_name::<E>().to_string(),
            message: err.to_string(),
            sources,
            place: None,
        }
    }

    pub fn with_place(mut self, place: CallSite) -> Self {
        self.place = Some(place);
        self
    }
}

/// Snapshot of the request a record was captured while serving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        RequestContext {
            method: Some(method.into()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_client_addr(mut self, addr: impl Into<String>) -> Self {
        self.client_addr = Some(addr.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInfo {
    pub process_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
}

impl RuntimeInfo {
    pub fn current() -> Self {
        RuntimeInfo {
            process_id: std::process::id(),
            thread_name: std::thread::current().name().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub os: String,
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

impl EnvironmentInfo {
    pub fn current() -> Self {
        let host_name = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .ok();

        EnvironmentInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            host_name,
            working_dir: std::env::current_dir()
                .ok()
                .map(|dir| dir.display().to_string()),
        }
    }
}

/// What a record was captured from. Every variant normalizes into the
/// record's `message` text.
#[derive(Debug, Clone)]
pub enum CaptureSource {
    Message(String),
    Exception(ExceptionInfo),
    Object(serde_json::Value),
}

/// A single captured log event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub log_type: LogType,
    created_time: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentInfo>,
    /// Routing only: selects the target file, never persisted.
    #[serde(skip)]
    pub path_override: Option<String>,
}

impl LogRecord {
    /// Build a record stamped with the current local time and the
    /// runtime/environment snapshot of the calling thread.
    pub fn new(source: CaptureSource, log_type: LogType) -> Self {
        Self::new_at(source, log_type, Local::now())
    }

    pub fn new_at(source: CaptureSource, log_type: LogType, created_time: DateTime<Local>) -> Self {
        let (message, exception, data) = match source {
            CaptureSource::Message(message) => (message, None, None),
            CaptureSource::Exception(info) => (info.message.clone(), Some(info), None),
            CaptureSource::Object(value) => {
                let message = match &value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (message, None, Some(value))
            }
        };

        LogRecord {
            message,
            exception,
            data,
            log_type,
            created_time,
            context: None,
            runtime: Some(RuntimeInfo::current()),
            environment: Some(EnvironmentInfo::current()),
            path_override: None,
        }
    }

    pub fn created_time(&self) -> DateTime<Local> {
        self.created_time
    }

    /// Clear the request, runtime and environment snapshots.
    pub fn strip_context(&mut self) {
        self.context = None;
        self.runtime = None;
        self.environment = None;
    }
}
