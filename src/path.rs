use crate::datefmt;
use crate::error::{CaptureError, Result};
use crate::record::{LogRecord, LogType};
use chrono::{DateTime, Local, TimeZone};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// Token replaced by the record's type name.
pub const TYPE_TOKEN: &str = "{Type}";

/// Template used when neither the config nor the record names one.
pub const DEFAULT_PATH_FORMAT: &str = "Logs/{yyyy-MM-dd}.json";

/// Turns path templates such as `Logs/{Type}/{yyyy}/{MM-dd}.json` into
/// concrete `.json` file paths.
///
/// Relative templates are resolved against `base_dir`. Any `{...}` token
/// other than `{Type}` is a .NET-style date format applied to the current
/// local time. Malformed braces never fail: substitution stops and the rest
/// of the template is kept literally.
#[derive(Clone, Debug)]
pub struct PathResolver {
    base_dir: PathBuf,
}

impl PathResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Resolver rooted at the process working directory.
    pub fn from_current_dir() -> Result<Self> {
        let dir = std::env::current_dir().map_err(|e| CaptureError::io(".", e))?;
        Ok(Self::new(dir))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve the target file for `record` and make sure its directory
    /// exists.
    pub async fn resolve(&self, template: &str, record: &LogRecord) -> Result<PathBuf> {
        self.resolve_at(template, record, &Local::now()).await
    }

    /// Same as [`resolve`](Self::resolve) with an explicit clock reading.
    pub async fn resolve_at<Tz: TimeZone>(
        &self,
        template: &str,
        record: &LogRecord,
        now: &DateTime<Tz>,
    ) -> Result<PathBuf> {
        let path = self.render(template, record.log_type, now);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CaptureError::io(parent, e))?;
        }

        Ok(path)
    }

    /// Compute the path without touching the file system.
    pub fn render<Tz: TimeZone>(&self, template: &str, log_type: LogType, now: &DateTime<Tz>) -> PathBuf {
        let template = normalize_separators(template);
        let template = template.replace(TYPE_TOKEN, log_type.as_str());
        let template = substitute_date_tokens(&template, now);

        let mut path = if Path::new(&template).is_absolute() {
            PathBuf::from(template)
        } else {
            self.base_dir.join(template)
        };
        path.set_extension("json");
        path
    }
}

fn normalize_separators(template: &str) -> String {
    template
        .chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect()
}

/// Replace `{format}` tokens left to right until none remain. Stops at the
/// first unmatched brace or a `}` that precedes every `{`.
fn substitute_date_tokens<Tz: TimeZone>(template: &str, now: &DateTime<Tz>) -> String {
    let mut out = template.to_string();

    loop {
        let close = match (out.find('{'), out.find('}')) {
            (Some(open), Some(close)) if open < close => close,
            _ => break,
        };
        // Innermost token ending at `close`.
        let open = match out[..close].rfind('{') {
            Some(open) => open,
            None => break,
        };

        let value = datefmt::format(now, &out[open + 1..close]);
        out.replace_range(open..=close, &value);
    }

    out
}
