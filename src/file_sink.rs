use crate::error::Result;
use crate::path::{PathResolver, DEFAULT_PATH_FORMAT};
use crate::record::LogRecord;
use crate::sink::LogSink;
use crate::store::FileStore;
use async_trait::async_trait;

/// [`LogSink`] writing into date/type-partitioned JSON files.
///
/// The target is the record's `path_override` when present, otherwise the
/// sink's template, resolved through [`PathResolver`] at write time.
pub struct FileSink {
    resolver: PathResolver,
    path_format: String,
    store: FileStore,
}

impl FileSink {
    /// **Parameters**
    /// - `resolver`: resolves relative templates against its base directory.
    /// - `path_format`: default template, e.g. `Logs/{Type}/{yyyy-MM-dd}.json`.
    pub fn new(resolver: PathResolver, path_format: impl Into<String>) -> Self {
        Self {
            resolver,
            path_format: path_format.into(),
            store: FileStore::new(),
        }
    }

    /// Sink rooted at the working directory using [`DEFAULT_PATH_FORMAT`].
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(PathResolver::from_current_dir()?, DEFAULT_PATH_FORMAT))
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }
}

#[async_trait]
impl LogSink for FileSink {
    async fn send(&self, record: &LogRecord) -> Result<()> {
        let template = record.path_override.as_deref().unwrap_or(&self.path_format);
        let path = self.resolver.resolve(template, record).await?;
        self.store.append(&path, record.clone()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CaptureSource, LogType};
    use chrono::Local;
    use tempfile::TempDir;

    #[tokio::test]
    async fn override_path_takes_precedence() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(PathResolver::new(dir.path()), "Logs/{Type}.json");

        let mut routed = LogRecord::new(CaptureSource::Message("audit".into()), LogType::Info);
        routed.path_override = Some("Audit/{Type}.txt".into());
        sink.send(&routed).await.unwrap();

        let plain = LogRecord::new(CaptureSource::Message("plain".into()), LogType::Error);
        sink.send(&plain).await.unwrap();

        let audit = sink.store().read(&dir.path().join("Audit/Info.json")).await.unwrap();
        assert_eq!(audit.logs.find_all()[0].message, "audit");

        let errors = sink.store().read(&dir.path().join("Logs/Error.json")).await.unwrap();
        assert_eq!(errors.logs.count(), 1);
        assert!(!dir.path().join("Logs/Info.json").exists());
    }

    #[tokio::test]
    async fn default_template_partitions_by_day() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(PathResolver::new(dir.path()), DEFAULT_PATH_FORMAT);

        let record = LogRecord::new(CaptureSource::Message("today".into()), LogType::Debug);
        sink.send(&record).await.unwrap();

        let today = Local::now().format("%Y-%m-%d").to_string();
        assert!(dir.path().join("Logs").join(format!("{today}.json")).exists());
    }
}
