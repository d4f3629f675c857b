use crate::document::{write_replacing, LogDocument, LogMetadata};
use crate::error::Result;
use crate::record::LogRecord;
use chrono::Local;
use parking_lot::{const_mutex, Mutex};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::debug;

/// Exclusive locks per resolved file, shared by every [`FileStore`] in the
/// process. An entry lives only while someone holds or waits for it.
static PATH_LOCKS: Mutex<BTreeMap<PathBuf, Arc<AsyncMutex<()>>>> = const_mutex(BTreeMap::new());

/// A registered interest in one file's lock. Dropping it unregisters the
/// entry once nobody else refers to it.
struct PathLock {
    key: PathBuf,
    lock: Arc<AsyncMutex<()>>,
}

impl PathLock {
    async fn register(path: &Path) -> Self {
        let key = lock_key(path).await;
        let lock = Arc::clone(PATH_LOCKS.lock().entry(key.clone()).or_default());
        Self { key, lock }
    }

    async fn hold(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        // Clones only happen under the registry lock, so the count is exact:
        // two means the registry and this handle.
        let mut locks = PATH_LOCKS.lock();
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Two spellings of the same directory map to one lock.
async fn lock_key(path: &Path) -> PathBuf {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    match tokio::fs::canonicalize(parent).await {
        Ok(dir) => dir.join(name),
        Err(_) => path.to_path_buf(),
    }
}

/// Appends records to JSON log files, keeping each file's `logs`
/// collection newest-first and its single `metadata` row current.
///
/// Every append is a read-modify-write cycle over the whole file, done while
/// holding an exclusive lock on that file. The lock is process-wide: two
/// stores writing the same path take turns. There is no rollback: if a
/// write fails halfway, whatever reached the disk stays there.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        Self
    }

    /// Persist `record` into the file at `path`.
    ///
    /// The stored `file_size` is the size of the file as written by this
    /// call, metadata row included.
    ///
    /// **Parameters**
    /// - `path`: resolved target file; its directory must exist.
    /// - `record`: the record to store. `path_override` is dropped.
    ///
    /// **Returns**
    /// - the file's metadata after the write.
    /// - `Err(..)` on any read, parse or write failure.
    pub async fn append(&self, path: &Path, mut record: LogRecord) -> Result<LogMetadata> {
        let entry = PathLock::register(path).await;
        let _exclusive = entry.hold().await;

        let mut doc = LogDocument::open(path).await?;
        let now = Local::now();

        record.path_override = None;
        doc.logs.insert(record);

        let mut logs = doc.logs.delete_all();
        logs.sort_by_key(|log| std::cmp::Reverse(log.created_time()));
        doc.logs.insert_many(logs);

        let created_time = doc
            .metadata
            .first()
            .map(|meta| meta.created_time)
            .unwrap_or(now);
        let mut metadata = LogMetadata {
            created_time,
            last_updated_time: now,
            file_name: file_name(path),
            file_size: human_size(0),
            total_log_count: doc.logs.count() as u64,
        };

        // The size text is part of the body it measures; settle it first.
        doc.metadata.delete_all();
        doc.metadata.insert(metadata.clone());
        let mut body = doc.encode(path)?;
        for _ in 0..4 {
            let size = human_size(body.len() as u64);
            if size == metadata.file_size {
                break;
            }
            metadata.file_size = size;
            doc.metadata.delete_all();
            doc.metadata.insert(metadata.clone());
            body = doc.encode(path)?;
        }
        write_replacing(path, &body).await?;

        debug!(
            target: "log_capture::store",
            path = %path.display(),
            total = metadata.total_log_count,
            size = %metadata.file_size,
            "appended log record"
        );
        Ok(metadata)
    }

    /// Read the document at `path` under the same lock writers use.
    pub async fn read(&self, path: &Path) -> Result<LogDocument> {
        let entry = PathLock::register(path).await;
        let _exclusive = entry.hold().await;
        LogDocument::open(path).await
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `1536` -> `"1.5 KB"`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use crate::record::{CaptureSource, LogType};
    use chrono::Duration;
    use tempfile::TempDir;

    fn record_at(message: &str, minutes_ago: i64) -> LogRecord {
        LogRecord::new_at(
            CaptureSource::Message(message.into()),
            LogType::Info,
            Local::now() - Duration::minutes(minutes_ago),
        )
    }

    #[tokio::test]
    async fn three_writes_are_newest_first_with_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("2024-03-05.json");
        let store = FileStore::new();

        // Out of chronological order on purpose.
        store.append(&path, record_at("middle", 5)).await.unwrap();
        store.append(&path, record_at("oldest", 10)).await.unwrap();
        let meta = store.append(&path, record_at("newest", 0)).await.unwrap();

        let doc = store.read(&path).await.unwrap();
        let messages: Vec<&str> = doc.logs.find_all().iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["newest", "middle", "oldest"]);

        assert_eq!(meta.total_log_count, 3);
        assert_eq!(meta.file_name, "2024-03-05.json");
        assert_eq!(doc.metadata.count(), 1);
        assert_eq!(doc.metadata.first(), Some(&meta));
    }

    #[tokio::test]
    async fn metadata_created_time_is_kept_across_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("day.json");
        let store = FileStore::new();

        let first = store.append(&path, record_at("a", 0)).await.unwrap();
        let second = store.append(&path, record_at("b", 0)).await.unwrap();

        assert_eq!(first.created_time, second.created_time);
        assert!(second.last_updated_time >= first.last_updated_time);
        assert_ne!(second.file_size, "0 B");
    }

    #[tokio::test]
    async fn override_path_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("routed.json");
        let store = FileStore::new();

        let mut record = record_at("routed", 0);
        record.path_override = Some("Elsewhere/{Type}.json".into());
        store.append(&path, record).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("Elsewhere"));
        assert!(!raw.contains("pathOverride"));
    }

    #[tokio::test]
    async fn unwritable_target_propagates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("day.json");

        let err = FileStore::new().append(&path, record_at("x", 0)).await.unwrap_err();
        assert!(matches!(err, CaptureError::Io { .. }));
    }

    async fn is_registered(path: &Path) -> bool {
        let key = lock_key(path).await;
        PATH_LOCKS.lock().contains_key(&key)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_stores_share_one_lock_per_file() {
        let dir = TempDir::new().unwrap();
        let path = Arc::new(dir.path().join("day.json"));

        let mut writers = Vec::new();
        for store_id in 0..2 {
            let path = Arc::clone(&path);
            writers.push(tokio::spawn(async move {
                let store = FileStore::new();
                for i in 0..50 {
                    store
                        .append(&path, record_at(&format!("{store_id}-{i}"), 0))
                        .await?;
                }
                Ok::<_, CaptureError>(())
            }));
        }
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let doc = FileStore::new().read(&path).await.unwrap();
        assert_eq!(doc.logs.count(), 100);
        assert_eq!(doc.metadata.first().unwrap().total_log_count, 100);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn lock_entries_are_released_after_use() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hourly.json");
        let store = FileStore::new();

        store.append(&path, record_at("a", 0)).await.unwrap();
        assert!(!is_registered(&path).await);

        let held = PathLock::register(&path).await;
        assert!(is_registered(&path).await);
        let second = PathLock::register(&path).await;
        drop(held);
        assert!(is_registered(&path).await);
        drop(second);
        assert!(!is_registered(&path).await);
    }

    #[tokio::test]
    async fn equivalent_spellings_share_a_lock() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("Logs")).unwrap();
        let plain = dir.path().join("Logs").join("day.json");
        let dotted = dir.path().join("Logs").join(".").join("day.json");

        assert_eq!(lock_key(&plain).await, lock_key(&dotted).await);
    }

    #[tokio::test]
    async fn stored_size_matches_the_file_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sized.json");
        let store = FileStore::new();

        let mut meta = store.append(&path, record_at("first", 0)).await.unwrap();
        for i in 0..20 {
            meta = store.append(&path, record_at(&format!("more {i}"), 0)).await.unwrap();
        }

        let on_disk = std::fs::metadata(&path).unwrap().len();
        assert_eq!(meta.file_size, human_size(on_disk));
        let doc = store.read(&path).await.unwrap();
        assert_eq!(doc.metadata.first().unwrap().file_size, meta.file_size);
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }
}
