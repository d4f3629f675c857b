//! Collection-style access to a single JSON log file.
//!
//! A file holds two named collections, `metadata` and `logs`. The whole
//! document is loaded into memory, mutated through [`Collection`] and written
//! back with [`LogDocument::commit`].

use crate::error::{CaptureError, Result};
use crate::record::LogRecord;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-file summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMetadata {
    pub created_time: DateTime<Local>,
    pub last_updated_time: DateTime<Local>,
    pub file_name: String,
    pub file_size: String,
    pub total_log_count: u64,
}

/// Ordered set of documents of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Collection<T> {
    pub fn find_all(&self) -> &[T] {
        &self.items
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn insert(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn insert_many(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
    }

    /// Remove every document, returning them in stored order.
    pub fn delete_all(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// In-memory image of one log file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogDocument {
    #[serde(default)]
    pub metadata: Collection<LogMetadata>,
    #[serde(default)]
    pub logs: Collection<LogRecord>,
}

impl LogDocument {
    /// Load the document at `path`; a missing or empty file yields an empty
    /// document.
    pub async fn open(path: &Path) -> Result<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(CaptureError::io(path, e)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| CaptureError::json(path, e))
    }

    /// Serialized form of the document, exactly as [`commit`](Self::commit)
    /// writes it.
    pub fn encode(&self, path: &Path) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| CaptureError::json(path, e))
    }

    /// Write the document to a sibling temporary file and rename it over
    /// `path`.
    pub async fn commit(&self, path: &Path) -> Result<()> {
        let body = self.encode(path)?;
        write_replacing(path, &body).await
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// `<file>.<pid>.<seq>.tmp`, unique per call within the process.
fn temp_path(path: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.{}.tmp", std::process::id(), seq));
    PathBuf::from(tmp)
}

/// Replace the contents of `path` with `body` through a temporary sibling.
/// The temporary file is removed when either step fails.
pub(crate) async fn write_replacing(path: &Path, body: &[u8]) -> Result<()> {
    let tmp = temp_path(path);

    if let Err(e) = tokio::fs::write(&tmp, body).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CaptureError::io(tmp, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CaptureError::io(path, e));
    }
    Ok(())
}
