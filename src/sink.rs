use crate::error::Result;
use crate::record::LogRecord;
use async_trait::async_trait;

/// Asynchronous destination for [`LogRecord`]s leaving the batch queue.
///
/// The flush stage calls `send` once per record, in enqueue order, after
/// filtering and the `before_log` hook have run. It is never called
/// concurrently by the same capture service.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Persist a single record.
    ///
    /// **Parameters**
    /// - `record`: the filtered record. `path_override`, when set, selects
    ///   the destination instead of the sink's default.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was stored.
    /// - `Err(..)` if the backend failed. The error is handed to the flush
    ///   caller as-is and the record is not retried.
    async fn send(&self, record: &LogRecord) -> Result<()>;

    /// Flush any buffered records, if the backend implements buffering.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
