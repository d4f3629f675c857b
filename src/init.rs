use crate::capture::{CaptureConfig, LogCapture};
use crate::error::{CaptureError, Result};
use crate::layer::CaptureLayer;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Install a [`CaptureLayer`] over an existing service as the global
/// `tracing` subscriber.
///
/// **Parameters**
/// - `capture`: service that receives every captured event.
/// - `min_level`: least severe level that is captured.
///
/// **Returns**
/// - `Err(CaptureError::SubscriberInstalled)` if a global subscriber was
///   already set.
pub fn init_tracing_with_capture(capture: Arc<LogCapture>, min_level: Level) -> Result<()> {
    let layer = CaptureLayer::new(capture).with_min_level(min_level);
    let subscriber = Registry::default().with(layer);
    tracing::subscriber::set_global_default(subscriber).map_err(|_| CaptureError::SubscriberInstalled)
}

/// Build a file-backed [`LogCapture`] from `config` and route all `tracing`
/// events at `min_level` and above into it.
///
/// Must be called inside a Tokio runtime. Keep the returned service to
/// `shutdown()` it before exit; anything still buffered is lost otherwise.
pub fn init_tracing_with_config(
    config: CaptureConfig,
    min_level: Level,
) -> Result<(Arc<LogCapture>, JoinHandle<()>)> {
    let (capture, handle) = LogCapture::with_file_sink(config)?;
    let capture = Arc::new(capture);
    init_tracing_with_capture(Arc::clone(&capture), min_level)?;
    Ok((capture, handle))
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`CaptureConfig::default`] and `Level::INFO`: records go to the console
/// and to `Logs/<yyyy-MM-dd>.json` under the working directory.
pub fn init_tracing() -> Result<(Arc<LogCapture>, JoinHandle<()>)> {
    init_tracing_with_config(CaptureConfig::default(), Level::INFO)
}
