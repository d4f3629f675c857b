use std::time::Instant;
use tokio::time::Duration;

use log_capture::env::{env_or, LOG_CAPTURE_BASE_DIR_ENV};
use log_capture::{CaptureConfig, LogCapture};

/// Same loop as `default_load`, but every record really goes to disk.
#[tokio::main]
async fn main() {
    let base_dir = env_or(LOG_CAPTURE_BASE_DIR_ENV, "target/load-logs");

    let config = CaptureConfig {
        batch_size: 500,
        threshold: Duration::from_millis(200),
        enable_console: false,
        path_format: "Logs/{Type}/{yyyy-MM-dd}.json".to_string(),
        base_dir: Some(base_dir.into()),
        ..Default::default()
    };
    let (capture, _worker) = match LogCapture::with_file_sink(config) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("cannot start capture: {}", e);
            return;
        }
    };

    // Every write rewrites the whole file, so keep this small.
    let n: u64 = 2_000;
    let start = Instant::now();

    for i in 0..n {
        capture.warning(format!("custom load test warning {}", i));
    }

    match capture.shutdown().await {
        Ok(_) => {
            let elapsed = start.elapsed();
            println!("file sink: persisted {} records in {:?} (~{:.0} rec/s)",
                n,
                elapsed,
                n as f64 / elapsed.as_secs_f64()
            );
        }
        Err(e) => eprintln!("flush failed: {}", e),
    }
}
