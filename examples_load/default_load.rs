use std::sync::Arc;
use std::time::Instant;

use log_capture::noop_sink::NoopSink;
use log_capture::{CaptureConfig, LogCapture};

#[tokio::main]
async fn main() {
    let sink = Arc::new(NoopSink::default());
    let config = CaptureConfig {
        enable_console: false,
        ..Default::default()
    };
    let (capture, _worker) = LogCapture::new(config, sink);

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        capture.error(format!("default load test error {}", i));
    }

    let elapsed = start.elapsed();
    println!("default config: captured {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    if let Err(e) = capture.shutdown().await {
        eprintln!("shutdown failed: {}", e);
    }
    println!("{:?}", capture.queue().stats());
}
