use std::io;

use log_capture::{CaptureConfig, CaptureOptions, LogCapture, LogType, RequestContext};

#[tokio::main]
async fn main() {
    let config = CaptureConfig::default().with_before_log(|record| {
        // Never persist anything that looks like a credential.
        if record.message.contains("token=") {
            None
        } else {
            Some(record)
        }
    });

    let (capture, _worker) = match LogCapture::with_file_sink(config) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("cannot start capture: {}", e);
            return;
        }
    };

    capture.info("service starting");
    capture.debug("token=abc123 (console only)");

    let context = RequestContext::new("GET", "/orders/17").with_client_addr("10.0.0.4");
    capture.capture_message(
        "order not found",
        LogType::Warning,
        CaptureOptions::default().with_context(context),
    );

    let err = io::Error::new(io::ErrorKind::ConnectionRefused, "payment gateway unreachable");
    capture.capture_error(&err, LogType::Error, CaptureOptions::default());

    capture.capture_object(
        &serde_json::json!({ "queue_depth": 12, "workers": 4 }),
        LogType::Debug,
        CaptureOptions::default().with_path("Logs/Metrics/{yyyy}/{MM-dd}.json"),
    );

    if let Err(e) = capture.shutdown().await {
        eprintln!("flush failed: {}", e);
    }
}
