use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, Level};

use log_capture::init::init_tracing_with_config;
use log_capture::CaptureConfig;

#[tokio::main]
async fn main() {
    let config = CaptureConfig {
        path_format: "Logs/{Type}/{yyyy-MM-dd}.json".to_string(),
        ..Default::default()
    };

    let (capture, _worker) = match init_tracing_with_config(config, Level::INFO) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("cannot install capture layer: {}", e);
            return;
        }
    };

    info!("starting service");
    debug!("not captured, below INFO");

    error!(
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    // Long enough for the age threshold to flush on its own.
    sleep(Duration::from_secs(3)).await;

    if let Err(e) = capture.shutdown().await {
        eprintln!("flush failed: {}", e);
    }
}
