use async_trait::async_trait;
use log_capture::console;
use log_capture::document::LogDocument;
use log_capture::sink::LogSink;
use log_capture::{
    CaptureConfig, CaptureError, CaptureOptions, LogCapture, LogRecord, LogType, RequestContext,
    Result, WriteErrorPolicy,
};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn file_config(dir: &Path) -> CaptureConfig {
    CaptureConfig {
        enable_console: false,
        base_dir: Some(dir.to_path_buf()),
        path_format: "Logs/{Type}.json".to_string(),
        ..Default::default()
    }
}

async fn read(dir: &Path, log_type: &str) -> LogDocument {
    LogDocument::open(&dir.join("Logs").join(format!("{log_type}.json")))
        .await
        .unwrap()
}

#[tokio::test]
async fn three_captures_persist_newest_first() {
    let dir = TempDir::new().unwrap();
    let (capture, _worker) = LogCapture::with_file_sink(file_config(dir.path())).unwrap();

    capture.info("first");
    capture.info("second");
    capture.info("third");
    capture.shutdown().await.unwrap();

    let doc = read(dir.path(), "Info").await;
    let logs = doc.logs.find_all();
    assert_eq!(logs.len(), 3);
    assert!(logs.windows(2).all(|pair| pair[0].created_time() >= pair[1].created_time()));

    let meta = doc.metadata.first().unwrap();
    assert_eq!(doc.metadata.count(), 1);
    assert_eq!(meta.total_log_count, 3);
    assert_eq!(meta.file_name, "Info.json");
}

#[tokio::test]
async fn partial_info_strips_context_only_from_the_file() {
    let dir = TempDir::new().unwrap();
    let (capture, _worker) = LogCapture::with_file_sink(file_config(dir.path())).unwrap();

    let context = RequestContext::new("GET", "/users/7").with_header("x-request-id", "abc");
    let returned = capture.capture_message(
        "user lookup failed",
        LogType::Error,
        CaptureOptions::default().with_context(context.clone()),
    );
    capture.shutdown().await.unwrap();

    // What the console saw is the unfiltered record.
    assert_eq!(returned.context, Some(context));
    assert!(returned.runtime.is_some());
    assert!(console::render_plain(&returned).ends_with("[E] user lookup failed"));

    let doc = read(dir.path(), "Error").await;
    let stored = &doc.logs.find_all()[0];
    assert_eq!(stored.message, "user lookup failed");
    assert!(stored.context.is_none());
    assert!(stored.runtime.is_none());
    assert!(stored.environment.is_none());
}

#[tokio::test]
async fn full_info_keeps_context() {
    let dir = TempDir::new().unwrap();
    let config = CaptureConfig {
        log_full_info: true,
        ..file_config(dir.path())
    };
    let (capture, _worker) = LogCapture::with_file_sink(config).unwrap();

    capture.capture_message(
        "kept",
        LogType::Info,
        CaptureOptions::default().with_context(RequestContext::new("PUT", "/cart")),
    );
    capture.shutdown().await.unwrap();

    let doc = read(dir.path(), "Info").await;
    let stored = &doc.logs.find_all()[0];
    assert_eq!(stored.context.as_ref().unwrap().method.as_deref(), Some("PUT"));
    assert!(stored.environment.is_some());
}

#[tokio::test]
async fn before_hook_veto_skips_the_record() {
    let dir = TempDir::new().unwrap();
    let after_calls = Arc::new(AtomicUsize::new(0));
    let after_seen = Arc::clone(&after_calls);

    let config = file_config(dir.path())
        .with_before_log(|mut record: LogRecord| {
            if record.message.contains("password") {
                return None;
            }
            record.message = record.message.to_uppercase();
            Some(record)
        })
        .with_after_log(move |record| {
            after_seen.fetch_add(1, Ordering::SeqCst);
            record
        });
    let (capture, _worker) = LogCapture::with_file_sink(config).unwrap();

    capture.warning("login ok");
    capture.warning("password=hunter2");
    capture.warning("logout");
    capture.shutdown().await.unwrap();

    let doc = read(dir.path(), "Warning").await;
    let mut messages: Vec<String> = doc.logs.find_all().iter().map(|r| r.message.clone()).collect();
    messages.sort();
    assert_eq!(messages, vec!["LOGIN OK".to_string(), "LOGOUT".to_string()]);
    assert_eq!(doc.metadata.first().unwrap().total_log_count, 2);
    assert_eq!(after_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn path_override_routes_a_single_record() {
    let dir = TempDir::new().unwrap();
    let (capture, _worker) = LogCapture::with_file_sink(file_config(dir.path())).unwrap();

    capture.capture_message(
        "charged card",
        LogType::Info,
        CaptureOptions::default().with_path("Audit/{Type}/payments.txt"),
    );
    capture.info("regular");
    capture.shutdown().await.unwrap();

    let audit = LogDocument::open(&dir.path().join("Audit/Info/payments.json")).await.unwrap();
    assert_eq!(audit.logs.find_all()[0].message, "charged card");
    assert_eq!(read(dir.path(), "Info").await.logs.count(), 1);
}

#[tokio::test]
async fn captured_errors_and_objects_are_normalized() {
    let dir = TempDir::new().unwrap();
    let (capture, _worker) = LogCapture::with_file_sink(file_config(dir.path())).unwrap();

    let err = io::Error::new(io::ErrorKind::PermissionDenied, "cannot open config");
    let record = capture.capture_error(&err, LogType::Fatal, CaptureOptions::default());
    let place = record.exception.as_ref().unwrap().place.as_ref().unwrap();
    assert!(place.file.ends_with("capture.rs"));
    assert_eq!(record.message, "cannot open config");

    let object = capture.capture_object(
        &serde_json::json!({ "order": 17, "state": "paid" }),
        LogType::Debug,
        CaptureOptions::default(),
    );
    assert_eq!(object.message, r#"{"order":17,"state":"paid"}"#);
    capture.shutdown().await.unwrap();

    let fatal = read(dir.path(), "Fatal").await;
    let exception = fatal.logs.find_all()[0].exception.as_ref().unwrap();
    assert!(exception.type_name.contains("io::error::Error"));

    let debug = read(dir.path(), "Debug").await;
    assert_eq!(debug.logs.find_all()[0].data.as_ref().unwrap()["order"], 17);
}

#[tokio::test]
async fn captures_after_shutdown_are_not_persisted() {
    let dir = TempDir::new().unwrap();
    let (capture, worker) = LogCapture::with_file_sink(file_config(dir.path())).unwrap();

    capture.shutdown().await.unwrap();
    worker.await.unwrap();

    let record = capture.info("too late");
    assert_eq!(record.message, "too late");
    assert!(!dir.path().join("Logs").join("Info.json").exists());
}

/// Remembers what it stored and rejects messages starting with "bad".
#[derive(Default)]
struct PickySink {
    stored: Mutex<Vec<String>>,
}

#[async_trait]
impl LogSink for PickySink {
    async fn send(&self, record: &LogRecord) -> Result<()> {
        if record.message.starts_with("bad") {
            return Err(CaptureError::Sink("rejected".into()));
        }
        self.stored.lock().unwrap().push(record.message.clone());
        Ok(())
    }
}

async fn run_with_policy(policy: WriteErrorPolicy) -> (Result<usize>, Vec<String>) {
    let sink = Arc::new(PickySink::default());
    let config = CaptureConfig {
        enable_console: false,
        write_error_policy: policy,
        ..Default::default()
    };
    let (capture, _worker) = LogCapture::new(config, sink.clone());

    capture.info("one");
    capture.info("bad two");
    capture.info("three");
    let result = capture.flush().await;

    let stored = sink.stored.lock().unwrap().clone();
    (result, stored)
}

#[tokio::test]
async fn stop_batch_policy_fails_fast() {
    let (result, stored) = run_with_policy(WriteErrorPolicy::StopBatch).await;
    assert!(matches!(result, Err(CaptureError::Sink(_))));
    assert_eq!(stored, vec!["one".to_string()]);
}

#[tokio::test]
async fn skip_record_policy_continues() {
    let (result, stored) = run_with_policy(WriteErrorPolicy::SkipRecord).await;
    assert_eq!(result.unwrap(), 3);
    assert_eq!(stored, vec!["one".to_string(), "three".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn buffered_records_flush_after_the_threshold() {
    let sink = Arc::new(PickySink::default());
    let config = CaptureConfig {
        enable_console: false,
        ..Default::default()
    };
    let (capture, _worker) = LogCapture::new(config, sink.clone());

    capture.info("waiting");
    tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;
    assert!(sink.stored.lock().unwrap().is_empty());

    tokio::time::sleep(std::time::Duration::from_millis(600)).await;
    assert_eq!(*sink.stored.lock().unwrap(), vec!["waiting".to_string()]);
}
