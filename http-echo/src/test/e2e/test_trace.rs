use std::{io, sync::Arc};

use parking_lot::Mutex;
use rama::{
    http::{StatusCode, service::client::HttpClientExt as _},
    telemetry::tracing::subscriber::{self, util::SubscriberInitExt as _},
};

use crate::test::e2e;

/// Log output shared between the subscriber and the test.
#[derive(Debug, Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// The server tasks run on this (current thread) test runtime,
// so a thread local subscriber sees their events as well.
async fn run_and_capture(extra_args: &[&str]) -> String {
    let logs = CapturedLogs::default();
    let _guard = subscriber::fmt()
        .with_ansi(false)
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish()
        .set_default();

    let runtime = e2e::runtime::spawn_traced_with_args(extra_args).await;
    let client = runtime.client();

    let resp = client.get(runtime.url("/traced")).send().await.unwrap();
    assert_eq!(StatusCode::OK, resp.status());

    let resp = client.get(runtime.url("/health")).send().await.unwrap();
    assert_eq!(StatusCode::OK, resp.status());

    runtime.interrupt().await.unwrap();

    logs.contents()
}

#[tokio::test]
async fn test_trace_log_emits_events() {
    let logs = run_and_capture(&["--text", "hello", "--trace-log"]).await;

    assert!(logs.contains("request traced"), "logs: {logs}");
    assert!(logs.contains("operation.name=GET /traced"), "logs: {logs}");
    assert!(!logs.contains("operation.name=GET /health"), "logs: {logs}");
}

#[tokio::test]
async fn test_trace_defaults_to_json_lines() {
    let logs = run_and_capture(&["--text", "hello"]).await;

    assert!(!logs.contains("request traced"), "logs: {logs}");
}
