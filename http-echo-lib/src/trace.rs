//! Per request timing records and the sinks they are emitted to.

use std::{
    fmt,
    io::Write,
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use rama::{error::BoxError, http::Request, telemetry::tracing};
use serde::Serialize;

/// Timing of a single handled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub service_name: String,
    pub operation_name: String,
    pub method: String,
    pub path: String,
    pub timestamp: SystemTime,
    pub duration: Duration,
}

/// Wire format, in the spirit of a zipkin span:
/// timestamp and duration are expressed in microseconds.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TraceRecordJson<'a> {
    service_name: &'a str,
    name: &'a str,
    timestamp: u128,
    duration: u128,
    #[serde(rename = "http.method")]
    method: &'a str,
    #[serde(rename = "http.path")]
    path: &'a str,
}

impl<'a> From<&'a TraceRecord> for TraceRecordJson<'a> {
    fn from(record: &'a TraceRecord) -> Self {
        Self {
            service_name: &record.service_name,
            name: &record.operation_name,
            timestamp: record
                .timestamp
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_micros(),
            duration: record.duration.as_micros(),
            method: &record.method,
            path: &record.path,
        }
    }
}

pub trait TraceSink: Send + Sync + 'static {
    fn emit(&self, record: &TraceRecord) -> Result<(), BoxError>;
}

/// Writes each record as a single JSON line.
///
/// Concurrent emits are serialized so lines never interleave.
pub struct JsonLinesTraceSink<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesTraceSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesTraceSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W> fmt::Debug for JsonLinesTraceSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesTraceSink").finish()
    }
}

impl<W: Write + Send + 'static> TraceSink for JsonLinesTraceSink<W> {
    fn emit(&self, record: &TraceRecord) -> Result<(), BoxError> {
        let line = serde_json::to_vec(&TraceRecordJson::from(record))?;
        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// Emits records as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTraceSink;

impl TraceSink for TracingTraceSink {
    fn emit(&self, record: &TraceRecord) -> Result<(), BoxError> {
        tracing::info!(
            service.name = %record.service_name,
            operation.name = %record.operation_name,
            http.request.method = %record.method,
            url.path = %record.path,
            duration = ?record.duration,
            "request traced",
        );
        Ok(())
    }
}

/// Emits a [`TraceRecord`] once dropped.
///
/// Dropping happens on every exit path of a handler,
/// including when its future is cancelled mid-flight.
pub struct TraceGuard {
    sink: Arc<dyn TraceSink>,
    service_name: &'static str,
    operation_name: String,
    method: String,
    path: String,
    timestamp: SystemTime,
    start: Instant,
}

impl TraceGuard {
    pub fn start<Body>(
        sink: Arc<dyn TraceSink>,
        service_name: &'static str,
        req: &Request<Body>,
    ) -> Self {
        let method = req.method().as_str().to_owned();
        let path = req.uri().path().to_owned();
        Self {
            sink,
            service_name,
            operation_name: format!("{method} {path}"),
            method,
            path,
            timestamp: SystemTime::now(),
            start: Instant::now(),
        }
    }
}

impl fmt::Debug for TraceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceGuard")
            .field("service_name", &self.service_name)
            .field("operation_name", &self.operation_name)
            .finish()
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        let record = TraceRecord {
            service_name: self.service_name.to_owned(),
            operation_name: std::mem::take(&mut self.operation_name),
            method: std::mem::take(&mut self.method),
            path: std::mem::take(&mut self.path),
            timestamp: self.timestamp,
            duration: self.start.elapsed(),
        };
        if let Err(err) = self.sink.emit(&record) {
            tracing::error!("failed to emit trace record: {err}");
        }
    }
}
