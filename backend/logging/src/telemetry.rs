//! Session telemetry.
//!
//! Structured session events written as NDJSON through a non-blocking file
//! writer. Shutdown drops the worker guard, which flushes everything queued.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;

/// Events the telemetry sink understands.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    SessionStarted { prompt_id: String, jsonl: bool },
    SessionEnded { prompt_id: String, outcome: String },
    SessionFailed { prompt_id: String, error: String },
}

#[derive(Debug, Serialize)]
struct TelemetryRecord<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a TelemetryEvent,
}

/// NDJSON telemetry sink with an init/shutdown lifecycle.
///
/// An inactive sink swallows events, so call sites never branch.
pub struct Telemetry {
    writer: Option<Mutex<NonBlocking>>,
    _guard: Option<WorkerGuard>,
}

impl Telemetry {
    /// Open an NDJSON sink in `dir`, one file per day.
    pub fn init(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let appender = rolling::daily(dir, "capforge-telemetry.ndjson");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        Ok(Self {
            writer: Some(Mutex::new(writer)),
            _guard: Some(guard),
        })
    }

    /// A sink that drops everything; used when telemetry is disabled.
    pub fn disabled() -> Self {
        Self {
            writer: None,
            _guard: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.writer.is_some()
    }

    /// Record one event; inactive sinks ignore it.
    pub fn record(&self, event: &TelemetryEvent) {
        let Some(writer) = &self.writer else { return };
        let record = TelemetryRecord {
            timestamp: Utc::now(),
            event,
        };
        if let Ok(mut line) = serde_json::to_vec(&record) {
            line.push(b'\n');
            let _ = writer.lock().expect("telemetry writer poisoned").write_all(&line);
        }
    }

    /// Flush queued events and stop the background writer.
    pub fn shutdown(self) {
        drop(self);
    }
}
