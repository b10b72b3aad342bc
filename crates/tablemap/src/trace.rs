//! Statement tracing.
//!
//! A [`TraceSink`] installed on the mapper receives one [`TraceEvent`] per
//! statement it runs. Without a sink the mapper skips timing and parameter
//! copies entirely.

use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tablemap_core::Value;

/// One executed statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    pub sql: String,
    pub params: Vec<Value>,
    pub elapsed: Duration,
    /// Ran inside a transaction rather than on the ambient connection.
    pub transactional: bool,
    /// Error message if the statement failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Receiver of statement trace events.
pub trait TraceSink: Send + Sync {
    fn record(&self, event: &TraceEvent);
}

/// Forwards events to `tracing` on target `tablemap::sql`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&self, event: &TraceEvent) {
        let elapsed_us = u64::try_from(event.elapsed.as_micros()).unwrap_or(u64::MAX);
        match &event.error {
            None => tracing::debug!(
                target: "tablemap::sql",
                sql = %event.sql,
                params = ?event.params,
                elapsed_us,
                transactional = event.transactional,
                "statement"
            ),
            Some(error) => tracing::warn!(
                target: "tablemap::sql",
                sql = %event.sql,
                params = ?event.params,
                elapsed_us,
                transactional = event.transactional,
                error = %error,
                "statement failed"
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TraceEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events recorded so far.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// SQL text of all events recorded so far.
    pub fn statements(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|e| e.iter().map(|ev| ev.sql.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl TraceSink for MemorySink {
    fn record(&self, event: &TraceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Writes each event as one line of JSON.
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> TraceSink for JsonLinesSink<W> {
    fn record(&self, event: &TraceEvent) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        let written = serde_json::to_writer(&mut *out, event)
            .map_err(std::io::Error::from)
            .and_then(|()| out.write_all(b"\n"));
        if let Err(e) = written {
            tracing::warn!(error = %e, "Failed to write trace event");
        }
    }
}

impl<W> std::fmt::Debug for JsonLinesSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSink").finish_non_exhaustive()
    }
}
