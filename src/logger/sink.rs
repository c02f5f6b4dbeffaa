//! Injected event sink. Components receive an `Arc<dyn EventSink>` instead of
//! reaching for a global logger.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::config::LoggingConfig;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlSink, LogEntry};

/// Destination for activity events.
pub trait EventSink: Send + Sync {
    fn record(&self, entry: LogEntry);
}

/// Drops everything. Used when logging is disabled.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _entry: LogEntry) {}
}

/// Keeps every entry in memory for inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn count(&self, event: EventType) -> usize {
        self.entries.lock().iter().filter(|e| e.event == event).count()
    }
}

impl EventSink for MemorySink {
    fn record(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}

/// Build the sink a pass should log to.
pub fn sink_from_config(cfg: &LoggingConfig) -> Arc<dyn EventSink> {
    if cfg.enabled {
        Arc::new(JsonlSink::open(JsonlConfig::from(cfg)))
    } else {
        Arc::new(NullSink)
    }
}
