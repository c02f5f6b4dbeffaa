//! JSONL activity log: append-only line-delimited JSON, one object per event.
//!
//! Each line is assembled in memory and written with a single `write_all`
//! so a concurrent `tail -f` never sees a partial line.
//!
//! Four-level fallback chain:
//! 1. Primary file path
//! 2. Fallback path (by default in the temp directory)
//! 3. stderr with `[DT-JSONL]` prefix
//! 4. Silent discard (a benchmark pass must never fail because of logging)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::LoggingConfig;
use crate::core::errors::{DtError, Result};
use crate::logger::sink::EventSink;

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Log event types for one benchmark pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PassStart,
    PassComplete,
    PartitionSeen,
    TargetAccepted,
    TargetRejected,
    PlanAdjusted,
    IoEngineSelected,
    ToolInvoked,
    ToolOutput,
    FallbackTaken,
    ParseFailure,
    Cleanup,
    ToolProvisioned,
    Interrupted,
}

/// A single JSONL log entry; all fields optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// External tool name (`dd`, `fio`, `winsat`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Block-size or plan label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    /// Size in bytes (free space, test file size).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// DT error code if the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Freeform details (command line, raw output, reason).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            path: None,
            device: None,
            tool: None,
            block: None,
            size: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            details: None,
        }
    }

    pub fn info(event: EventType) -> Self {
        Self::new(event, Severity::Info)
    }

    pub fn warning(event: EventType) -> Self {
        Self::new(event, Severity::Warning)
    }

    #[must_use]
    pub fn path(mut self, path: &Path) -> Self {
        self.path = Some(path.display().to_string());
        self
    }

    #[must_use]
    pub fn device(mut self, device: &str) -> Self {
        self.device = Some(device.to_string());
        self
    }

    #[must_use]
    pub fn tool(mut self, tool: &str) -> Self {
        self.tool = Some(tool.to_string());
        self
    }

    #[must_use]
    pub fn block(mut self, block: &str) -> Self {
        self.block = Some(block.to_string());
        self
    }

    #[must_use]
    pub fn size(mut self, bytes: u64) -> Self {
        self.size = Some(bytes);
        self
    }

    #[must_use]
    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn ok(mut self, ok: bool) -> Self {
        self.ok = Some(ok);
        self
    }

    #[must_use]
    pub fn error(mut self, err: &DtError) -> Self {
        self.error_code = Some(err.code().to_string());
        self.details = Some(err.to_string());
        self.ok = Some(false);
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Fallback,
    Stderr,
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Optional fallback path (e.g. on a different filesystem).
    pub fallback_path: Option<PathBuf>,
}

impl From<&LoggingConfig> for JsonlConfig {
    fn from(cfg: &LoggingConfig) -> Self {
        Self {
            path: cfg.jsonl_path.clone(),
            fallback_path: cfg.fallback_path.clone(),
        }
    }
}

/// Append-only JSONL log writer with multi-level fallback.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
}

impl JsonlWriter {
    /// Open the JSONL log file. Falls through the degradation chain on failure.
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
        };
        w.try_open_primary();
        w
    }

    /// Write a single log entry as one JSONL line and flush it.
    ///
    /// Lines are flushed eagerly: a pass can be cut short by a signal and the
    /// log is most useful exactly then.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[DT-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal | WriterState::Fallback => {
                let written = self.writer.as_mut().is_some_and(|w| {
                    w.write_all(line.as_bytes()).is_ok() && w.flush().is_ok()
                });
                if !written {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[DT-JSONL] {line}");
            }
            WriterState::Discard => {}
        }
    }

    fn try_open_primary(&mut self) {
        match open_append(&self.config.path) {
            Ok(file) => {
                self.writer = Some(BufWriter::new(file));
                self.state = WriterState::Normal;
            }
            Err(_) => self.try_open_fallback(),
        }
    }

    fn try_open_fallback(&mut self) {
        let Some(fb) = &self.config.fallback_path else {
            self.state = WriterState::Stderr;
            let _ = writeln!(
                io::stderr(),
                "[DT-JSONL] primary path failed and no fallback configured, using stderr"
            );
            return;
        };
        match open_append(fb) {
            Ok(file) => {
                let _ = writeln!(
                    io::stderr(),
                    "[DT-JSONL] primary path failed, using fallback: {}",
                    fb.display()
                );
                self.writer = Some(BufWriter::new(file));
                self.state = WriterState::Fallback;
            }
            Err(_) => {
                self.state = WriterState::Stderr;
                let _ = writeln!(
                    io::stderr(),
                    "[DT-JSONL] both primary and fallback paths failed, using stderr"
                );
            }
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            WriterState::Normal => self.try_open_fallback(),
            WriterState::Fallback => {
                self.state = WriterState::Stderr;
                let _ = writeln!(io::stderr(), "[DT-JSONL] fallback write failed, using stderr");
            }
            WriterState::Stderr => self.state = WriterState::Discard,
            WriterState::Discard => {}
        }
    }
}

/// [`EventSink`] backed by a [`JsonlWriter`].
pub struct JsonlSink {
    writer: Mutex<JsonlWriter>,
}

impl JsonlSink {
    pub fn open(config: JsonlConfig) -> Self {
        Self {
            writer: Mutex::new(JsonlWriter::open(config)),
        }
    }
}

impl EventSink for JsonlSink {
    fn record(&self, entry: LogEntry) {
        self.writer.lock().write_entry(&entry);
    }
}

// ──────────────────────── helpers ────────────────────────

/// Open or create a file for appending, creating the parent directory.
fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| DtError::io(parent, source))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| DtError::io(path, source))
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config(path: PathBuf) -> JsonlConfig {
        JsonlConfig {
            path,
            fallback_path: None,
        }
    }

    #[test]
    fn write_entry_produces_valid_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone()));

        writer.write_entry(&LogEntry::info(EventType::PassStart).tool("fio"));

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["event"], "pass_start");
        assert_eq!(parsed["severity"], "info");
        assert_eq!(parsed["tool"], "fio");
    }

    #[test]
    fn entries_are_appended_across_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.jsonl");
        for _ in 0..2 {
            let mut writer = JsonlWriter::open(config(path.clone()));
            writer.write_entry(&LogEntry::info(EventType::ToolInvoked));
        }
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn fallback_when_primary_dir_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();
        let fallback = dir.path().join("fallback.jsonl");
        let mut writer = JsonlWriter::open(JsonlConfig {
            path: blocker.join("primary.jsonl"),
            fallback_path: Some(fallback.clone()),
        });

        assert_eq!(writer.state(), "fallback");
        writer.write_entry(&LogEntry::warning(EventType::FallbackTaken));

        let contents = fs::read_to_string(&fallback).unwrap();
        assert!(contents.contains("fallback_taken"));
    }

    #[test]
    fn stderr_when_no_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let writer = JsonlWriter::open(config(blocker.join("log.jsonl")));
        assert_eq!(writer.state(), "stderr");
    }

    #[test]
    fn optional_fields_omitted_when_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.jsonl");
        let mut writer = JsonlWriter::open(config(path.clone()));
        writer.write_entry(&LogEntry::info(EventType::PassComplete));

        let line = fs::read_to_string(&path).unwrap();
        assert!(!line.contains("\"path\""));
        assert!(!line.contains("\"size\""));
        assert!(!line.contains("\"error_code\""));
    }

    #[test]
    fn error_fields_carry_code() {
        let err = DtError::ToolUnavailable {
            tool: "fio",
            details: "missing".to_string(),
        };
        let entry = LogEntry::warning(EventType::ToolInvoked).error(&err);
        assert_eq!(entry.error_code.as_deref(), Some("DT-3101"));
        assert_eq!(entry.ok, Some(false));
    }

    #[test]
    fn sink_writes_through_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sink.jsonl");
        let sink = JsonlSink::open(config(path.clone()));
        sink.record(LogEntry::info(EventType::Cleanup).path(Path::new("/tmp/x")));
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"cleanup\""));
        assert!(contents.contains("/tmp/x"));
    }
}
