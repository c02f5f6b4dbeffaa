//! Scratch files written onto the target filesystem during a test.
//!
//! Every file a runner creates is registered with a [`ScratchGuard`] before
//! the tool runs, so it is removed on every exit path.

#![allow(missing_docs)]

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::logger::jsonl::{EventType, LogEntry};
use crate::logger::sink::EventSink;

const ZERO_CHUNK: usize = 8 * 1024;

/// Removes every tracked file when released or dropped.
pub struct ScratchGuard {
    files: Vec<PathBuf>,
    sink: Arc<dyn EventSink>,
}

impl ScratchGuard {
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            files: Vec::new(),
            sink,
        }
    }

    /// Register `path` for removal and hand it back.
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        if !self.files.contains(&path) {
            self.files.push(path.clone());
        }
        path
    }

    #[must_use]
    pub fn tracked(&self) -> &[PathBuf] {
        &self.files
    }

    /// Remove everything tracked so far.
    pub fn release_all(&mut self) {
        for path in self.files.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => self
                    .sink
                    .record(LogEntry::info(EventType::Cleanup).path(&path).ok(true)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => self.sink.record(
                    LogEntry::warning(EventType::Cleanup)
                        .path(&path)
                        .ok(false)
                        .details(err.to_string()),
                ),
            }
        }
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Write `block_bytes * count` zero bytes to `path` in fixed-size chunks.
pub fn write_zero_file(path: &Path, block_bytes: u64, count: u64) -> io::Result<()> {
    let mut remaining = block_bytes.saturating_mul(count);
    let mut file = File::create(path)?;
    let chunk = [0_u8; ZERO_CHUNK];
    while remaining > 0 {
        let n = usize::try_from(remaining).map_or(ZERO_CHUNK, |r| r.min(ZERO_CHUNK));
        file.write_all(&chunk[..n])?;
        remaining -= n as u64;
    }
    file.sync_all()
}
