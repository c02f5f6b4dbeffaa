//! dd write-then-read cells with directory and sink fallbacks.
//!
//! A cell writes `<dir>/<file>` from the zero source, syncs, pauses, then
//! reads the file back into the null sink. When the null sink refuses the
//! transfer (direct IO into a character device, permissions) the read is
//! retried into a real `read_<file>` next to the test file. Single-path
//! targets also retry the write in their fallback directory. A raised
//! interrupt stops the cell before the next dd is spawned.

#![allow(missing_docs)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::core::interrupt::InterruptFlag;
use crate::logger::jsonl::{EventType, LogEntry, Severity};
use crate::logger::sink::EventSink;
use crate::parse::parse_dd;
use crate::plan::PlanEntry;
use crate::platform::profile::PlatformProfile;
use crate::report::{Cell, FailureReason};
use crate::runner::exec::{Capture, CommandOutput, CommandRunner, Invocation, Outcome, classify};
use crate::runner::patterns::DD_SOFT_FAILURE;
use crate::runner::scratch::{ScratchGuard, write_zero_file};
use crate::targets::{TargetOrigin, TestTarget};

const ZERO_FILE: &str = "zero_temp";

/// Write and read cells of one plan entry, and the directory they ran in.
#[derive(Debug, Clone, PartialEq)]
pub struct DdCells {
    pub path_used: PathBuf,
    pub write: Cell,
    pub read: Cell,
}

enum WriteOutcome {
    /// dd ran to completion; the cell may still be unparseable.
    Done(Cell),
    /// The directory refused the write. Worth trying the next one.
    Rejected,
}

pub struct DdRunner {
    runner: Arc<dyn CommandRunner>,
    dd: PathBuf,
    sync: Option<PathBuf>,
    profile: PlatformProfile,
    pause: Duration,
    sink: Arc<dyn EventSink>,
    interrupt: InterruptFlag,
}

impl DdRunner {
    #[must_use]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        dd: PathBuf,
        profile: PlatformProfile,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            runner,
            dd,
            sync: None,
            profile,
            pause: Duration::from_secs(1),
            sink,
            interrupt: InterruptFlag::new(),
        }
    }

    #[must_use]
    pub fn with_sync(mut self, sync: Option<PathBuf>) -> Self {
        self.sync = sync;
        self
    }

    #[must_use]
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    #[must_use]
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Run one plan entry against `target`. Scratch files are gone on return.
    pub fn run_entry(&self, target: &TestTarget, entry: &PlanEntry) -> DdCells {
        let mut scratch = ScratchGuard::new(self.sink.clone());
        let dirs: Vec<&Path> = std::iter::once(target.path.as_path())
            .chain(target.fallback.as_deref())
            .collect();

        let mut path_used = target.path.clone();
        let mut write = None;
        for (i, dir) in dirs.iter().enumerate() {
            if i > 0 {
                if self.interrupt.is_raised() {
                    break;
                }
                self.sink.record(
                    LogEntry::warning(EventType::FallbackTaken)
                        .tool("dd")
                        .path(dir)
                        .block(entry.block.label())
                        .details(format!("write rejected in {}", path_used.display())),
                );
                self.pause();
            }
            path_used = dir.to_path_buf();
            if let WriteOutcome::Done(cell) = self.write_phase(dir, entry, &mut scratch) {
                write = Some(cell);
                break;
            }
        }

        let Some(write) = write else {
            return DdCells {
                path_used,
                write: Cell::Failed(FailureReason::WriteFailed),
                read: Cell::Failed(FailureReason::ReadFailed),
            };
        };

        if self.interrupt.is_raised() {
            return DdCells {
                path_used,
                write,
                read: Cell::Failed(FailureReason::ReadFailed),
            };
        }
        self.sync_caches();
        self.pause();
        let read = self.read_phase(&path_used, target.origin, entry, &mut scratch);
        DdCells {
            path_used,
            write,
            read,
        }
    }

    fn write_phase(&self, dir: &Path, entry: &PlanEntry, scratch: &mut ScratchGuard) -> WriteOutcome {
        let source = match &self.profile.zero_source {
            Some(zero) => zero.clone(),
            None => {
                let zero = scratch.track(dir.join(ZERO_FILE));
                if let Err(err) = write_zero_file(&zero, entry.block.bytes(), entry.record_count) {
                    self.sink.record(
                        LogEntry::warning(EventType::ToolOutput)
                            .tool("dd")
                            .path(&zero)
                            .ok(false)
                            .details(format!("zero source not created: {err}")),
                    );
                    return WriteOutcome::Rejected;
                }
                zero
            }
        };
        let file = scratch.track(dir.join(&entry.file_name));

        let (result, outcome) = self.exec(&self.invocation(&source, &file, entry), entry);
        match outcome {
            Outcome::Success => WriteOutcome::Done(self.parse(&result, entry)),
            Outcome::SoftFail | Outcome::HardFail => WriteOutcome::Rejected,
        }
    }

    fn read_phase(
        &self,
        dir: &Path,
        origin: TargetOrigin,
        entry: &PlanEntry,
        scratch: &mut ScratchGuard,
    ) -> Cell {
        let file = dir.join(&entry.file_name);
        let read_name = format!("read_{}", entry.file_name);

        let mut sinks = vec![self.profile.null_sink.clone()];
        if matches!(origin, TargetOrigin::DefaultHome | TargetOrigin::DefaultTemp) {
            sinks.push(self.profile.temp_dir.join(&read_name));
        }
        sinks.push(dir.join(&read_name));
        sinks.dedup();

        for (i, sink_path) in sinks.iter().enumerate() {
            if self.interrupt.is_raised() {
                break;
            }
            if i > 0 {
                self.sink.record(
                    LogEntry::warning(EventType::FallbackTaken)
                        .tool("dd")
                        .path(sink_path)
                        .block(entry.block.label())
                        .details("read sink refused the transfer"),
                );
                self.pause();
                scratch.track(sink_path.clone());
            }
            let (result, outcome) = self.exec(&self.invocation(&file, sink_path, entry), entry);
            match outcome {
                Outcome::Success => return self.parse(&result, entry),
                Outcome::SoftFail => {}
                Outcome::HardFail => break,
            }
        }
        Cell::Failed(FailureReason::ReadFailed)
    }

    fn invocation(&self, input: &Path, output: &Path, entry: &PlanEntry) -> Invocation {
        let inv = Invocation::new(&self.dd, Capture::Stderr).args([
            format!("if={}", input.display()),
            format!("of={}", output.display()),
            format!("bs={}", entry.block.label()),
            format!("count={}", entry.record_count),
        ]);
        if self.profile.direct_io {
            inv.arg("oflag=direct")
        } else {
            inv
        }
    }

    fn exec(&self, inv: &Invocation, entry: &PlanEntry) -> (io::Result<CommandOutput>, Outcome) {
        self.sink.record(
            LogEntry::info(EventType::ToolInvoked)
                .tool("dd")
                .block(entry.block.label())
                .size(entry.total_bytes())
                .details(inv.to_string()),
        );
        let result = self.runner.run(inv);
        let outcome = classify(&result, inv.capture, Some(&DD_SOFT_FAILURE));
        let ok = outcome == Outcome::Success;
        let severity = if ok { Severity::Info } else { Severity::Warning };
        let entry = LogEntry::new(EventType::ToolOutput, severity).tool("dd").ok(ok);
        self.sink.record(match &result {
            Ok(out) => entry
                .duration_ms(out.duration_ms)
                .details(out.captured(inv.capture).trim()),
            Err(err) => entry.details(err.to_string()),
        });
        (result, outcome)
    }

    fn parse(&self, result: &io::Result<CommandOutput>, entry: &PlanEntry) -> Cell {
        let raw = result
            .as_ref()
            .map_or("", |out| out.captured(Capture::Stderr));
        match parse_dd(raw, entry.record_count) {
            Ok(measurement) => Cell::Dd(measurement),
            Err(failure) => {
                self.sink.record(
                    LogEntry::warning(EventType::ParseFailure)
                        .tool("dd")
                        .block(entry.block.label())
                        .details(failure.to_string()),
                );
                Cell::Failed(FailureReason::Unparseable)
            }
        }
    }

    /// Best effort: a failed sync is logged and ignored.
    fn sync_caches(&self) {
        if !self.profile.sync_supported {
            return;
        }
        let Some(sync) = &self.sync else { return };
        let inv = Invocation::new(sync, Capture::Stderr);
        if classify(&self.runner.run(&inv), inv.capture, None) != Outcome::Success {
            self.sink.record(
                LogEntry::warning(EventType::ToolOutput)
                    .tool("sync")
                    .ok(false)
                    .details("sync failed"),
            );
        }
    }

    fn pause(&self) {
        if !self.pause.is_zero() {
            thread::sleep(self.pause);
        }
    }
}
