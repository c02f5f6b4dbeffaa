//! fio runs: engine probe, backing-file setup, then one randrw job per block.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use crate::core::config::FioConfig;
use crate::core::interrupt::InterruptFlag;
use crate::logger::jsonl::{EventType, LogEntry};
use crate::logger::sink::EventSink;
use crate::parse::parse_fio;
use crate::plan::sizing::plan_fio;
use crate::plan::{BlockSize, FioPlan};
use crate::platform::pal::Platform;
use crate::platform::profile::PlatformProfile;
use crate::report::{Cell, FailureReason};
use crate::runner::exec::{Capture, CommandRunner, Invocation, Outcome, classify};
use crate::runner::patterns::FIO_SETUP_FAILURE;
use crate::runner::scratch::ScratchGuard;
use crate::targets::TestTarget;

/// Engine every fio build supports.
pub const FALLBACK_ENGINE: &str = "psync";
const BACKING_FILE: &str = "test.fio";
const ENGINE_CHECK_FILE: &str = "fio_engine_check";

/// One block size of the sweep: read, write and total cells.
#[derive(Debug, Clone, PartialEq)]
pub struct FioRow {
    pub block: BlockSize,
    pub cells: Vec<Cell>,
}

/// Outcome of benchmarking one target.
#[derive(Debug, Clone, PartialEq)]
pub struct FioTargetRun {
    pub path_used: PathBuf,
    /// fio's stderr when no directory accepted the backing file.
    pub setup_failure: Option<String>,
    pub rows: Vec<FioRow>,
}

pub struct FioRunner {
    runner: Arc<dyn CommandRunner>,
    fio: PathBuf,
    timeout: Option<PathBuf>,
    profile: PlatformProfile,
    config: FioConfig,
    blocks: Vec<BlockSize>,
    platform: Arc<dyn Platform>,
    sink: Arc<dyn EventSink>,
    interrupt: InterruptFlag,
    pause: Duration,
    engine: OnceLock<String>,
}

impl FioRunner {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        fio: PathBuf,
        profile: PlatformProfile,
        config: &FioConfig,
        blocks: Vec<BlockSize>,
        platform: Arc<dyn Platform>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            runner,
            fio,
            timeout: None,
            profile,
            config: config.clone(),
            blocks,
            platform,
            sink,
            interrupt: InterruptFlag::new(),
            pause: Duration::from_secs(1),
            engine: OnceLock::new(),
        }
    }

    /// Bound each sweep job with `timeout <secs>`. Ignored on Windows.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<PathBuf>) -> Self {
        self.timeout = timeout;
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

    /// The io engine for this pass, probed on first use.
    pub fn engine(&self) -> &str {
        self.engine.get_or_init(|| self.probe_engine())
    }

    fn probe_engine(&self) -> String {
        let check_file = self.profile.temp_dir.join(ENGINE_CHECK_FILE);
        for engine in &self.profile.io_engines {
            let inv = Invocation::new(&self.fio, Capture::Stdout).args([
                "--name=check".to_string(),
                format!("--ioengine={engine}"),
                "--runtime=1".to_string(),
                "--size=1M".to_string(),
                self.direct_arg().to_string(),
                format!("--filename={}", check_file.display()),
                "--minimal".to_string(),
            ]);
            let outcome = classify(&self.runner.run(&inv), inv.capture, None);
            let _ = fs::remove_file(&check_file);
            if outcome == Outcome::Success {
                self.log_engine(engine);
                return (*engine).to_string();
            }
        }
        self.log_engine(FALLBACK_ENGINE);
        FALLBACK_ENGINE.to_string()
    }

    fn log_engine(&self, engine: &str) {
        self.sink.record(
            LogEntry::info(EventType::IoEngineSelected)
                .tool("fio")
                .details(engine),
        );
    }

    /// Set up the backing file (in the fallback directory if the primary
    /// refuses it), then run the block sweep. Scratch files are gone on return.
    pub fn run_target(&self, target: &TestTarget) -> FioTargetRun {
        let mut scratch = ScratchGuard::new(self.sink.clone());
        let dirs: Vec<&Path> = std::iter::once(target.path.as_path())
            .chain(target.fallback.as_deref())
            .collect();

        let mut setup_failure = None;
        let mut path_used = target.path.clone();
        for (i, dir) in dirs.iter().enumerate() {
            if i > 0 {
                if self.interrupt.is_raised() {
                    break;
                }
                self.sink.record(
                    LogEntry::warning(EventType::FallbackTaken)
                        .tool("fio")
                        .path(dir)
                        .details("backing file setup rejected"),
                );
            }
            let free = if *dir == target.path {
                target.free_bytes
            } else {
                self.platform.fs_stats(dir).ok().map(|s| s.free_bytes)
            };
            path_used = dir.to_path_buf();
            let plan = self.plan(dir, free);
            match self.setup(dir, &plan, &mut scratch) {
                Ok(()) => {
                    self.pause();
                    return FioTargetRun {
                        path_used: dir.to_path_buf(),
                        setup_failure: None,
                        rows: self.sweep(dir, &plan),
                    };
                }
                Err(output) => setup_failure = Some(output),
            }
        }

        FioTargetRun {
            path_used,
            setup_failure,
            rows: Vec::new(),
        }
    }

    fn plan(&self, dir: &Path, free: Option<u64>) -> FioPlan {
        let plan = plan_fio(self.profile.fio_size_class, free, self.blocks.clone());
        let details = match free {
            Some(free) => format!("--size={} free={free}", plan.size_arg),
            None => format!("--size={} free=unknown", plan.size_arg),
        };
        self.sink.record(
            LogEntry::info(EventType::PlanAdjusted)
                .tool("fio")
                .path(dir)
                .size(plan.size_bytes)
                .details(details),
        );
        plan
    }

    /// Materialize the backing file with a short sequential read job.
    fn setup(&self, dir: &Path, plan: &FioPlan, scratch: &mut ScratchGuard) -> Result<(), String> {
        let file = scratch.track(dir.join(BACKING_FILE));
        let inv = Invocation::new(&self.fio, Capture::Stderr).args([
            "--name=setup".to_string(),
            format!("--ioengine={}", self.engine()),
            "--rw=read".to_string(),
            "--bs=64k".to_string(),
            format!("--iodepth={}", self.config.iodepth),
            format!("--numjobs={}", self.config.numjobs),
            format!("--size={}", plan.size_arg),
            format!("--runtime={}", self.config.warmup_runtime_secs),
            "--gtod_reduce=1".to_string(),
            format!("--filename={}", file.display()),
            self.direct_arg().to_string(),
            "--minimal".to_string(),
        ]);
        self.log_invocation(&inv, None);
        let result = self.runner.run(&inv);
        let outcome = classify(&result, inv.capture, Some(&FIO_SETUP_FAILURE));
        let text = match &result {
            Ok(out) => out.stderr.trim().to_string(),
            Err(err) => err.to_string(),
        };
        self.sink.record(
            LogEntry::info(EventType::ToolOutput)
                .tool("fio")
                .path(dir)
                .ok(outcome == Outcome::Success)
                .details(text.clone()),
        );
        if outcome == Outcome::Success {
            Ok(())
        } else {
            Err(text)
        }
    }

    fn sweep(&self, dir: &Path, plan: &FioPlan) -> Vec<FioRow> {
        let file = dir.join(BACKING_FILE);
        let mut rows = Vec::with_capacity(plan.blocks.len());
        for block in &plan.blocks {
            if self.interrupt.is_raised() {
                self.sink.record(
                    LogEntry::warning(EventType::Interrupted)
                        .tool("fio")
                        .block(block.label()),
                );
                break;
            }
            let job = format!("rand_rw_{}", block.label());
            let inv = self.sweep_invocation(&job, block, plan, &file);
            self.log_invocation(&inv, Some(block));
            let result = self.runner.run(&inv);
            let cells = match (classify(&result, inv.capture, None), &result) {
                (Outcome::Success, Ok(out)) => match parse_fio(&out.stdout, &job) {
                    Ok(m) => vec![Cell::Fio(m.read), Cell::Fio(m.write), Cell::Fio(m.total())],
                    Err(failure) => {
                        self.sink.record(
                            LogEntry::warning(EventType::ParseFailure)
                                .tool("fio")
                                .block(block.label())
                                .details(failure.to_string()),
                        );
                        vec![Cell::Failed(FailureReason::Unparseable); 3]
                    }
                },
                _ => {
                    let details = match &result {
                        Ok(out) => out.stderr.trim().to_string(),
                        Err(err) => err.to_string(),
                    };
                    self.sink.record(
                        LogEntry::warning(EventType::ToolOutput)
                            .tool("fio")
                            .block(block.label())
                            .ok(false)
                            .details(details),
                    );
                    vec![Cell::Failed(FailureReason::ToolFailed); 3]
                }
            };
            rows.push(FioRow {
                block: block.clone(),
                cells,
            });
        }
        rows
    }

    fn sweep_invocation(&self, job: &str, block: &BlockSize, plan: &FioPlan, file: &Path) -> Invocation {
        let mut args = vec![
            format!("--name={job}"),
            format!("--ioengine={}", self.engine()),
            "--rw=randrw".to_string(),
            "--rwmixread=50".to_string(),
            format!("--bs={}", block.label()),
            format!("--iodepth={}", self.config.iodepth),
            format!("--numjobs={}", self.config.numjobs),
            format!("--size={}", plan.size_arg),
            format!("--runtime={}", self.config.runtime_secs),
        ];
        if self.profile.direct_io {
            args.push("--gtod_reduce=1".to_string());
        }
        args.push(self.direct_arg().to_string());
        args.push(format!("--filename={}", file.display()));
        args.push("--group_reporting".to_string());
        args.push("--minimal".to_string());

        let inv = Invocation::new(&self.fio, Capture::Stdout).args(args);
        match &self.timeout {
            Some(timeout) if !self.profile.is_windows() => {
                inv.wrapped_in_timeout(timeout, self.config.timeout_secs)
            }
            _ => inv,
        }
    }

    fn direct_arg(&self) -> &'static str {
        if self.profile.direct_io {
            "--direct=1"
        } else {
            "--direct=0"
        }
    }

    fn log_invocation(&self, inv: &Invocation, block: Option<&BlockSize>) {
        let mut entry = LogEntry::info(EventType::ToolInvoked)
            .tool("fio")
            .details(inv.to_string());
        if let Some(block) = block {
            entry = entry.block(block.label());
        }
        self.sink.record(entry);
    }

    fn pause(&self) {
        if !self.pause.is_zero() {
            thread::sleep(self.pause);
        }
    }
}
