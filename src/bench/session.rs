//! One benchmark pass: select targets, size, run, parse, collect rows.
//!
//! The pass is strictly sequential. Between cells the session checks the
//! interrupt flag, and when the requested method yields nothing it switches
//! once to the other method with an explanatory preface line.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::config::{Config, Language, TestMethod};
use crate::core::errors::Result;
use crate::core::interrupt::InterruptFlag;
use crate::logger::jsonl::{EventType, LogEntry};
use crate::logger::sink::{EventSink, NullSink, sink_from_config};
use crate::plan::default_dd_plan;
use crate::plan::sizing::adjust_dd_plan;
use crate::platform::pal::{Platform, detect_platform};
use crate::platform::profile::PlatformProfile;
use crate::report::{BenchmarkResult, Report, ReportKind, i18n};
use crate::runner::dd::DdRunner;
use crate::runner::exec::{CommandRunner, SystemRunner};
use crate::runner::fio::FioRunner;
use crate::runner::locate::{Tool, ToolLease, ToolLocator};
use crate::runner::winsat::WinsatRunner;
use crate::targets::probe::{FsWriteProbe, WriteProbe};
use crate::targets::selector::TargetSelector;
use crate::targets::{TargetOrigin, TestTarget};

/// Drive tested by winsat in single-path mode.
const WINSAT_DEFAULT_DRIVE: &str = "C:";

/// What the pass printed in place of, or as, its table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassBody {
    Report(Report),
    /// The tool for the method could not be run at all.
    Message(String),
}

/// Result of [`BenchSession::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassOutput {
    /// Method that produced `body`.
    pub method: TestMethod,
    /// Lines printed above the body (method switches, Windows notice).
    pub preface: Vec<String>,
    pub body: PassBody,
}

impl PassOutput {
    #[must_use]
    pub const fn report(&self) -> Option<&Report> {
        match &self.body {
            PassBody::Report(report) => Some(report),
            PassBody::Message(_) => None,
        }
    }

    #[must_use]
    pub fn render(&self, lang: Language) -> String {
        let mut out = String::new();
        for line in &self.preface {
            out.push_str(line);
            out.push('\n');
        }
        match &self.body {
            PassBody::Report(report) => out.push_str(&report.render(lang)),
            PassBody::Message(message) => {
                out.push_str(message);
                out.push('\n');
            }
        }
        out
    }
}

enum Attempt {
    Done(Report),
    Unavailable(String),
}

impl Attempt {
    fn worth_switching(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Done(report) => !report.interrupted && !report.has_measurements(),
        }
    }

    fn into_body(self) -> PassBody {
        match self {
            Self::Done(report) => PassBody::Report(report),
            Self::Unavailable(message) => PassBody::Message(message),
        }
    }
}

pub struct BenchSession {
    config: Config,
    profile: PlatformProfile,
    platform: Arc<dyn Platform>,
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn WriteProbe>,
    locator: ToolLocator,
    sink: Arc<dyn EventSink>,
    interrupt: InterruptFlag,
}

impl BenchSession {
    /// Session against the running host, with the configured log sink.
    pub fn new(config: Config) -> Result<Self> {
        let platform = detect_platform()?;
        let sink = sink_from_config(&config.logging);
        Ok(Self::with_platform(config, platform).with_sink(sink))
    }

    /// Session with real tools and probes but an injected platform.
    #[must_use]
    pub fn with_platform(config: Config, platform: Arc<dyn Platform>) -> Self {
        let locator = ToolLocator::from_config(&config.tools);
        Self {
            config,
            profile: PlatformProfile::detect(),
            platform,
            runner: Arc::new(SystemRunner),
            probe: Arc::new(FsWriteProbe),
            locator,
            sink: Arc::new(NullSink),
            interrupt: InterruptFlag::new(),
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile: PlatformProfile) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn WriteProbe>) -> Self {
        self.probe = probe;
        self
    }

    #[must_use]
    pub fn with_locator(mut self, locator: ToolLocator) -> Self {
        self.locator = locator;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.locator = self.locator.with_sink(sink.clone());
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Run one pass with the configured method.
    ///
    /// Only whole-pass problems are errors: an explicit path that cannot be
    /// created or written. Everything else ends up in the output.
    pub fn run(&self) -> Result<PassOutput> {
        let started = Instant::now();
        let requested = self.config.run.method;
        let lang = self.config.run.language;
        self.sink.record(
            LogEntry::info(EventType::PassStart)
                .tool(requested.as_str())
                .details(format!(
                    "multi_path={} explicit={}",
                    self.config.run.multi_path,
                    self.config.run.test_path.is_some()
                )),
        );

        let output = self.run_pass(requested, lang);
        let mut entry = LogEntry::info(EventType::PassComplete)
            .duration_ms(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX))
            .ok(output.is_ok());
        if let Ok(output) = &output {
            entry = entry.tool(output.method.as_str());
        }
        if let Err(err) = &output {
            entry = entry.error(err);
        }
        self.sink.record(entry);
        output
    }

    fn run_pass(&self, requested: TestMethod, lang: Language) -> Result<PassOutput> {
        if self.profile.is_windows() {
            let mut preface = Vec::new();
            if requested != TestMethod::Winsat {
                preface.push(i18n::windows_note(lang).to_string());
            }
            return Ok(PassOutput {
                method: TestMethod::Winsat,
                preface,
                body: self.run_winsat(lang).into_body(),
            });
        }
        if requested == TestMethod::Winsat {
            return Ok(PassOutput {
                method: requested,
                preface: Vec::new(),
                body: PassBody::Message(i18n::unsupported_method(requested, lang)),
            });
        }

        let targets = self.select_targets()?;
        let first = self.run_method(requested, &targets, lang)?;
        if targets.is_empty() || !first.worth_switching() {
            return Ok(PassOutput {
                method: requested,
                preface: Vec::new(),
                body: first.into_body(),
            });
        }

        let other = match requested {
            TestMethod::Fio => TestMethod::Dd,
            _ => TestMethod::Fio,
        };
        self.sink.record(
            LogEntry::warning(EventType::FallbackTaken)
                .tool(other.as_str())
                .details(format!("{requested} produced no measurements")),
        );
        let second = self.run_method(other, &targets, lang)?;
        Ok(PassOutput {
            method: other,
            preface: vec![i18n::switching(requested, lang).to_string()],
            body: second.into_body(),
        })
    }

    fn select_targets(&self) -> Result<Vec<TestTarget>> {
        let selector = TargetSelector::new(
            self.platform.clone(),
            self.probe.clone(),
            self.profile.clone(),
            &self.config.selection,
            self.sink.clone(),
        );
        selector.select(
            self.config.run.multi_path,
            self.config.run.test_path.as_deref(),
        )
    }

    fn run_method(&self, method: TestMethod, targets: &[TestTarget], lang: Language) -> Result<Attempt> {
        match method {
            TestMethod::Dd => Ok(self.run_dd(targets, lang)),
            TestMethod::Fio => self.run_fio(targets, lang),
            TestMethod::Winsat => Ok(self.run_winsat(lang)),
        }
    }

    fn locate(&self, tool: Tool) -> Option<ToolLease> {
        match self.locator.locate(tool) {
            Ok(lease) => Some(lease),
            Err(err) => {
                self.sink.record(
                    LogEntry::warning(EventType::ToolInvoked)
                        .tool(tool.name())
                        .ok(false)
                        .error(&err),
                );
                None
            }
        }
    }

    fn pause(&self) -> Duration {
        Duration::from_millis(self.config.run.pause_ms)
    }

    fn pause_between_targets(&self) {
        let pause = self.pause();
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }

    fn note_interrupt(&self, report: &mut Report, tool: &str) {
        if !report.interrupted {
            report.interrupted = true;
            self.sink
                .record(LogEntry::warning(EventType::Interrupted).tool(tool));
        }
    }

    // ──────────────────── dd ────────────────────

    fn run_dd(&self, targets: &[TestTarget], lang: Language) -> Attempt {
        let Some(dd) = self.locate(Tool::Dd) else {
            return Attempt::Unavailable(i18n::tool_unavailable(TestMethod::Dd, lang).to_string());
        };
        let mut report = Report::new(ReportKind::Dd);
        if targets.is_empty() {
            report.notes.push(i18n::no_targets(lang).to_string());
            return Attempt::Done(report);
        }

        let sync = if self.profile.sync_supported {
            self.locate(Tool::Sync)
        } else {
            None
        };
        let runner = DdRunner::new(
            self.runner.clone(),
            dd.path().to_path_buf(),
            self.profile.clone().with_direct_io(self.config.dd.direct_io),
            self.sink.clone(),
        )
        .with_sync(sync.as_ref().map(|lease| lease.path().to_path_buf()))
        .with_interrupt(self.interrupt.clone())
        .with_pause(self.pause());

        let nominal = default_dd_plan();
        let plans: Vec<_> = targets
            .iter()
            .map(|target| {
                let plan = adjust_dd_plan(&nominal, target.free_bytes);
                if plan != nominal {
                    self.sink.record(
                        LogEntry::info(EventType::PlanAdjusted)
                            .tool("dd")
                            .path(&target.path)
                            .size(plan.iter().map(|entry| entry.total_bytes()).sum())
                            .details(
                                plan.iter()
                                    .map(|entry| entry.label.as_str())
                                    .collect::<Vec<_>>()
                                    .join(", "),
                            ),
                    );
                }
                plan
            })
            .collect();

        'entries: for index in 0..nominal.len() {
            for (target, plan) in targets.iter().zip(&plans) {
                if self.interrupt.is_raised() {
                    self.note_interrupt(&mut report, "dd");
                    break 'entries;
                }
                let entry = &plan[index];
                let cells = runner.run_entry(target, entry);
                report.push(BenchmarkResult {
                    label: target.label_for(&cells.path_used),
                    block: Some(entry.label.clone()),
                    cells: vec![cells.write, cells.read],
                });
                self.pause_between_targets();
            }
        }
        Attempt::Done(report)
    }

    // ──────────────────── fio ────────────────────

    fn run_fio(&self, targets: &[TestTarget], lang: Language) -> Result<Attempt> {
        let Some(fio) = self.locate(Tool::Fio) else {
            return Ok(Attempt::Unavailable(
                i18n::tool_unavailable(TestMethod::Fio, lang).to_string(),
            ));
        };
        let mut report = Report::new(ReportKind::Fio);
        if targets.is_empty() {
            report.notes.push(i18n::no_targets(lang).to_string());
            return Ok(Attempt::Done(report));
        }

        // Without `timeout`, fio runs unbounded.
        let timeout = self.locate(Tool::Timeout);
        let blocks = self.config.fio_block_sizes()?;
        let runner = FioRunner::new(
            self.runner.clone(),
            fio.path().to_path_buf(),
            self.profile.clone(),
            &self.config.fio,
            blocks.clone(),
            self.platform.clone(),
            self.sink.clone(),
        )
        .with_timeout(timeout.as_ref().map(|lease| lease.path().to_path_buf()))
        .with_interrupt(self.interrupt.clone())
        .with_pause(self.pause());

        for target in targets {
            if self.interrupt.is_raised() {
                self.note_interrupt(&mut report, "fio");
                break;
            }
            let run = runner.run_target(target);
            if let Some(failure) = run.setup_failure {
                if target.origin == TargetOrigin::Explicit && !failure.is_empty() {
                    report.notes.push(failure);
                }
            }
            let label = target.label_for(&run.path_used);
            for row in run.rows {
                report.push(BenchmarkResult {
                    label: label.clone(),
                    block: Some(row.block.label().to_string()),
                    cells: row.cells,
                });
            }
            self.pause_between_targets();
        }
        if self.interrupt.is_raised() {
            // The runner already logged where the sweep stopped.
            report.interrupted = true;
        }
        Ok(Attempt::Done(report))
    }

    // ──────────────────── winsat ────────────────────

    fn run_winsat(&self, lang: Language) -> Attempt {
        let Some(winsat) = self.locate(Tool::Winsat) else {
            return Attempt::Unavailable(
                i18n::tool_unavailable(TestMethod::Winsat, lang).to_string(),
            );
        };
        let runner = WinsatRunner::new(
            self.runner.clone(),
            winsat.path().to_path_buf(),
            self.sink.clone(),
        );
        let mut report = Report::new(ReportKind::Winsat);
        let drives = self.winsat_drives();
        if drives.is_empty() {
            report.notes.push(i18n::no_targets(lang).to_string());
        }
        for drive in drives {
            if self.interrupt.is_raised() {
                self.note_interrupt(&mut report, "winsat");
                break;
            }
            let cells = runner.run_drive(&drive);
            report.push(BenchmarkResult {
                label: drive,
                block: None,
                cells,
            });
        }
        Attempt::Done(report)
    }

    /// The explicit path, every enumerated drive, or `C:`.
    fn winsat_drives(&self) -> Vec<String> {
        if let Some(path) = &self.config.run.test_path {
            return vec![path.display().to_string()];
        }
        if !self.config.run.multi_path {
            return vec![WINSAT_DEFAULT_DRIVE.to_string()];
        }
        match self.platform.mount_points() {
            Ok(mounts) => {
                let mut drives: Vec<String> = mounts.into_iter().map(|m| m.device).collect();
                drives.dedup();
                drives
            }
            Err(err) => {
                self.sink.record(
                    LogEntry::warning(EventType::PartitionSeen)
                        .tool("winsat")
                        .ok(false)
                        .error(&err),
                );
                Vec::new()
            }
        }
    }
}
