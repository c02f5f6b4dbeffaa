//! Subprocess execution behind a trait so the pipeline can run against a
//! scripted runner in tests.

#![allow(missing_docs)]

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use parking_lot::Mutex;

use crate::runner::patterns::PatternTable;

/// Which stream carries the text a caller wants to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    Stdout,
    Stderr,
}

/// A fully-resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub capture: Capture,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, capture: Capture) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            capture,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// File name of the program, for matching and logging.
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map_or_else(|| self.program.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    #[must_use]
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a.contains(needle))
    }

    /// Prefix this invocation with a `timeout <secs>` wrapper.
    #[must_use]
    pub fn wrapped_in_timeout(self, timeout: &Path, secs: u64) -> Self {
        let mut args = vec![secs.to_string(), self.program.display().to_string()];
        args.extend(self.args);
        Self {
            program: timeout.to_path_buf(),
            args,
            capture: self.capture,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    /// The stream the invocation asked for.
    #[must_use]
    pub fn captured(&self, capture: Capture) -> &str {
        match capture {
            Capture::Stdout => &self.stdout,
            Capture::Stderr => &self.stderr,
        }
    }
}

/// Classification of one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Ran but refused: non-zero exit or a known error phrase. Worth a fallback.
    SoftFail,
    /// Could not be started at all.
    HardFail,
}

/// Classify a run result, treating any phrase from `table` as a soft failure.
#[must_use]
pub fn classify(
    result: &io::Result<CommandOutput>,
    capture: Capture,
    table: Option<&PatternTable>,
) -> Outcome {
    match result {
        Err(_) => Outcome::HardFail,
        Ok(out) if !out.success => Outcome::SoftFail,
        Ok(out) if table.is_some_and(|t| t.matches(out.captured(capture)).is_some()) => {
            Outcome::SoftFail
        }
        Ok(_) => Outcome::Success,
    }
}

/// Runs external commands to completion.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
}

/// Real subprocesses via `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        let start = Instant::now();
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}

// ──────────────────── scripted runner ────────────────────

type Matcher = Box<dyn Fn(&Invocation) -> bool + Send + Sync>;

/// Canned reply for a [`ScriptedRunner`] rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Exit {
        success: bool,
        stdout: String,
        stderr: String,
    },
    /// The program could not be spawned.
    SpawnError,
}

impl Reply {
    pub fn ok_stdout(text: impl Into<String>) -> Self {
        Self::Exit {
            success: true,
            stdout: text.into(),
            stderr: String::new(),
        }
    }

    pub fn ok_stderr(text: impl Into<String>) -> Self {
        Self::Exit {
            success: true,
            stdout: String::new(),
            stderr: text.into(),
        }
    }

    pub fn fail_stderr(text: impl Into<String>) -> Self {
        Self::Exit {
            success: false,
            stdout: String::new(),
            stderr: text.into(),
        }
    }
}

struct Rule {
    matcher: Matcher,
    reply: Reply,
    remaining: Option<usize>,
}

/// Deterministic [`CommandRunner`] that answers from a rule list and records
/// every invocation. Unmatched invocations fail to spawn.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every matching invocation with `reply`.
    #[must_use]
    pub fn on<F>(self, matcher: F, reply: Reply) -> Self
    where
        F: Fn(&Invocation) -> bool + Send + Sync + 'static,
    {
        self.push(Box::new(matcher), reply, None)
    }

    /// Answer only the first `times` matching invocations with `reply`.
    #[must_use]
    pub fn on_times<F>(self, times: usize, matcher: F, reply: Reply) -> Self
    where
        F: Fn(&Invocation) -> bool + Send + Sync + 'static,
    {
        self.push(Box::new(matcher), reply, Some(times))
    }

    fn push(self, matcher: Matcher, reply: Reply, remaining: Option<usize>) -> Self {
        self.rules.lock().push(Rule {
            matcher,
            reply,
            remaining,
        });
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn calls_matching(&self, pred: impl Fn(&Invocation) -> bool) -> usize {
        self.calls.lock().iter().filter(|inv| pred(inv)).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        self.calls.lock().push(invocation.clone());
        let reply = {
            let mut rules = self.rules.lock();
            rules
                .iter_mut()
                .find(|rule| rule.remaining != Some(0) && (rule.matcher)(invocation))
                .map(|rule| {
                    if let Some(left) = rule.remaining.as_mut() {
                        *left -= 1;
                    }
                    rule.reply.clone()
                })
        };
        match reply {
            Some(Reply::Exit {
                success,
                stdout,
                stderr,
            }) => Ok(CommandOutput {
                success,
                code: Some(i32::from(!success)),
                stdout,
                stderr,
                duration_ms: 0,
            }),
            Some(Reply::SpawnError) | None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no scripted reply for {invocation}"),
            )),
        }
    }
}

/// Matcher: program file name equals `name`.
pub fn program(name: &'static str) -> impl Fn(&Invocation) -> bool + Send + Sync + 'static {
    move |inv| inv.program_name() == name || (inv.program_name() == "timeout" && inv.args.get(1).is_some_and(|p| Path::new(p).file_name().is_some_and(|n| n == name)))
}

/// Matcher: program is `name` and some argument contains `needle`.
pub fn program_with_arg(
    name: &'static str,
    needle: &'static str,
) -> impl Fn(&Invocation) -> bool + Send + Sync + 'static {
    let is_program = program(name);
    move |inv| is_program(inv) && inv.has_arg(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::patterns::DD_SOFT_FAILURE;

    #[test]
    fn invocation_display_joins_args() {
        let inv = Invocation::new("/bin/dd", Capture::Stderr)
            .arg("if=/dev/zero")
            .arg("of=/tmp/100MB.test");
        assert_eq!(inv.to_string(), "/bin/dd if=/dev/zero of=/tmp/100MB.test");
        assert_eq!(inv.program_name(), "dd");
    }

    #[test]
    fn timeout_wrapper_prefixes_program() {
        let inv = Invocation::new("/usr/bin/fio", Capture::Stdout)
            .arg("--minimal")
            .wrapped_in_timeout(Path::new("/usr/bin/timeout"), 35);
        assert_eq!(inv.to_string(), "/usr/bin/timeout 35 /usr/bin/fio --minimal");
        assert!(program("fio")(&inv));
    }

    #[test]
    fn classify_covers_all_outcomes() {
        let ok = Ok(CommandOutput {
            success: true,
            stderr: "104857600 bytes copied".to_string(),
            ..CommandOutput::default()
        });
        assert_eq!(classify(&ok, Capture::Stderr, Some(&DD_SOFT_FAILURE)), Outcome::Success);

        let phrase = Ok(CommandOutput {
            success: true,
            stderr: "dd: /dev/null: Permission denied".to_string(),
            ..CommandOutput::default()
        });
        assert_eq!(classify(&phrase, Capture::Stderr, Some(&DD_SOFT_FAILURE)), Outcome::SoftFail);
        assert_eq!(classify(&phrase, Capture::Stderr, None), Outcome::Success);

        let exit = Ok(CommandOutput::default());
        assert_eq!(classify(&exit, Capture::Stderr, None), Outcome::SoftFail);

        let spawn: io::Result<CommandOutput> = Err(io::Error::other("missing"));
        assert_eq!(classify(&spawn, Capture::Stderr, None), Outcome::HardFail);
    }

    #[test]
    fn scripted_runner_honours_rule_order_and_counts() {
        let runner = ScriptedRunner::new()
            .on_times(1, program("dd"), Reply::fail_stderr("first"))
            .on(program("dd"), Reply::ok_stderr("second"));
        let inv = Invocation::new("dd", Capture::Stderr);

        let first = runner.run(&inv).unwrap();
        assert!(!first.success);
        assert_eq!(first.stderr, "first");
        let second = runner.run(&inv).unwrap();
        assert_eq!(second.stderr, "second");
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn unmatched_invocations_fail_to_spawn() {
        let runner = ScriptedRunner::new();
        let err = runner
            .run(&Invocation::new("fio", Capture::Stdout))
            .expect_err("no rule");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    #[cfg(unix)]
    fn system_runner_captures_both_streams() {
        let out = SystemRunner
            .run(&Invocation::new("sh", Capture::Stderr).args(["-c", "echo out; echo err >&2"]))
            .expect("sh runs");
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.captured(Capture::Stderr).trim(), "err");
    }
}
