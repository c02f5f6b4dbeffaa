//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use thiserror::Error;

use disktest::bench::BenchSession;
use disktest::core::config::{Config, Language, TestMethod};
use disktest::core::errors::DtError;
use disktest::core::interrupt::InterruptFlag;

const SEPARATOR: &str = "--------------------------------------------------";

/// disktest: disk I/O benchmark driving dd, fio or winsat.
#[derive(Debug, Parser)]
#[command(
    name = "disktest",
    author,
    version,
    about = "Disk I/O benchmark: dd, fio or winsat across writable paths",
    long_about = None
)]
pub struct Cli {
    /// Report language.
    #[arg(short, long, value_enum, value_name = "LANG")]
    lang: Option<LangArg>,
    /// Benchmark tool.
    #[arg(short, long, value_enum, value_name = "METHOD")]
    method: Option<MethodArg>,
    /// Test the default path only, or every writable partition.
    #[arg(short = 'd', long = "disk", value_enum, value_name = "MODE")]
    disk: Option<DiskArg>,
    /// Test exactly this directory (created if missing).
    #[arg(short, long, value_name = "PATH")]
    path: Option<PathBuf>,
    /// Write the JSONL activity log.
    #[arg(long)]
    log: bool,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Optional subcommand; without one a benchmark pass runs.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LangArg {
    En,
    Zh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    Fio,
    Dd,
    Winsat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DiskArg {
    Single,
    Multi,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// The pass was interrupted; a partial report was printed.
    #[error("{0}")]
    Partial(String),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Partial(_) => 4,
        }
    }
}

impl From<DtError> for CliError {
    fn from(err: DtError) -> Self {
        match err {
            DtError::InvalidConfig { .. }
            | DtError::MissingConfig { .. }
            | DtError::ConfigParse { .. }
            | DtError::PermissionDenied { .. } => Self::User(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch: completions, or one benchmark pass.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    if let Some(Command::Completions(args)) = &cli.command {
        let mut command = Cli::command();
        let binary_name = command.get_name().to_string();
        generate(args.shell, &mut command, binary_name, &mut io::stdout());
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    apply_overrides(cli, &mut config);
    let lang = config.run.language;

    let session = BenchSession::new(config)?.with_interrupt(InterruptFlag::install());
    let output = session.run()?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{SEPARATOR}")?;
    write!(stdout, "{}", output.render(lang))?;
    writeln!(stdout, "{SEPARATOR}")?;
    stdout.flush()?;

    if output.report().is_some_and(|report| report.interrupted) {
        return Err(CliError::Partial("interrupted before the pass completed".to_string()));
    }
    Ok(())
}

/// Flags win over the config file and environment.
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(lang) = cli.lang {
        config.run.language = match lang {
            LangArg::En => Language::En,
            LangArg::Zh => Language::Zh,
        };
    }
    if let Some(method) = cli.method {
        config.run.method = match method {
            MethodArg::Fio => TestMethod::Fio,
            MethodArg::Dd => TestMethod::Dd,
            MethodArg::Winsat => TestMethod::Winsat,
        };
    }
    if let Some(disk) = cli.disk {
        config.run.multi_path = disk == DiskArg::Multi;
    }
    if let Some(path) = &cli.path {
        config.run.test_path = Some(path.clone());
    }
    if cli.log {
        config.logging.enabled = true;
    }
}

/// Print a CLI error to stderr.
pub fn report_error(err: &CliError) {
    eprintln!("{} {err}", "disktest:".red().bold());
}
