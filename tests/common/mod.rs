#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use disktest::core::config::{Config, Language, TestMethod, ToolsConfig};
use disktest::logger::sink::MemorySink;
use disktest::platform::pal::Platform;
use disktest::platform::profile::{FioSizeClass, OsKind, PlatformProfile};
use disktest::runner::exec::ScriptedRunner;
use disktest::runner::locate::ToolLocator;
use disktest::targets::probe::WriteProbe;
use disktest::bench::BenchSession;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_disktest") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "disktest.exe" } else { "disktest" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve disktest binary path for integration test"),
    }
}

/// Run the binary, keeping a transcript of the run for failed assertions.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("disktest-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("RUST_BACKTRACE", "1")
        .env_remove("DISKTEST_METHOD")
        .env_remove("DISKTEST_TEST_PATH")
        .output()
        .expect("execute disktest command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// GNU dd summary for 25600 records of 4 KiB.
pub const GNU_DD: &str = "25600+0 records in\n25600+0 records out\n104857600 bytes (105 MB, 100 MiB) copied, 4.67162 s, 22.4 MB/s\n";

/// One fio terse v3 line for `job`.
pub fn fio_terse(job: &str, read_kbps: u64, read_iops: u64, write_kbps: u64, write_iops: u64) -> String {
    let mut fields: Vec<String> = vec!["0".to_string(); 130];
    fields[0] = "3".to_string();
    fields[1] = "fio-3.33".to_string();
    fields[2] = job.to_string();
    fields[6] = read_kbps.to_string();
    fields[7] = read_iops.to_string();
    fields[47] = write_kbps.to_string();
    fields[48] = write_iops.to_string();
    format!("{}\n", fields.join(";"))
}

/// Scratch home/temp directories plus placeholder tool binaries.
pub struct FakeHost {
    pub home: tempfile::TempDir,
    pub tmp: tempfile::TempDir,
    pub bin: tempfile::TempDir,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            home: tempfile::tempdir().expect("home dir"),
            tmp: tempfile::tempdir().expect("tmp dir"),
            bin: tempfile::tempdir().expect("bin dir"),
        }
    }

    /// A file the tool locator accepts as a configured binary.
    pub fn tool(&self, name: &str) -> PathBuf {
        let path = self.bin.path().join(name);
        fs::write(&path, b"#!/bin/sh\n").expect("write tool placeholder");
        path
    }

    pub fn profile(&self, os: OsKind) -> PlatformProfile {
        PlatformProfile::for_os(
            os,
            FioSizeClass::Standard,
            self.home.path().to_path_buf(),
            self.tmp.path().to_path_buf(),
        )
    }

    /// Config with no pauses, English output and only configured tools.
    pub fn config(&self, method: TestMethod, tools: &[&str]) -> Config {
        let mut tools_config = ToolsConfig {
            search_path: false,
            ..ToolsConfig::default()
        };
        for tool in tools {
            let path = Some(self.tool(tool));
            match *tool {
                "dd" => tools_config.dd = path,
                "fio" => tools_config.fio = path,
                "winsat" => tools_config.winsat = path,
                "timeout" => tools_config.timeout = path,
                "sync" => tools_config.sync = path,
                other => panic!("unknown tool {other}"),
            }
        }
        let mut config = Config::default();
        config.run.method = method;
        config.run.language = Language::En;
        config.run.pause_ms = 0;
        config.tools = tools_config;
        config
    }

    pub fn session(
        &self,
        config: Config,
        platform: Arc<dyn Platform>,
        probe: Arc<dyn WriteProbe>,
        runner: ScriptedRunner,
    ) -> (BenchSession, Arc<ScriptedRunner>, Arc<MemorySink>) {
        let runner = Arc::new(runner);
        let sink = Arc::new(MemorySink::new());
        let locator = ToolLocator::from_config(&config.tools);
        let session = BenchSession::with_platform(config, platform)
            .with_profile(self.profile(OsKind::Linux))
            .with_runner(runner.clone())
            .with_probe(probe)
            .with_locator(locator)
            .with_sink(sink.clone());
        (session, runner, sink)
    }
}

pub fn label_of(path: &Path) -> String {
    path.display().to_string()
}
