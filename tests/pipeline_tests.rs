//! Full-pipeline scenarios: selection → sizing → scripted tools → report.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{FakeHost, GNU_DD, fio_terse};
use disktest::core::config::{Language, TestMethod};
use disktest::logger::jsonl::EventType;
use disktest::logger::sink::MemorySink;
use disktest::plan::default_dd_plan;
use disktest::platform::pal::{MockPlatform, MountPoint};
use disktest::platform::profile::OsKind;
use disktest::report::{Cell, FailureReason};
use disktest::runner::dd::DdRunner;
use disktest::runner::exec::{Invocation, Reply, ScriptedRunner, program, program_with_arg};
use disktest::targets::probe::StaticProbe;
use disktest::targets::{TargetOrigin, TestTarget};

const GB: u64 = 1_000_000_000;
const GIB: u64 = 1024 * 1024 * 1024;

fn fio_sweep(runner: ScriptedRunner) -> ScriptedRunner {
    ["4k", "64k", "512k", "1m"].iter().fold(runner, |runner, block| {
        let job = format!("rand_rw_{block}");
        let name = format!("--name={job}");
        runner.on(
            move |inv: &Invocation| inv.program_name() == "fio" && inv.has_arg(&name),
            Reply::ok_stdout(fio_terse(&job, 190_530, 47_632, 191_070, 47_767)),
        )
    })
}

fn fio_ready(runner: ScriptedRunner) -> ScriptedRunner {
    fio_sweep(
        runner
            .on(program_with_arg("fio", "--name=check"), Reply::ok_stdout(""))
            .on(program_with_arg("fio", "--name=setup"), Reply::ok_stderr("")),
    )
}

#[test]
fn multi_path_never_selects_pseudo_filesystems() {
    let host = FakeHost::new();
    let mut config = host.config(TestMethod::Fio, &["fio"]);
    config.run.multi_path = true;
    let platform = MockPlatform::default()
        .with_mount(MountPoint::new("/dev/sdb1", "/data", "ext4"), 1000 * GB, 500 * GB)
        .with_mount(MountPoint::new("tmpfs", "/scratch", "tmpfs"), 100 * GB, 100 * GB)
        .with_mount(MountPoint::new("overlay", "/merged", "overlay"), 100 * GB, 100 * GB)
        .with_mount(MountPoint::new("/dev/loop7", "/media/iso", "iso9660"), GB, 0)
        .with_mount(MountPoint::new("proc", "/proc", "proc"), 0, 0);
    let (session, calls, sink) = host.session(
        config,
        Arc::new(platform),
        Arc::new(StaticProbe::allow_all()),
        fio_ready(ScriptedRunner::new()),
    );

    let output = session.run().expect("pass");
    assert_eq!(output.method, TestMethod::Fio);
    let report = output.report().expect("report");
    assert_eq!(report.rows.len(), 4);
    assert!(report.rows.iter().all(|row| row.label == "/dev/sdb1"));
    let blocks: Vec<&str> = report.rows.iter().filter_map(|r| r.block.as_deref()).collect();
    assert_eq!(blocks, vec!["4k", "64k", "512k", "1m"]);
    assert_eq!(sink.count(EventType::TargetRejected), 4);
    assert_eq!(sink.count(EventType::IoEngineSelected), 1);
    assert!(
        calls
            .calls()
            .iter()
            .all(|inv| !inv.args.iter().any(|a| a.contains("/scratch") || a.contains("/merged")))
    );
}

#[test]
fn large_run_mounts_are_data_volumes() {
    let host = FakeHost::new();
    let mut config = host.config(TestMethod::Fio, &["fio"]);
    config.run.multi_path = true;
    let platform = MockPlatform::default()
        .with_mount(MountPoint::new("/dev/sdc1", "/run/media/big", "ext4"), 60 * GB, 50 * GB)
        .with_mount(MountPoint::new("/dev/sdd1", "/run/media/small", "ext4"), 10 * GB, 5 * GB);
    let (session, _, _) = host.session(
        config,
        Arc::new(platform),
        Arc::new(StaticProbe::allow_all()),
        fio_ready(ScriptedRunner::new()),
    );

    let output = session.run().expect("pass");
    let report = output.report().expect("report");
    let mut labels: Vec<&str> = report.rows.iter().map(|r| r.label.as_str()).collect();
    labels.dedup();
    assert_eq!(labels, vec!["/dev/sdc1"]);
}

#[test]
fn exhausted_read_sinks_fail_the_cell_without_panicking() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = FakeHost::new();
    let runner = ScriptedRunner::new()
        .on(
            |inv: &Invocation| inv.program_name() == "dd" && inv.has_arg("if=/dev/zero"),
            Reply::ok_stderr(GNU_DD),
        )
        .on(program("dd"), Reply::ok_stderr("dd: failed to open '/dev/null': Permission denied"));
    let runner = Arc::new(runner);
    let sink = Arc::new(MemorySink::new());
    let dd = DdRunner::new(
        runner.clone(),
        PathBuf::from("dd"),
        host.profile(OsKind::Linux),
        sink.clone(),
    )
    .with_pause(Duration::ZERO);
    let target = TestTarget {
        device: String::new(),
        path: dir.path().to_path_buf(),
        fs_type: "ext4".to_string(),
        free_bytes: None,
        total_bytes: None,
        preferred: true,
        fallback: None,
        origin: TargetOrigin::Explicit,
    };

    let entry = &default_dd_plan()[0];
    let cells = dd.run_entry(&target, entry);
    assert!(matches!(cells.write, Cell::Dd(_)));
    assert_eq!(cells.read, Cell::Failed(FailureReason::ReadFailed));
    // The null sink, then the file next to the test file.
    assert_eq!(runner.calls_matching(|inv| inv.has_arg(&format!("if={}", dir.path().join(&entry.file_name).display()))), 2);
    assert!(std::fs::read_dir(dir.path()).expect("read dir").next().is_none());
}

#[test]
fn every_failure_still_yields_a_report() {
    let host = FakeHost::new();
    let config = host.config(TestMethod::Dd, &["dd", "fio"]);
    let runner = ScriptedRunner::new()
        .on(program("dd"), Reply::fail_stderr("dd: Permission denied"))
        .on(program_with_arg("fio", "--name=check"), Reply::ok_stdout(""))
        .on(program("fio"), Reply::fail_stderr("fio: Permission denied"));
    let (session, _, _) = host.session(
        config,
        Arc::new(MockPlatform::default()),
        Arc::new(StaticProbe::allow_all()),
        runner,
    );

    let output = session.run().expect("pass");
    assert_eq!(output.method, TestMethod::Fio);
    assert_eq!(
        output.preface,
        vec!["DD test failed, switching to Fio for testing."]
    );
    let rendered = output.render(Language::En);
    assert!(rendered.contains("Test Path"));
}

#[test]
fn empty_target_list_renders_header_only() {
    let host = FakeHost::new();
    let config = host.config(TestMethod::Fio, &["fio"]);
    let (session, calls, _) = host.session(
        config,
        Arc::new(MockPlatform::failing_enumeration()),
        Arc::new(StaticProbe::deny_all()),
        ScriptedRunner::new(),
    );

    let output = session.run().expect("pass");
    let rendered = output.render(Language::En);
    let mut lines = rendered.lines();
    assert!(lines.next().expect("header").starts_with("Test Path"));
    assert_eq!(lines.next(), Some("No testable paths found."));
    assert_eq!(lines.next(), None);
    assert!(calls.calls().is_empty());
}

#[test]
fn single_mode_adds_large_volumes_after_home() {
    let host = FakeHost::new();
    let config = host.config(TestMethod::Dd, &["dd"]);
    let platform = MockPlatform::default()
        .with_mount(MountPoint::new("/dev/nvme1n1", "/srv/archive", "xfs"), 4000 * GIB, 3000 * GIB)
        .with_mount(MountPoint::new("/dev/nvme2n1", "/srv/small", "xfs"), 200 * GIB, 100 * GIB);
    let (session, _, _) = host.session(
        config,
        Arc::new(platform),
        Arc::new(StaticProbe::allow_all()),
        ScriptedRunner::new().on(program("dd"), Reply::ok_stderr(GNU_DD)),
    );

    let output = session.run().expect("pass");
    let report = output.report().expect("report");
    let home = host.home.path().display().to_string();
    let labels: Vec<&str> = report.rows.iter().map(|r| r.label.as_str()).collect();
    // Block-size outer, target inner.
    assert_eq!(labels, vec![home.as_str(), "/dev/nvme1n1", home.as_str(), "/dev/nvme1n1"]);
    assert!(report.has_measurements());
}

#[test]
fn explicit_path_is_created_and_dd_takes_over_from_fio() {
    let host = FakeHost::new();
    let dir = tempfile::tempdir().expect("tempdir");
    let explicit = dir.path().join("bench");
    let mut config = host.config(TestMethod::Fio, &["fio", "dd"]);
    config.run.test_path = Some(explicit.clone());
    let runner = ScriptedRunner::new()
        .on(program_with_arg("fio", "--name=check"), Reply::ok_stdout(""))
        .on(program_with_arg("fio", "--name=setup"), Reply::ok_stderr("fio: No such file or directory"))
        .on(program("dd"), Reply::ok_stderr(GNU_DD));
    let (session, calls, _) = host.session(
        config,
        Arc::new(MockPlatform::default()),
        Arc::new(StaticProbe::allow_all()),
        runner,
    );

    let output = session.run().expect("pass");
    assert!(explicit.is_dir());
    assert_eq!(output.method, TestMethod::Dd);
    let report = output.report().expect("report");
    let label = explicit.display().to_string();
    assert!(report.rows.iter().all(|row| row.label == label));
    assert!(report.has_measurements());
    // Explicit targets have no fallback directory.
    assert_eq!(calls.calls_matching(|inv| inv.has_arg("--name=setup")), 1);
}

#[test]
fn explicit_fio_failure_note_survives_when_fio_is_the_only_tool() {
    let host = FakeHost::new();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = host.config(TestMethod::Dd, &["fio"]);
    config.run.test_path = Some(dir.path().to_path_buf());
    let runner = ScriptedRunner::new()
        .on(program_with_arg("fio", "--name=check"), Reply::ok_stdout(""))
        .on(program_with_arg("fio", "--name=setup"), Reply::ok_stderr("fio: Permission denied"));
    let (session, _, _) = host.session(
        config,
        Arc::new(MockPlatform::default()),
        Arc::new(StaticProbe::allow_all()),
        runner,
    );

    let output = session.run().expect("pass");
    assert_eq!(output.method, TestMethod::Fio);
    let report = output.report().expect("report");
    assert!(report.rows.is_empty());
    assert_eq!(report.notes, vec!["fio: Permission denied"]);
}

#[test]
fn shrunken_dd_plan_reaches_the_tool() {
    let host = FakeHost::new();
    let mut config = host.config(TestMethod::Dd, &["dd"]);
    config.run.multi_path = true;
    let platform = MockPlatform::default()
        .with_mount(MountPoint::new("/dev/sde1", "/mnt/tight", "ext4"), 2 * GIB, 140 * 1024 * 1024);
    let (session, calls, sink) = host.session(
        config,
        Arc::new(platform),
        Arc::new(StaticProbe::allow_all()),
        ScriptedRunner::new().on(program("dd"), Reply::ok_stderr(GNU_DD)),
    );

    let output = session.run().expect("pass");
    let report = output.report().expect("report");
    assert_eq!(report.rows[0].block.as_deref(), Some("28MB-4K Block"));
    assert_eq!(report.rows[1].block.as_deref(), Some("28MB-1M Block"));
    assert!(calls.calls_matching(|inv| inv.has_arg("count=7168")) >= 1);
    assert_eq!(sink.count(EventType::PlanAdjusted), 1);
}
