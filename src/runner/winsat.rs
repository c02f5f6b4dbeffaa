//! `winsat disk` runs. One invocation per drive, reformatted as three cells.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use crate::logger::jsonl::{EventType, LogEntry};
use crate::logger::sink::EventSink;
use crate::parse::parse_winsat;
use crate::report::{Cell, FailureReason};
use crate::runner::exec::{Capture, CommandRunner, Invocation, Outcome, classify};

pub struct WinsatRunner {
    runner: Arc<dyn CommandRunner>,
    winsat: PathBuf,
    sink: Arc<dyn EventSink>,
}

impl WinsatRunner {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, winsat: PathBuf, sink: Arc<dyn EventSink>) -> Self {
        Self {
            runner,
            winsat,
            sink,
        }
    }

    /// Random read, sequential read and sequential write cells for `drive`.
    pub fn run_drive(&self, drive: &str) -> Vec<Cell> {
        let inv = Invocation::new(&self.winsat, Capture::Stdout).args(["disk", "-drive", drive]);
        self.sink.record(
            LogEntry::info(EventType::ToolInvoked)
                .tool("winsat")
                .device(drive)
                .details(inv.to_string()),
        );

        let result = self.runner.run(&inv);
        let stdout = match (classify(&result, inv.capture, None), &result) {
            (Outcome::Success, Ok(out)) => out.stdout.as_str(),
            _ => {
                let details = match &result {
                    Ok(out) => out.stderr.trim().to_string(),
                    Err(err) => err.to_string(),
                };
                self.sink.record(
                    LogEntry::warning(EventType::ToolOutput)
                        .tool("winsat")
                        .device(drive)
                        .ok(false)
                        .details(details),
                );
                return vec![Cell::Failed(FailureReason::ToolFailed); 3];
            }
        };

        match parse_winsat(stdout) {
            Ok(scores) => scores
                .columns()
                .iter()
                .map(|column| {
                    column.map_or(Cell::Failed(FailureReason::Unparseable), |text| {
                        Cell::Winsat(text.to_string())
                    })
                })
                .collect(),
            Err(failure) => {
                self.sink.record(
                    LogEntry::warning(EventType::ParseFailure)
                        .tool("winsat")
                        .device(drive)
                        .details(failure.to_string()),
                );
                vec![Cell::Failed(FailureReason::Unparseable); 3]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::sink::MemorySink;
    use crate::runner::exec::{Reply, ScriptedRunner, program};

    const OUTPUT: &str = "\
Windows System Assessment Tool
> Running: Feature Enumeration ''
> Disk  Random 16.0 Read                       312.45 MB/s          8.1
> Disk  Sequential 64.0 Read                   1920.77 MB/s          9.1
> Disk  Sequential 64.0 Write                  1402.10 MB/s          8.9
> Total Run Time 00:00:12.34
";

    fn winsat(reply: Reply) -> (WinsatRunner, Arc<ScriptedRunner>, Arc<MemorySink>) {
        let scripted = Arc::new(ScriptedRunner::new().on(program("winsat"), reply));
        let sink = Arc::new(MemorySink::new());
        let runner = WinsatRunner::new(scripted.clone(), PathBuf::from("winsat"), sink.clone());
        (runner, scripted, sink)
    }

    #[test]
    fn scores_become_cells() {
        let (runner, calls, _) = winsat(Reply::ok_stdout(OUTPUT));
        let cells = runner.run_drive("C:");
        assert_eq!(
            cells,
            vec![
                Cell::Winsat("312.45 MB/s[8.1]".to_string()),
                Cell::Winsat("1920.77 MB/s[9.1]".to_string()),
                Cell::Winsat("1402.10 MB/s[8.9]".to_string()),
            ]
        );
        assert_eq!(calls.calls()[0].args, vec!["disk", "-drive", "C:"]);
    }

    #[test]
    fn missing_line_fails_only_its_column() {
        let partial: String = OUTPUT
            .lines()
            .filter(|line| !line.contains("Sequential 64.0 Write"))
            .map(|line| format!("{line}\n"))
            .collect();
        let (runner, _, _) = winsat(Reply::ok_stdout(partial));
        let cells = runner.run_drive("D:");
        assert!(matches!(cells[0], Cell::Winsat(_)));
        assert_eq!(cells[2], Cell::Failed(FailureReason::Unparseable));
    }

    #[test]
    fn tool_failure_fails_the_row() {
        let (runner, _, sink) = winsat(Reply::fail_stderr("Access is denied."));
        assert_eq!(
            runner.run_drive("C:"),
            vec![Cell::Failed(FailureReason::ToolFailed); 3]
        );
        assert_eq!(sink.count(EventType::ToolOutput), 1);
    }

    #[test]
    fn unrecognized_output_is_unparseable() {
        let (runner, _, sink) = winsat(Reply::ok_stdout("The system cannot find the drive specified.\n"));
        assert_eq!(
            runner.run_drive("Q:"),
            vec![Cell::Failed(FailureReason::Unparseable); 3]
        );
        assert_eq!(sink.count(EventType::ParseFailure), 1);
    }
}
