//! Benchmark results and their text table rendering.

#![allow(missing_docs)]

pub mod i18n;
pub mod table;

use serde::Serialize;

use crate::core::config::Language;
use crate::parse::{DdMeasurement, FioSide};

/// Which table layout a report uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Dd,
    Fio,
    Winsat,
}

/// Why a cell carries no measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    WriteFailed,
    ReadFailed,
    Unparseable,
    ToolFailed,
}

/// One table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Dd(DdMeasurement),
    Fio(FioSide),
    Winsat(String),
    Failed(FailureReason),
}

impl Cell {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Display text in `lang`.
    #[must_use]
    pub fn text(&self, lang: Language) -> String {
        match self {
            Self::Dd(m) => m.render(),
            Self::Fio(side) => side.render(),
            Self::Winsat(text) => text.clone(),
            Self::Failed(reason) => i18n::failure_label(*reason, lang).to_string(),
        }
    }
}

/// One row: a target (and, for dd/fio, a block size) plus its cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub label: String,
    pub block: Option<String>,
    pub cells: Vec<Cell>,
}

impl BenchmarkResult {
    /// True when no cell of the row holds a measurement.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.cells.iter().all(Cell::is_failed)
    }
}

/// The rows of one pass, in the order they were measured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    pub rows: Vec<BenchmarkResult>,
    /// Free-text lines printed after the table.
    pub notes: Vec<String>,
    pub interrupted: bool,
}

impl Report {
    #[must_use]
    pub const fn new(kind: ReportKind) -> Self {
        Self {
            kind,
            rows: Vec::new(),
            notes: Vec::new(),
            interrupted: false,
        }
    }

    pub fn push(&mut self, row: BenchmarkResult) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether at least one cell holds a measurement.
    #[must_use]
    pub fn has_measurements(&self) -> bool {
        self.rows.iter().any(|row| !row.is_failed())
    }

    #[must_use]
    pub fn render(&self, lang: Language) -> String {
        table::render(self, lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_fails_only_when_every_cell_fails() {
        let mut row = BenchmarkResult {
            label: "/root".to_string(),
            block: Some("4k".to_string()),
            cells: vec![
                Cell::Failed(FailureReason::WriteFailed),
                Cell::Failed(FailureReason::ReadFailed),
            ],
        };
        assert!(row.is_failed());
        row.cells[1] = Cell::Winsat("500.00 MB/s[7.1]".to_string());
        assert!(!row.is_failed());
    }

    #[test]
    fn failed_cells_render_localized_labels() {
        let cell = Cell::Failed(FailureReason::Unparseable);
        assert_eq!(cell.text(Language::En), "unable to parse");
        assert_eq!(cell.text(Language::Zh), "无法解析结果");
    }

    #[test]
    fn empty_report_has_no_measurements() {
        let report = Report::new(ReportKind::Fio);
        assert!(report.is_empty());
        assert!(!report.has_measurements());
    }
}
