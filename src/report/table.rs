//! Fixed column layouts padded by terminal display width.

#![allow(missing_docs)]

use unicode_width::UnicodeWidthStr;

use crate::core::config::Language;
use crate::report::{Report, ReportKind, i18n};

/// Padding added to the widest label.
const LABEL_PADDING: usize = 2;

/// Label column minimum plus `(separator, width)` for every following column.
struct Layout {
    label_min: usize,
    columns: &'static [(&'static str, usize)],
}

const DD_LAYOUT: Layout = Layout {
    label_min: 10,
    columns: &[("    ", 15), ("    ", 30), ("    ", 30)],
};

const FIO_LAYOUT: Layout = Layout {
    label_min: 10,
    columns: &[("   ", 7), ("   ", 23), (" ", 23), (" ", 23)],
};

const WINSAT_LAYOUT: Layout = Layout {
    label_min: 18,
    columns: &[("    ", 20), ("    ", 20), ("    ", 20)],
};

const fn layout(kind: ReportKind) -> &'static Layout {
    match kind {
        ReportKind::Dd => &DD_LAYOUT,
        ReportKind::Fio => &FIO_LAYOUT,
        ReportKind::Winsat => &WINSAT_LAYOUT,
    }
}

/// Width of the label column for these labels: widest label (never below the
/// layout minimum) plus padding.
#[must_use]
pub fn label_width<'a>(kind: ReportKind, labels: impl IntoIterator<Item = &'a str>) -> usize {
    labels
        .into_iter()
        .map(UnicodeWidthStr::width)
        .fold(layout(kind).label_min, usize::max)
        + LABEL_PADDING
}

/// Left-align `text` in `width` display columns. Longer text is never cut.
#[must_use]
pub fn pad(text: &str, width: usize) -> String {
    let shown = text.width();
    let mut out = String::with_capacity(text.len() + width.saturating_sub(shown));
    out.push_str(text);
    out.extend(std::iter::repeat_n(' ', width.saturating_sub(shown)));
    out
}

fn line(layout: &Layout, label_width: usize, fields: &[String]) -> String {
    let mut out = pad(fields.first().map_or("", String::as_str), label_width);
    for (i, (sep, width)) in layout.columns.iter().enumerate() {
        out.push_str(sep);
        out.push_str(&pad(fields.get(i + 1).map_or("", String::as_str), *width));
    }
    out.trim_end().to_string()
}

/// Render header, rows in measurement order, then notes.
#[must_use]
pub fn render(report: &Report, lang: Language) -> String {
    let layout = layout(report.kind);
    let width = label_width(report.kind, report.rows.iter().map(|r| r.label.as_str()));

    let header: Vec<String> = i18n::headers(report.kind, lang)
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut out = line(layout, width, &header);
    out.push('\n');

    for row in &report.rows {
        let mut fields = Vec::with_capacity(row.cells.len() + 2);
        fields.push(row.label.clone());
        if report.kind != ReportKind::Winsat {
            fields.push(row.block.clone().unwrap_or_default());
        }
        fields.extend(row.cells.iter().map(|cell| cell.text(lang)));
        out.push_str(&line(layout, width, &fields));
        out.push('\n');
    }

    for note in &report.notes {
        out.push_str(note);
        out.push('\n');
    }
    if report.interrupted {
        out.push_str(i18n::interrupted(lang));
        out.push('\n');
    }
    out
}
