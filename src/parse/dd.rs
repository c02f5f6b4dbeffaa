//! dd transfer-summary parsing.
//!
//! Two shapes are recognized, one summary line per run:
//!
//! ```text
//! 104857600 bytes (105 MB, 100 MiB) copied, 4.67162 s, 22.4 MB/s
//! 104857600字节（105 MB，100 MiB）已复制，0.0569789 s，1.8 GB/s
//! 1048576000 bytes transferred in 0.197523 secs (5308633827 bytes/sec)
//! ```
//!
//! GNU speeds are kept exactly as dd printed them; BSD bytes/sec are scaled
//! to MB/s, or GB/s from 1024 MB/s up.

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;

use crate::parse::ParseFailure;
use crate::parse::format::{format_dd_iops, fraction_digits};
use crate::runner::patterns::DD_SOFT_FAILURE;

/// A speed value with its unit and the precision it was reported with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Throughput {
    pub value: f64,
    pub unit: String,
    pub decimals: usize,
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.*} {}", self.decimals, self.value, self.unit)
    }
}

/// One parsed dd run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DdMeasurement {
    pub throughput: Throughput,
    pub elapsed_secs: f64,
    pub iops: f64,
}

impl DdMeasurement {
    /// Cell text, e.g. `22.4 MB/s(5.48K IOPS, 4.67s)`.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{}({})",
            self.throughput,
            format_dd_iops(self.iops, self.elapsed_secs)
        )
    }
}

/// Parse dd's stderr for a run that moved `record_count` blocks.
pub fn parse_dd(raw: &str, record_count: u64) -> Result<DdMeasurement, ParseFailure> {
    if raw.trim().is_empty() {
        return Err(ParseFailure::Empty);
    }
    if let Some(phrase) = DD_SOFT_FAILURE.matches(raw) {
        return Err(ParseFailure::ErrorPhrase { phrase });
    }

    let mut first_error = None;
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed = if line.contains("bytes transferred in") && line.contains("bytes/sec") {
            parse_bsd_line(line)
        } else if line.contains("bytes") || line.contains("字节") {
            parse_gnu_line(line)
        } else {
            continue;
        };
        let (elapsed_secs, throughput) = match parsed {
            Ok(Some(found)) => found,
            Ok(None) => continue,
            Err(failure) => {
                first_error.get_or_insert(failure);
                continue;
            }
        };
        #[allow(clippy::cast_precision_loss)]
        let iops = record_count as f64 / elapsed_secs;
        return Ok(DdMeasurement {
            throughput,
            elapsed_secs,
            iops,
        });
    }
    Err(first_error.unwrap_or(ParseFailure::Unrecognized))
}

/// `<N> bytes (<human>) copied, <secs> s, <speed> <unit>`, with ASCII or full-width commas.
fn parse_gnu_line(line: &str) -> Result<Option<(f64, Throughput)>, ParseFailure> {
    let parts: Vec<&str> = line.split([',', '，']).map(str::trim).collect();
    if parts.len() < 3 {
        return Ok(None);
    }
    let speed_field = parts[parts.len() - 1];
    let time_field = parts[parts.len() - 2];

    let elapsed = parse_elapsed(time_field.split_whitespace().next().unwrap_or_default())?;

    let mut speed_tokens = speed_field.split_whitespace();
    let (Some(value_raw), Some(unit)) = (speed_tokens.next(), speed_tokens.next()) else {
        return Ok(None);
    };
    let value = value_raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseFailure::InvalidNumber {
            field: "speed",
            raw: value_raw.to_string(),
        })?;
    Ok(Some((
        elapsed,
        Throughput {
            value,
            unit: unit.to_string(),
            decimals: fraction_digits(value_raw),
        },
    )))
}

/// `<N> bytes transferred in <secs> secs (<bps> bytes/sec)`.
fn parse_bsd_line(line: &str) -> Result<Option<(f64, Throughput)>, ParseFailure> {
    let Some((_, tail)) = line.split_once("transferred in") else {
        return Ok(None);
    };
    let Some((time_part, speed_part)) = tail.split_once('(') else {
        return Ok(None);
    };
    let elapsed = parse_elapsed(time_part.split_whitespace().next().unwrap_or_default())?;
    let speed_raw = speed_part.split_whitespace().next().unwrap_or_default();
    let bytes_per_sec = speed_raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseFailure::InvalidNumber {
            field: "bytes/sec",
            raw: speed_raw.to_string(),
        })?;

    let mb_per_sec = bytes_per_sec / 1024.0 / 1024.0;
    let (value, unit) = if mb_per_sec >= 1024.0 {
        (mb_per_sec / 1024.0, "GB/s")
    } else {
        (mb_per_sec, "MB/s")
    };
    Ok(Some((
        elapsed,
        Throughput {
            value,
            unit: unit.to_string(),
            decimals: 2,
        },
    )))
}

fn parse_elapsed(raw: &str) -> Result<f64, ParseFailure> {
    let secs = raw.parse::<f64>().map_err(|_| ParseFailure::InvalidNumber {
        field: "elapsed",
        raw: raw.to_string(),
    })?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ParseFailure::InvalidNumber {
            field: "elapsed",
            raw: raw.to_string(),
        });
    }
    Ok(secs)
}
