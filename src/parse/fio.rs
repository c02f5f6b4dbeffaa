//! fio `--minimal` (terse) output parsing.
//!
//! Terse lines are `;`-separated with fixed field positions. The positions
//! depend on the terse format version, so they live in one [`MinimalSchema`]
//! value instead of being scattered through the parser.

#![allow(missing_docs)]

use serde::Serialize;

use crate::parse::ParseFailure;
use crate::parse::format::{format_iops, format_speed_kbps};

/// Field positions of one terse format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimalSchema {
    pub version: &'static str,
    pub jobname: usize,
    pub read_bw_kbps: usize,
    pub read_iops: usize,
    pub write_bw_kbps: usize,
    pub write_iops: usize,
}

/// fio terse version 3 (fio 2.x and 3.x default).
pub const TERSE_V3: MinimalSchema = MinimalSchema {
    version: "3",
    jobname: 2,
    read_bw_kbps: 6,
    read_iops: 7,
    write_bw_kbps: 47,
    write_iops: 48,
};

impl MinimalSchema {
    const fn min_fields(&self) -> usize {
        let mut max = self.jobname;
        let fields = [
            self.read_bw_kbps,
            self.read_iops,
            self.write_bw_kbps,
            self.write_iops,
        ];
        let mut i = 0;
        while i < fields.len() {
            if fields[i] > max {
                max = fields[i];
            }
            i += 1;
        }
        max + 1
    }
}

/// Bandwidth (KB/s) and IOPS for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FioSide {
    pub bw_kbps: f64,
    pub iops: u64,
}

impl FioSide {
    /// Cell text, e.g. `190.53 MB/s(47.6k)`.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{}({})",
            format_speed_kbps(self.bw_kbps),
            format_iops(self.iops)
        )
    }
}

/// One parsed randrw job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FioMeasurement {
    pub read: FioSide,
    pub write: FioSide,
}

impl FioMeasurement {
    /// Read and write summed.
    #[must_use]
    pub fn total(&self) -> FioSide {
        FioSide {
            bw_kbps: self.read.bw_kbps + self.write.bw_kbps,
            iops: self.read.iops.saturating_add(self.write.iops),
        }
    }
}

/// Parse fio stdout for the job named `jobname` using [`TERSE_V3`].
pub fn parse_fio(raw: &str, jobname: &str) -> Result<FioMeasurement, ParseFailure> {
    parse_fio_with(&TERSE_V3, raw, jobname)
}

pub fn parse_fio_with(
    schema: &MinimalSchema,
    raw: &str,
    jobname: &str,
) -> Result<FioMeasurement, ParseFailure> {
    if raw.trim().is_empty() {
        return Err(ParseFailure::Empty);
    }

    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| line.split(';').nth(schema.jobname) == Some(jobname))
        .ok_or(ParseFailure::Unrecognized)?;

    let fields: Vec<&str> = line.split(';').collect();
    if fields[0] != schema.version {
        return Err(ParseFailure::SchemaMismatch {
            details: format!(
                "terse version {:?}, expected {}",
                fields[0], schema.version
            ),
        });
    }
    if fields.len() < schema.min_fields() {
        return Err(ParseFailure::SchemaMismatch {
            details: format!(
                "{} fields, expected at least {}",
                fields.len(),
                schema.min_fields()
            ),
        });
    }

    Ok(FioMeasurement {
        read: FioSide {
            bw_kbps: number(fields[schema.read_bw_kbps], "read_bw")?,
            iops: iops(fields[schema.read_iops], "read_iops")?,
        },
        write: FioSide {
            bw_kbps: number(fields[schema.write_bw_kbps], "write_bw")?,
            iops: iops(fields[schema.write_iops], "write_iops")?,
        },
    })
}

fn number(raw: &str, field: &'static str) -> Result<f64, ParseFailure> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| ParseFailure::InvalidNumber {
            field,
            raw: raw.to_string(),
        })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn iops(raw: &str, field: &'static str) -> Result<u64, ParseFailure> {
    number(raw, field).map(|v| v.round() as u64)
}
