//! Tool output parsers. Every parser is a pure function of its input text.

#![allow(missing_docs)]

pub mod dd;
pub mod fio;
pub mod format;
pub mod winsat;

use thiserror::Error;

/// Why a tool's output could not be turned into a measurement.
///
/// These are data, not errors: callers render a failure cell and move on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("tool produced no output")]
    Empty,
    #[error("tool reported an error: {phrase}")]
    ErrorPhrase { phrase: &'static str },
    #[error("no recognizable result line")]
    Unrecognized,
    #[error("invalid number in field {field}: {raw:?}")]
    InvalidNumber { field: &'static str, raw: String },
    #[error("unexpected output schema: {details}")]
    SchemaMismatch { details: String },
}

pub use dd::{DdMeasurement, Throughput, parse_dd};
pub use fio::{FioMeasurement, FioSide, MinimalSchema, TERSE_V3, parse_fio};
pub use winsat::{WinsatScores, parse_winsat};
