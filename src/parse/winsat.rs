//! `winsat disk` output parsing. Scores are reformatted, never recomputed.

#![allow(missing_docs)]

use serde::Serialize;

use crate::parse::ParseFailure;

pub const RANDOM_READ_MARKER: &str = "> Disk  Random 16.0 Read";
pub const SEQUENTIAL_READ_MARKER: &str = "> Disk  Sequential 64.0 Read";
pub const SEQUENTIAL_WRITE_MARKER: &str = "> Disk  Sequential 64.0 Write";

/// The three winsat columns as `<value> MB/s[<score>]`; `None` when winsat
/// did not print that line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WinsatScores {
    pub random_read: Option<String>,
    pub sequential_read: Option<String>,
    pub sequential_write: Option<String>,
}

impl WinsatScores {
    #[must_use]
    pub fn columns(&self) -> [Option<&str>; 3] {
        [
            self.random_read.as_deref(),
            self.sequential_read.as_deref(),
            self.sequential_write.as_deref(),
        ]
    }
}

pub fn parse_winsat(raw: &str) -> Result<WinsatScores, ParseFailure> {
    if raw.trim().is_empty() {
        return Err(ParseFailure::Empty);
    }
    let scores = WinsatScores {
        random_read: find_marker(raw, RANDOM_READ_MARKER),
        sequential_read: find_marker(raw, SEQUENTIAL_READ_MARKER),
        sequential_write: find_marker(raw, SEQUENTIAL_WRITE_MARKER),
    };
    if scores.columns().iter().all(Option::is_none) {
        return Err(ParseFailure::Unrecognized);
    }
    Ok(scores)
}

fn find_marker(raw: &str, marker: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let (_, rest) = line.split_once(marker)?;
        let rest = rest.trim();
        let parts: Vec<&str> = rest.split("MB/s").collect();
        if parts.len() < 2 {
            return None;
        }
        let value = parts[0].trim();
        let score = parts[parts.len() - 1].trim();
        Some(format!("{value} MB/s[{score}]"))
    })
}
