//! Test plans: which block sizes, how many records and which scratch files a
//! target is benchmarked with.

#![allow(missing_docs)]

pub mod sizing;

use std::fmt;

use serde::Serialize;

use crate::core::errors::{DtError, Result};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// A block size as passed to the tools (`4k`, `1M`, `64k`), plus its byte value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BlockSize {
    bytes: u64,
    label: String,
}

impl BlockSize {
    /// Parse `<digits>[k|m|g]` (case-insensitive, binary multiples).
    pub fn parse(raw: &str) -> Result<Self> {
        let label = raw.trim();
        let split = label
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(label.len());
        let (digits, suffix) = label.split_at(split);
        let value: u64 = digits.parse().map_err(|_| DtError::InvalidConfig {
            details: format!("invalid block size {raw:?}"),
        })?;
        let multiplier = match suffix.to_ascii_lowercase().as_str() {
            "" => 1,
            "k" => KIB,
            "m" => MIB,
            "g" => GIB,
            _ => {
                return Err(DtError::InvalidConfig {
                    details: format!("invalid block size suffix in {raw:?}"),
                });
            }
        };
        if value == 0 {
            return Err(DtError::InvalidConfig {
                details: format!("block size must be > 0: {raw:?}"),
            });
        }
        Ok(Self {
            bytes: value.saturating_mul(multiplier),
            label: label.to_string(),
        })
    }

    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Text handed to the tool and shown in the block column.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// One dd benchmark cell pair (write then read) against a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub block: BlockSize,
    pub record_count: u64,
    /// Scratch file name inside the target directory.
    pub file_name: String,
    /// Friendly label shown in the block column (`100MB-4K Block`).
    pub label: String,
}

impl PlanEntry {
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.record_count.saturating_mul(self.block.bytes())
    }
}

/// Ordered dd cells for one target.
pub type DdPlan = Vec<PlanEntry>;

/// The two-entry dd plan: small random-ish blocks, then large sequential blocks.
#[must_use]
pub fn default_dd_plan() -> DdPlan {
    vec![
        PlanEntry {
            block: BlockSize {
                bytes: 4 * KIB,
                label: "4k".to_string(),
            },
            record_count: 25_600,
            file_name: "100MB.test".to_string(),
            label: "100MB-4K Block".to_string(),
        },
        PlanEntry {
            block: BlockSize {
                bytes: MIB,
                label: "1M".to_string(),
            },
            record_count: 1_000,
            file_name: "1GB.test".to_string(),
            label: "1GB-1M Block".to_string(),
        },
    ]
}

/// Effective fio parameters for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FioPlan {
    pub size_bytes: u64,
    /// Value for `--size=` (`2G`, `1.5G`, `300M`).
    pub size_arg: String,
    pub blocks: Vec<BlockSize>,
}
