//! Free-space aware test sizing.
//!
//! A target with less than 1.5x the nominal test size free gets a shrunken
//! test of `free / 5`, clamped to `[floor, ceiling]`. The floor wins over the
//! 20% rule: below it the tools measure their own overhead.

#![allow(missing_docs)]

use crate::plan::{BlockSize, DdPlan, FioPlan, GIB, MIB, PlanEntry};
use crate::platform::profile::FioSizeClass;

/// Nominal size plus clamp bounds for one kind of test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingRule {
    pub required: u64,
    pub floor: u64,
    pub ceiling: u64,
}

/// dd entries with blocks below 1 MiB.
pub const DD_SMALL_BLOCK: SizingRule = SizingRule {
    required: 100 * MIB,
    floor: 20 * MIB,
    ceiling: 50 * MIB,
};

/// dd entries with blocks of 1 MiB and up.
pub const DD_LARGE_BLOCK: SizingRule = SizingRule {
    required: GIB,
    floor: 20 * MIB,
    ceiling: 500 * MIB,
};

impl SizingRule {
    /// Shrunken test size, or `None` when there is enough room for the nominal size.
    #[must_use]
    pub fn adjust(&self, free_bytes: u64) -> Option<u64> {
        if free_bytes >= self.required.saturating_mul(3) / 2 {
            return None;
        }
        Some((free_bytes / 5).max(self.floor).min(self.ceiling))
    }

    #[must_use]
    pub const fn for_dd_block(block: &BlockSize) -> Self {
        if block.bytes() < MIB {
            DD_SMALL_BLOCK
        } else {
            DD_LARGE_BLOCK
        }
    }

    #[must_use]
    pub const fn for_fio(class: FioSizeClass) -> Self {
        SizingRule {
            required: match class {
                FioSizeClass::Compact => 512 * MIB,
                FioSizeClass::Standard => 2 * GIB,
            },
            floor: 128 * MIB,
            ceiling: 2 * GIB,
        }
    }
}

/// Adjust one dd plan entry for a target with `free_bytes` available.
///
/// Unknown free space keeps the nominal entry.
#[must_use]
pub fn adjust_dd_entry(entry: &PlanEntry, free_bytes: Option<u64>) -> PlanEntry {
    let rule = SizingRule::for_dd_block(&entry.block);
    let Some(test_bytes) = free_bytes.and_then(|free| rule.adjust(free)) else {
        return entry.clone();
    };
    let size_mb = test_bytes / MIB;
    PlanEntry {
        block: entry.block.clone(),
        record_count: size_mb * MIB / entry.block.bytes(),
        file_name: format!("{size_mb}MB.test"),
        label: format!("{size_mb}MB-{} Block", entry.block.label().to_ascii_uppercase()),
    }
}

#[must_use]
pub fn adjust_dd_plan(plan: &[PlanEntry], free_bytes: Option<u64>) -> DdPlan {
    plan.iter()
        .map(|entry| adjust_dd_entry(entry, free_bytes))
        .collect()
}

/// fio backing-file size for a target.
#[must_use]
pub fn plan_fio(class: FioSizeClass, free_bytes: Option<u64>, blocks: Vec<BlockSize>) -> FioPlan {
    let rule = SizingRule::for_fio(class);
    let Some(test_bytes) = free_bytes.and_then(|free| rule.adjust(free)) else {
        let size_arg = match class {
            FioSizeClass::Compact => "512M",
            FioSizeClass::Standard => "2G",
        };
        return FioPlan {
            size_bytes: rule.required,
            size_arg: size_arg.to_string(),
            blocks,
        };
    };
    FioPlan {
        size_bytes: test_bytes,
        size_arg: fio_size_arg(class, test_bytes),
        blocks,
    }
}

#[allow(clippy::cast_precision_loss)]
fn fio_size_arg(class: FioSizeClass, bytes: u64) -> String {
    if class == FioSizeClass::Standard && bytes >= GIB {
        format!("{:.1}G", bytes as f64 / GIB as f64)
    } else {
        format!("{}M", bytes / MIB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::default_dd_plan;
    use proptest::prelude::*;

    fn blocks() -> Vec<BlockSize> {
        vec![BlockSize::parse("4k").unwrap(), BlockSize::parse("1m").unwrap()]
    }

    #[test]
    fn plenty_of_space_keeps_nominal_plan() {
        let plan = default_dd_plan();
        assert_eq!(adjust_dd_plan(&plan, Some(100 * GIB)), plan);
    }

    #[test]
    fn unknown_free_space_keeps_nominal_plan() {
        let plan = default_dd_plan();
        assert_eq!(adjust_dd_plan(&plan, None), plan);
    }

    #[test]
    fn small_block_shrinks_and_caps_at_fifty_mb() {
        let plan = default_dd_plan();
        // 140 MiB free < 150 MiB: 28 MiB test.
        let adjusted = adjust_dd_entry(&plan[0], Some(140 * MIB));
        assert_eq!(adjusted.label, "28MB-4K Block");
        assert_eq!(adjusted.file_name, "28MB.test");
        assert_eq!(adjusted.record_count, 28 * 256);

        // 1 GiB free is plenty for the 4k entry.
        assert_eq!(adjust_dd_entry(&plan[0], Some(GIB)), plan[0]);
    }

    #[test]
    fn large_block_shrinks_with_ceiling() {
        let plan = default_dd_plan();
        // 1.4 GiB free: 20% is ~286 MiB.
        let adjusted = adjust_dd_entry(&plan[1], Some(1434 * MIB));
        assert_eq!(adjusted.record_count, 286);
        assert_eq!(adjusted.label, "286MB-1M Block");
    }

    #[test]
    fn floor_wins_over_twenty_percent() {
        let plan = default_dd_plan();
        let adjusted = adjust_dd_entry(&plan[1], Some(10 * MIB));
        assert_eq!(adjusted.record_count, 20);
        assert_eq!(adjusted.file_name, "20MB.test");
    }

    #[test]
    fn fio_defaults_by_size_class() {
        let standard = plan_fio(FioSizeClass::Standard, Some(500 * GIB), blocks());
        assert_eq!(standard.size_arg, "2G");
        let compact = plan_fio(FioSizeClass::Compact, None, blocks());
        assert_eq!(compact.size_arg, "512M");
        assert_eq!(compact.size_bytes, 512 * MIB);
    }

    #[test]
    fn fio_shrinks_below_a_gigabyte_in_megabytes() {
        // 2.5 GiB free < 3 GiB: 512 MiB test.
        let plan = plan_fio(FioSizeClass::Standard, Some(2560 * MIB), blocks());
        assert_eq!(plan.size_arg, "512M");
        // Tiny volume: the floor applies.
        let plan = plan_fio(FioSizeClass::Standard, Some(100 * MIB), blocks());
        assert_eq!(plan.size_arg, "128M");
        assert_eq!(plan.size_bytes, 128 * MIB);
    }

    #[test]
    fn fio_compact_class_always_uses_megabytes() {
        let plan = plan_fio(FioSizeClass::Compact, Some(700 * MIB), blocks());
        assert_eq!(plan.size_arg, "140M");
    }

    #[test]
    fn fio_size_arg_uses_one_decimal_gigabytes() {
        assert_eq!(fio_size_arg(FioSizeClass::Standard, 3 * GIB / 2), "1.5G");
        assert_eq!(fio_size_arg(FioSizeClass::Standard, 2 * GIB), "2.0G");
        assert_eq!(fio_size_arg(FioSizeClass::Standard, 900 * MIB), "900M");
    }

    proptest! {
        #[test]
        fn adjusted_size_respects_floor_and_ceiling(free in 0u64..(4 * GIB)) {
            for rule in [DD_SMALL_BLOCK, DD_LARGE_BLOCK, SizingRule::for_fio(FioSizeClass::Standard)] {
                if let Some(size) = rule.adjust(free) {
                    prop_assert!(free < rule.required * 3 / 2);
                    prop_assert!(size >= rule.floor.min(rule.ceiling));
                    prop_assert!(size <= rule.ceiling);
                }
            }
        }

        #[test]
        fn adjusted_dd_entry_stays_within_a_fifth_of_free(free in (100 * MIB)..(1500 * MIB)) {
            for entry in default_dd_plan() {
                let adjusted = adjust_dd_entry(&entry, Some(free));
                if adjusted != entry {
                    prop_assert!(adjusted.total_bytes() <= free / 5 + entry.block.bytes());
                    prop_assert!(adjusted.total_bytes() >= 20 * MIB);
                }
            }
        }
    }
}
