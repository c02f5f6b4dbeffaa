//! Test targets: where the benchmark writes its scratch files.

#![allow(missing_docs)]

pub mod filters;
pub mod probe;
pub mod selector;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::paths::display_label;

/// How a target entered the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOrigin {
    /// Passed in by the caller; no enumeration happened.
    Explicit,
    /// Single-path mode home directory.
    DefaultHome,
    /// Single-path mode temp directory.
    DefaultTemp,
    /// Multi-path mode partition.
    Enumerated,
    /// Single-path mode extra volume above the large-volume threshold.
    LargeVolume,
}

/// A candidate location to benchmark. Built once per pass, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestTarget {
    pub device: String,
    pub path: PathBuf,
    pub fs_type: String,
    /// Free bytes at selection time; `None` when the query failed.
    pub free_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    /// Filesystem type is on the preferred list.
    pub preferred: bool,
    /// Directory to retry in when the primary path refuses the write.
    pub fallback: Option<PathBuf>,
    pub origin: TargetOrigin,
}

impl TestTarget {
    /// Row label: the device for enumerated partitions, the path otherwise.
    #[must_use]
    pub fn label(&self) -> String {
        match self.origin {
            TargetOrigin::Enumerated | TargetOrigin::LargeVolume if !self.device.is_empty() => {
                self.device.clone()
            }
            _ => display_label(&self.path),
        }
    }

    /// Label for a row measured in `path`, which may be the fallback directory.
    #[must_use]
    pub fn label_for(&self, path: &Path) -> String {
        if path == self.path {
            self.label()
        } else {
            display_label(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(origin: TargetOrigin) -> TestTarget {
        TestTarget {
            device: "/dev/sdb1".to_string(),
            path: PathBuf::from("/data"),
            fs_type: "ext4".to_string(),
            free_bytes: Some(1),
            total_bytes: Some(2),
            preferred: true,
            fallback: None,
            origin,
        }
    }

    #[test]
    fn enumerated_targets_are_labelled_by_device() {
        assert_eq!(target(TargetOrigin::Enumerated).label(), "/dev/sdb1");
        assert_eq!(target(TargetOrigin::LargeVolume).label(), "/dev/sdb1");
        assert_eq!(target(TargetOrigin::Explicit).label(), "/data");
        assert_eq!(target(TargetOrigin::DefaultHome).label(), "/data");
    }

    #[test]
    fn fallback_rows_are_labelled_by_the_path_used() {
        let t = target(TargetOrigin::DefaultHome);
        assert_eq!(t.label_for(Path::new("/tmp")), "/tmp");
        assert_eq!(t.label_for(Path::new("/data")), "/data");
    }
}
