//! Single-path, multi-path and explicit-path target selection.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::config::SelectionConfig;
use crate::core::errors::{DtError, Result};
use crate::core::paths::{ensure_dir, resolve_absolute_path};
use crate::logger::jsonl::{EventType, LogEntry};
use crate::logger::sink::EventSink;
use crate::platform::pal::{FsStats, MountPoint, Platform, find_mount};
use crate::platform::profile::PlatformProfile;
use crate::targets::filters::{Rejection, TargetFilter, is_preferred_fs};
use crate::targets::probe::WriteProbe;
use crate::targets::{TargetOrigin, TestTarget};

pub struct TargetSelector {
    platform: Arc<dyn Platform>,
    probe: Arc<dyn WriteProbe>,
    profile: PlatformProfile,
    filter: TargetFilter,
    large_volume_min_free_bytes: u64,
    sink: Arc<dyn EventSink>,
}

impl TargetSelector {
    #[must_use]
    pub fn new(
        platform: Arc<dyn Platform>,
        probe: Arc<dyn WriteProbe>,
        profile: PlatformProfile,
        selection: &SelectionConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            platform,
            probe,
            profile,
            filter: TargetFilter::from_config(selection),
            large_volume_min_free_bytes: selection.large_volume_min_free_bytes,
            sink,
        }
    }

    /// Targets for one pass.
    ///
    /// An explicit path is the sole target and must be creatable and
    /// writable. Otherwise an enumeration failure yields no enumerated
    /// targets rather than an error.
    pub fn select(&self, multi_path: bool, explicit: Option<&Path>) -> Result<Vec<TestTarget>> {
        if let Some(path) = explicit {
            return self.explicit(path).map(|target| vec![target]);
        }
        if multi_path {
            return Ok(self.enumerated());
        }
        Ok(self.single())
    }

    fn explicit(&self, path: &Path) -> Result<TestTarget> {
        ensure_dir(path)?;
        if !self.probe.is_writable(path) {
            let err = DtError::PermissionDenied {
                path: path.to_path_buf(),
            };
            self.sink.record(
                LogEntry::warning(EventType::TargetRejected)
                    .path(path)
                    .error(&err),
            );
            return Err(err);
        }
        let device = self
            .platform
            .mount_points()
            .ok()
            .and_then(|mounts| find_mount(&resolve_absolute_path(path), &mounts).map(|m| m.device.clone()))
            .unwrap_or_default();
        let target = self.build(path.to_path_buf(), device, TargetOrigin::Explicit, None);
        self.accept(&target);
        Ok(target)
    }

    fn single(&self) -> Vec<TestTarget> {
        let home = &self.profile.home_dir;
        let temp = &self.profile.temp_dir;
        let mut targets = Vec::new();

        if self.probe.is_writable(home) {
            let fallback = (home != temp).then(|| temp.clone());
            targets.push(self.build(home.clone(), String::new(), TargetOrigin::DefaultHome, fallback));
        } else {
            self.reject_path(home, &Rejection::NotWritable);
            if self.probe.is_writable(temp) {
                targets.push(self.build(temp.clone(), String::new(), TargetOrigin::DefaultTemp, None));
            } else {
                self.reject_path(temp, &Rejection::NotWritable);
            }
        }

        for (mount, stats) in self.candidates() {
            if self.profile.is_default_dir(&mount.path) {
                continue;
            }
            let Some(stats) = stats else { continue };
            if stats.free_bytes <= self.large_volume_min_free_bytes {
                continue;
            }
            if self.probe.is_writable(&mount.path) {
                targets.push(self.from_mount(mount, Some(stats), TargetOrigin::LargeVolume));
            } else {
                self.reject_path(&mount.path, &Rejection::NotWritable);
            }
        }

        for target in &targets {
            self.accept(target);
        }
        targets
    }

    fn enumerated(&self) -> Vec<TestTarget> {
        let mut targets = Vec::new();
        for (mount, stats) in self.candidates() {
            if !self.probe.is_writable(&mount.path) {
                self.reject_path(&mount.path, &Rejection::NotWritable);
                continue;
            }
            let target = self.from_mount(mount, stats, TargetOrigin::Enumerated);
            self.accept(&target);
            targets.push(target);
        }
        targets
    }

    /// Enumerated partitions that pass the static filters, with their space figures.
    fn candidates(&self) -> Vec<(MountPoint, Option<FsStats>)> {
        let mounts = match self.platform.mount_points() {
            Ok(mounts) => mounts,
            Err(err) => {
                self.sink
                    .record(LogEntry::warning(EventType::PartitionSeen).ok(false).error(&err));
                return Vec::new();
            }
        };

        let mut out: Vec<(MountPoint, Option<FsStats>)> = Vec::new();
        for mount in mounts {
            if out.iter().any(|(seen, _)| seen.path == mount.path) {
                continue;
            }
            self.sink.record(
                LogEntry::info(EventType::PartitionSeen)
                    .path(&mount.path)
                    .device(&mount.device)
                    .details(mount.fs_type.clone()),
            );
            let stats = self.platform.fs_stats(&mount.path).ok();
            match self
                .filter
                .check(&mount, stats.as_ref().map(|s| s.total_bytes))
            {
                Ok(()) => out.push((mount, stats)),
                Err(reason) => self.sink.record(
                    LogEntry::info(EventType::TargetRejected)
                        .path(&mount.path)
                        .device(&mount.device)
                        .details(reason.to_string()),
                ),
            }
        }
        out
    }

    fn from_mount(&self, mount: MountPoint, stats: Option<FsStats>, origin: TargetOrigin) -> TestTarget {
        TestTarget {
            preferred: is_preferred_fs(&mount.fs_type),
            free_bytes: stats.as_ref().map(|s| s.free_bytes),
            total_bytes: stats.as_ref().map(|s| s.total_bytes),
            device: mount.device,
            fs_type: mount.fs_type,
            path: mount.path,
            fallback: None,
            origin,
        }
    }

    /// A target for a plain directory; space figures come from its filesystem.
    fn build(
        &self,
        path: PathBuf,
        device: String,
        origin: TargetOrigin,
        fallback: Option<PathBuf>,
    ) -> TestTarget {
        let stats = self.platform.fs_stats(&path).ok();
        let fs_type = stats.as_ref().map(|s| s.fs_type.clone()).unwrap_or_default();
        TestTarget {
            preferred: is_preferred_fs(&fs_type),
            free_bytes: stats.as_ref().map(|s| s.free_bytes),
            total_bytes: stats.as_ref().map(|s| s.total_bytes),
            device,
            fs_type,
            path,
            fallback,
            origin,
        }
    }

    fn accept(&self, target: &TestTarget) {
        let mut entry = LogEntry::info(EventType::TargetAccepted)
            .path(&target.path)
            .device(&target.device)
            .details(format!(
                "{:?} fs={} preferred={}",
                target.origin, target.fs_type, target.preferred
            ));
        if let Some(free) = target.free_bytes {
            entry = entry.size(free);
        }
        self.sink.record(entry);
    }

    fn reject_path(&self, path: &Path, reason: &Rejection) {
        self.sink.record(
            LogEntry::info(EventType::TargetRejected)
                .path(path)
                .details(reason.to_string()),
        );
    }
}
