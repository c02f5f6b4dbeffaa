//! Partition filtering: pseudo filesystems, system mountpoints and virtual
//! block devices never become test targets.

#![allow(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::config::SelectionConfig;
use crate::platform::pal::MountPoint;

/// Virtual and pseudo filesystems, matched as case-insensitive substrings.
pub const EXCLUDED_FS_TYPES: &[&str] = &[
    "tmpfs",
    "devtmpfs",
    "proc",
    "sysfs",
    "overlay",
    "squashfs",
    "swap",
    "cgroup",
    "devpts",
    "debugfs",
    "tracefs",
    "securityfs",
    "pstore",
    "bpf",
    "autofs",
    "mqueue",
    "hugetlbfs",
    "fusectl",
    "configfs",
    "binfmt_misc",
    "nsfs",
    "ramfs",
    "rpc_pipefs",
    "efivarfs",
    "selinuxfs",
];

/// System and container-runtime trees.
pub const EXCLUDED_MOUNT_PREFIXES: &[&str] = &[
    "/proc",
    "/sys",
    "/dev",
    "/dev/shm",
    "/run",
    "/var/lib/docker",
    "/var/lib/containers",
    "/var/lib/kubelet",
    "/snap",
];

/// Device-name markers for virtio system disks, snap images and loop devices.
pub const EXCLUDED_DEVICE_MARKERS: &[&str] = &["vda", "snap", "loop"];

/// Filesystems worth calling out as real data volumes.
pub const PREFERRED_FS_TYPES: &[&str] = &[
    "ext2", "ext3", "ext4", "xfs", "btrfs", "zfs", "ntfs", "apfs", "hfs", "f2fs", "jfs",
    "reiserfs", "exfat", "vfat", "refs",
];

/// Why a partition was not selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    FsType(String),
    Mountpoint(PathBuf),
    Device(&'static str),
    NotWritable,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FsType(fs) => write!(f, "excluded filesystem type {fs}"),
            Self::Mountpoint(prefix) => write!(f, "excluded mountpoint under {}", prefix.display()),
            Self::Device(marker) => write!(f, "virtual device ({marker})"),
            Self::NotWritable => f.write_str("not writable"),
        }
    }
}

/// Static exclusion rules plus the configured extras.
#[derive(Debug, Clone)]
pub struct TargetFilter {
    excluded_fs: Vec<String>,
    excluded_mounts: Vec<PathBuf>,
    run_mount_min_total_bytes: u64,
}

impl TargetFilter {
    #[must_use]
    pub fn from_config(config: &SelectionConfig) -> Self {
        let mut excluded_fs: Vec<String> = EXCLUDED_FS_TYPES.iter().map(ToString::to_string).collect();
        excluded_fs.extend(
            config
                .extra_excluded_fs_types
                .iter()
                .map(|fs| fs.to_ascii_lowercase()),
        );
        let mut excluded_mounts: Vec<PathBuf> =
            EXCLUDED_MOUNT_PREFIXES.iter().map(PathBuf::from).collect();
        excluded_mounts.extend(config.extra_excluded_mounts.iter().cloned());
        Self {
            excluded_fs,
            excluded_mounts,
            run_mount_min_total_bytes: config.run_mount_min_total_bytes,
        }
    }

    /// Apply the fs-type, mountpoint and device rules, in that order.
    /// `total_bytes` feeds the `/run` exception only.
    pub fn check(&self, mount: &MountPoint, total_bytes: Option<u64>) -> Result<(), Rejection> {
        let fs = mount.fs_type.to_ascii_lowercase();
        if let Some(hit) = self.excluded_fs.iter().find(|ex| fs.contains(ex.as_str())) {
            return Err(Rejection::FsType(hit.clone()));
        }

        if let Some(prefix) = self.excluded_mount(&mount.path) {
            let large_run_mount = mount.path.to_string_lossy().contains("/run")
                && total_bytes.is_some_and(|total| total > self.run_mount_min_total_bytes);
            if !large_run_mount {
                return Err(Rejection::Mountpoint(prefix.to_path_buf()));
            }
        }

        if let Some(marker) = EXCLUDED_DEVICE_MARKERS
            .iter()
            .copied()
            .find(|marker| mount.device.contains(marker))
        {
            return Err(Rejection::Device(marker));
        }
        Ok(())
    }

    fn excluded_mount(&self, path: &Path) -> Option<&Path> {
        self.excluded_mounts
            .iter()
            .map(PathBuf::as_path)
            .find(|prefix| path.starts_with(prefix))
    }
}

#[must_use]
pub fn is_preferred_fs(fs_type: &str) -> bool {
    let fs = fs_type.to_ascii_lowercase();
    PREFERRED_FS_TYPES.contains(&fs.as_str())
}
