//! PAL trait and platform-specific implementations (Linux, BSD/macOS, Windows).
//!
//! The benchmark only needs two things from the OS: the partition table as
//! `(device, mountpoint, fs type)` tuples and a free/total space query for a
//! path. Everything else goes through [`super::profile::PlatformProfile`].

#![allow(missing_docs)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::errors::{DtError, Result};

/// Filesystem statistics for a path/mount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FsStats {
    pub total_bytes: u64,
    /// Bytes available to an unprivileged writer.
    pub free_bytes: u64,
    pub fs_type: String,
    pub mount_point: PathBuf,
}

/// One row of the partition table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountPoint {
    pub path: PathBuf,
    pub device: String,
    pub fs_type: String,
}

impl MountPoint {
    #[must_use]
    pub fn new(device: &str, path: impl Into<PathBuf>, fs_type: &str) -> Self {
        Self {
            path: path.into(),
            device: device.to_string(),
            fs_type: fs_type.to_ascii_lowercase(),
        }
    }
}

/// OS abstraction used by target selection and sizing.
pub trait Platform: Send + Sync {
    fn fs_stats(&self, path: &Path) -> Result<FsStats>;
    fn mount_points(&self) -> Result<Vec<MountPoint>>;
}

// ──────────────────── linux ────────────────────

/// Linux platform implementation using `/proc/self/mounts` + `statvfs`.
#[derive(Debug)]
pub struct LinuxPlatform {
    mount_table: PathBuf,
    mounts_cache: RwLock<Option<(Vec<MountPoint>, Instant)>>,
    cache_ttl: Duration,
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mount_table: PathBuf::from("/proc/self/mounts"),
            mounts_cache: RwLock::new(None),
            cache_ttl: Duration::from_secs(5),
        }
    }

    /// Read the partition table from `path` instead of `/proc/self/mounts`.
    #[must_use]
    pub fn with_mount_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.mount_table = path.into();
        self
    }

    fn get_cached_mounts(&self) -> Result<Vec<MountPoint>> {
        {
            let cache = self.mounts_cache.read();
            if let Some((mounts, collected_at)) = &*cache
                && collected_at.elapsed() < self.cache_ttl
            {
                return Ok(mounts.clone());
            }
        }

        let table = self.mount_table.as_path();
        let raw = std::fs::read_to_string(table).map_err(|source| DtError::io(table, source))?;
        let mounts = parse_proc_mounts(&raw);

        *self.mounts_cache.write() = Some((mounts.clone(), Instant::now()));
        Ok(mounts)
    }
}

impl Platform for LinuxPlatform {
    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        // The table only supplies the fs type; statvfs works without it.
        let mounts = self.mount_points().unwrap_or_default();
        statvfs_stats(path, find_mount(path, &mounts))
    }

    fn mount_points(&self) -> Result<Vec<MountPoint>> {
        self.get_cached_mounts()
    }
}

// ──────────────────── bsd / macos ────────────────────

/// BSD and macOS: the partition table comes from `mount` output.
#[derive(Debug, Default)]
pub struct BsdPlatform;

impl Platform for BsdPlatform {
    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        let mounts = self.mount_points().unwrap_or_default();
        statvfs_stats(path, find_mount(path, &mounts))
    }

    fn mount_points(&self) -> Result<Vec<MountPoint>> {
        let output = std::process::Command::new("mount")
            .output()
            .map_err(|source| DtError::io("mount", source))?;
        if !output.status.success() {
            return Err(DtError::MountParse {
                details: format!("mount exited with {}", output.status),
            });
        }
        Ok(parse_bsd_mount_output(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }
}

// ──────────────────── windows ────────────────────

/// Windows: every existing drive root `A:\` .. `Z:\` is a partition.
///
/// Free-space queries are not available without native bindings, so sizing
/// falls back to the default plan.
#[derive(Debug, Default)]
pub struct WindowsPlatform;

impl Platform for WindowsPlatform {
    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        Err(DtError::FsStats {
            path: path.to_path_buf(),
            details: "free-space query not supported on windows".to_string(),
        })
    }

    fn mount_points(&self) -> Result<Vec<MountPoint>> {
        Ok(('A'..='Z')
            .filter_map(|letter| {
                let root = PathBuf::from(format!("{letter}:\\"));
                root.exists()
                    .then(|| MountPoint::new(&format!("{letter}:"), root, "ntfs"))
            })
            .collect())
    }
}

#[cfg(unix)]
#[allow(clippy::useless_conversion)]
fn statvfs_stats(path: &Path, mount: Option<&MountPoint>) -> Result<FsStats> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(|error| DtError::FsStats {
        path: path.to_path_buf(),
        details: error.to_string(),
    })?;
    let fragment = u64::from(stat.fragment_size());
    Ok(FsStats {
        total_bytes: u64::from(stat.blocks()).saturating_mul(fragment),
        free_bytes: u64::from(stat.blocks_available()).saturating_mul(fragment),
        fs_type: mount.map(|m| m.fs_type.clone()).unwrap_or_default(),
        mount_point: mount.map_or_else(|| path.to_path_buf(), |m| m.path.clone()),
    })
}

#[cfg(not(unix))]
fn statvfs_stats(path: &Path, _mount: Option<&MountPoint>) -> Result<FsStats> {
    Err(DtError::FsStats {
        path: path.to_path_buf(),
        details: "statvfs unavailable on this platform".to_string(),
    })
}

// ──────────────────── mock ────────────────────

/// In-memory mock implementation for deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    mounts: Vec<MountPoint>,
    stats_by_mount: HashMap<PathBuf, FsStats>,
    fail_enumeration: bool,
}

impl MockPlatform {
    #[must_use]
    pub fn new(mounts: Vec<MountPoint>, stats_by_mount: HashMap<PathBuf, FsStats>) -> Self {
        Self {
            mounts,
            stats_by_mount,
            fail_enumeration: false,
        }
    }

    /// A platform whose partition enumeration always fails.
    #[must_use]
    pub fn failing_enumeration() -> Self {
        Self {
            fail_enumeration: true,
            ..Self::default()
        }
    }

    /// Add a mount together with its space figures.
    #[must_use]
    pub fn with_mount(mut self, mount: MountPoint, total_bytes: u64, free_bytes: u64) -> Self {
        self.stats_by_mount.insert(
            mount.path.clone(),
            FsStats {
                total_bytes,
                free_bytes,
                fs_type: mount.fs_type.clone(),
                mount_point: mount.path.clone(),
            },
        );
        self.mounts.push(mount);
        self
    }

    /// Add a mount whose space query fails.
    #[must_use]
    pub fn with_unsized_mount(mut self, mount: MountPoint) -> Self {
        self.mounts.push(mount);
        self
    }
}

impl Platform for MockPlatform {
    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        let mount = find_mount(path, &self.mounts).ok_or_else(|| DtError::FsStats {
            path: path.to_path_buf(),
            details: "mock mount not found".to_string(),
        })?;
        self.stats_by_mount
            .get(&mount.path)
            .cloned()
            .ok_or_else(|| DtError::FsStats {
                path: mount.path.clone(),
                details: "mock stats not found".to_string(),
            })
    }

    fn mount_points(&self) -> Result<Vec<MountPoint>> {
        if self.fail_enumeration {
            return Err(DtError::MountParse {
                details: "mock enumeration failure".to_string(),
            });
        }
        Ok(self.mounts.clone())
    }
}

/// Detect active platform implementation.
pub fn detect_platform() -> Result<Arc<dyn Platform>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(LinuxPlatform::new()))
    }
    #[cfg(all(unix, not(target_os = "linux")))]
    {
        Ok(Arc::new(BsdPlatform))
    }
    #[cfg(windows)]
    {
        Ok(Arc::new(WindowsPlatform))
    }
    #[cfg(not(any(unix, windows)))]
    {
        Err(DtError::UnsupportedPlatform {
            details: "no partition enumeration backend for this OS".to_string(),
        })
    }
}

/// Parse `/proc/self/mounts`, keeping table order.
fn parse_proc_mounts(raw: &str) -> Vec<MountPoint> {
    raw.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return None;
            }
            Some(MountPoint {
                path: unescape_mount_path(fields[1]),
                device: unescape_mount_path(fields[0]).to_string_lossy().into_owned(),
                fs_type: fields[2].to_ascii_lowercase(),
            })
        })
        .collect()
}

/// Parse BSD/macOS `mount` output: `<dev> on <path> (<fs>, <opts...>)`.
fn parse_bsd_mount_output(raw: &str) -> Vec<MountPoint> {
    raw.lines()
        .filter_map(|line| {
            let (device, rest) = line.split_once(" on ")?;
            let open = rest.rfind(" (")?;
            let path = &rest[..open];
            let options = rest[open + 2..].trim_end_matches(')');
            let fs_type = options.split(',').next()?.trim();
            Some(MountPoint::new(device.trim(), path, fs_type))
        })
        .collect()
}

pub(crate) fn find_mount<'a>(path: &Path, mounts: &'a [MountPoint]) -> Option<&'a MountPoint> {
    mounts
        .iter()
        .filter(|mount| path.starts_with(&mount.path))
        .max_by_key(|mount| mount.path.as_os_str().len())
}

/// Decode octal escape sequences (`\NNN`) used by the Linux kernel.
/// Returns a PathBuf via OsString to preserve raw bytes (e.g. invalid UTF-8).
fn unescape_mount_path(raw: &str) -> PathBuf {
    let mut bytes = Vec::with_capacity(raw.len());
    let raw_bytes = raw.as_bytes();
    let mut i = 0;
    while i < raw_bytes.len() {
        if raw_bytes[i] == b'\\' && i + 3 < raw_bytes.len() {
            let digits = &raw_bytes[i + 1..=i + 3];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let val = (digits[0] - b'0') * 64 + (digits[1] - b'0') * 8 + (digits[2] - b'0');
                bytes.push(val);
                i += 4;
                continue;
            }
        }
        bytes.push(raw_bytes[i]);
        i += 1;
    }

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStringExt;
        PathBuf::from(std::ffi::OsString::from_vec(bytes))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
    }
}
