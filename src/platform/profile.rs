//! Per-OS facts resolved once per process and threaded through the runners.

#![allow(missing_docs)]

use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Operating system family, as far as benchmarking cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsKind {
    Linux,
    MacOs,
    Windows,
    OtherUnix,
}

impl OsKind {
    #[must_use]
    pub fn current() -> Self {
        match env::consts::OS {
            "linux" => Self::Linux,
            "macos" => Self::MacOs,
            "windows" => Self::Windows,
            _ => Self::OtherUnix,
        }
    }
}

/// Nominal fio backing-file size before free-space adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FioSizeClass {
    /// 512 MiB, used on 32/64-bit ARM.
    Compact,
    /// 2 GiB everywhere else.
    Standard,
}

impl FioSizeClass {
    #[must_use]
    pub fn current() -> Self {
        match env::consts::ARCH {
            "arm" | "aarch64" => Self::Compact,
            _ => Self::Standard,
        }
    }
}

/// Everything the runners would otherwise re-derive from `cfg!(target_os)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformProfile {
    pub os: OsKind,
    /// Zero device for dd writes; `None` means a synthetic zero file is written first.
    pub zero_source: Option<PathBuf>,
    /// Null sink for dd reads.
    pub null_sink: PathBuf,
    /// Whether dd gets `oflag=direct` and fio gets `--direct=1`.
    pub direct_io: bool,
    pub home_dir: PathBuf,
    pub temp_dir: PathBuf,
    /// fio io engines in probe order.
    pub io_engines: Vec<&'static str>,
    pub fio_size_class: FioSizeClass,
    /// Whether a `sync` between write and read phases means anything.
    pub sync_supported: bool,
}

impl PlatformProfile {
    /// Profile of the running host.
    #[must_use]
    pub fn detect() -> Self {
        let os = OsKind::current();
        Self::for_os(os, FioSizeClass::current(), home_dir(os), temp_dir(os))
    }

    /// Profile for an arbitrary OS with explicit home/temp directories.
    #[must_use]
    pub fn for_os(
        os: OsKind,
        fio_size_class: FioSizeClass,
        home_dir: PathBuf,
        temp_dir: PathBuf,
    ) -> Self {
        let windows = os == OsKind::Windows;
        Self {
            os,
            zero_source: (!windows).then(|| PathBuf::from("/dev/zero")),
            null_sink: PathBuf::from(if windows { "NUL" } else { "/dev/null" }),
            direct_io: !matches!(os, OsKind::Windows | OsKind::MacOs),
            home_dir,
            temp_dir,
            io_engines: match os {
                OsKind::Linux => vec!["io_uring", "libaio", "posixaio"],
                OsKind::Windows => vec!["windowsaio"],
                OsKind::MacOs | OsKind::OtherUnix => vec!["posixaio"],
            },
            fio_size_class,
            sync_supported: !windows,
        }
    }

    /// Apply a configured direct-IO override.
    #[must_use]
    pub fn with_direct_io(mut self, direct_io: Option<bool>) -> Self {
        if let Some(direct_io) = direct_io {
            self.direct_io = direct_io;
        }
        self
    }

    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == OsKind::Windows
    }

    /// Whether `path` is one of the two single-mode default directories.
    #[must_use]
    pub fn is_default_dir(&self, path: &Path) -> bool {
        path == self.home_dir || path == self.temp_dir
    }
}

fn home_dir(os: OsKind) -> PathBuf {
    if os == OsKind::Windows {
        return env::var_os("USERPROFILE")
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from(r"C:\Users\Default"), PathBuf::from);
    }
    env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from("/root"), PathBuf::from)
}

fn temp_dir(os: OsKind) -> PathBuf {
    let tmp = Path::new("/tmp");
    if os != OsKind::Windows && tmp.is_dir() {
        return tmp.to_path_buf();
    }
    env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(os: OsKind) -> PlatformProfile {
        PlatformProfile::for_os(
            os,
            FioSizeClass::Standard,
            PathBuf::from("/home/bench"),
            PathBuf::from("/tmp"),
        )
    }

    #[test]
    fn linux_uses_devices_and_direct_io() {
        let p = profile(OsKind::Linux);
        assert_eq!(p.zero_source, Some(PathBuf::from("/dev/zero")));
        assert_eq!(p.null_sink, Path::new("/dev/null"));
        assert!(p.direct_io);
        assert!(p.sync_supported);
        assert_eq!(p.io_engines, vec!["io_uring", "libaio", "posixaio"]);
    }

    #[test]
    fn macos_skips_direct_io_but_keeps_zero_device() {
        let p = profile(OsKind::MacOs);
        assert!(!p.direct_io);
        assert!(p.zero_source.is_some());
        assert_eq!(p.io_engines, vec!["posixaio"]);
    }

    #[test]
    fn windows_needs_synthetic_zero_file() {
        let p = profile(OsKind::Windows);
        assert!(p.zero_source.is_none());
        assert_eq!(p.null_sink, Path::new("NUL"));
        assert!(!p.direct_io);
        assert!(!p.sync_supported);
        assert_eq!(p.io_engines, vec!["windowsaio"]);
    }

    #[test]
    fn direct_io_override_wins() {
        let p = profile(OsKind::Linux).with_direct_io(Some(false));
        assert!(!p.direct_io);
        let p = profile(OsKind::MacOs).with_direct_io(None);
        assert!(!p.direct_io);
    }

    #[test]
    fn default_dirs_are_recognized() {
        let p = profile(OsKind::Linux);
        assert!(p.is_default_dir(Path::new("/home/bench")));
        assert!(p.is_default_dir(Path::new("/tmp")));
        assert!(!p.is_default_dir(Path::new("/data")));
    }

    #[test]
    fn detect_matches_host() {
        let p = PlatformProfile::detect();
        assert_eq!(p.os, OsKind::current());
        assert!(!p.io_engines.is_empty());
    }
}
