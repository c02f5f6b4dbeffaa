//! Finding the external binaries: configured path, then `PATH`, then a
//! bundled copy extracted into a private temporary directory.

#![allow(missing_docs)]

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::core::config::ToolsConfig;
use crate::core::errors::{DtError, Result};
use crate::logger::jsonl::{EventType, LogEntry};
use crate::logger::sink::{EventSink, NullSink};

/// External programs the runners may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Dd,
    Fio,
    Winsat,
    Timeout,
    Sync,
}

impl Tool {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dd => "dd",
            Self::Fio => "fio",
            Self::Winsat => "winsat",
            Self::Timeout => "timeout",
            Self::Sync => "sync",
        }
    }

    /// Only dd and fio ship as bundled fallbacks.
    #[must_use]
    pub const fn bundleable(self) -> bool {
        matches!(self, Self::Dd | Self::Fio)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a located binary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSource {
    Configured,
    SystemPath,
    Bundled,
}

/// A usable binary path. Bundled binaries live in a private directory that is
/// removed when the lease drops.
#[derive(Debug)]
pub struct ToolLease {
    path: PathBuf,
    source: ToolSource,
    cleanup_dir: Option<PathBuf>,
}

impl ToolLease {
    #[must_use]
    pub fn new(path: PathBuf, source: ToolSource) -> Self {
        Self {
            path,
            source,
            cleanup_dir: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn source(&self) -> ToolSource {
        self.source
    }
}

impl Drop for ToolLease {
    fn drop(&mut self) {
        if let Some(dir) = self.cleanup_dir.take() {
            let _ = fs::remove_dir_all(dir);
        }
    }
}

// ──────────────────── embedded provider ────────────────────

/// Extracts bundled binaries named `<tool>-<os>-<arch>` (or plain `<tool>`)
/// out of a bundle directory.
#[derive(Debug, Clone)]
pub struct EmbeddedProvider {
    bundle_dir: PathBuf,
    extract_root: PathBuf,
}

impl EmbeddedProvider {
    #[must_use]
    pub fn new(bundle_dir: PathBuf) -> Self {
        Self {
            bundle_dir,
            extract_root: env::temp_dir(),
        }
    }

    #[must_use]
    pub fn with_extract_root(mut self, root: PathBuf) -> Self {
        self.extract_root = root;
        self
    }

    /// Bundle file for `tool` on this host, if present.
    #[must_use]
    pub fn bundled_file(&self, tool: Tool) -> Option<PathBuf> {
        let exe = env::consts::EXE_SUFFIX;
        [
            format!("{}-{}-{}{exe}", tool.name(), os_tag(), arch_tag()),
            format!("{}{exe}", tool.name()),
        ]
        .into_iter()
        .map(|name| self.bundle_dir.join(name))
        .find(|candidate| candidate.is_file())
    }

    /// Copy the bundled binary into a fresh private directory.
    pub fn provision(&self, tool: Tool) -> Result<ToolLease> {
        let source = self
            .bundled_file(tool)
            .ok_or_else(|| DtError::ToolUnavailable {
                tool: tool.name(),
                details: format!("no bundled binary in {}", self.bundle_dir.display()),
            })?;
        verify_sidecar(tool, &source)?;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.subsec_nanos());
        let dir = self
            .extract_root
            .join(format!("disktest-{}-{}-{nanos}", tool.name(), process::id()));
        fs::create_dir_all(&dir).map_err(|e| DtError::io(&dir, e))?;

        let target = dir.join(format!("{}{}", tool.name(), env::consts::EXE_SUFFIX));
        let lease = ToolLease {
            path: target.clone(),
            source: ToolSource::Bundled,
            cleanup_dir: Some(dir),
        };
        fs::copy(&source, &target).map_err(|e| DtError::io(&target, e))?;
        make_executable(&target)?;
        Ok(lease)
    }
}

fn os_tag() -> &'static str {
    match env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn arch_tag() -> &'static str {
    match env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// Compare against `<file>.sha256` when the sidecar exists.
fn verify_sidecar(tool: Tool, binary: &Path) -> Result<()> {
    let mut sidecar = binary.as_os_str().to_owned();
    sidecar.push(".sha256");
    let sidecar = PathBuf::from(sidecar);
    if !sidecar.is_file() {
        return Ok(());
    }
    let raw = fs::read_to_string(&sidecar).map_err(|e| DtError::io(&sidecar, e))?;
    let expected = raw
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let actual = compute_sha256(binary).map_err(|e| DtError::io(binary, e))?;
    if expected != actual {
        return Err(DtError::ChecksumMismatch {
            tool: tool.name(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// SHA-256 hex digest of a file.
pub fn compute_sha256(path: &Path) -> io::Result<String> {
    let data = fs::read(path)?;
    let digest = Sha256::digest(&data);
    Ok(digest.iter().fold(String::with_capacity(64), |mut s, b| {
        use std::fmt::Write;
        let _ = write!(s, "{b:02x}");
        s
    }))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| DtError::io(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

// ──────────────────── locator ────────────────────

/// Resolves [`Tool`]s in order: configured path, `PATH`, bundle.
pub struct ToolLocator {
    config: ToolsConfig,
    embedded: Option<EmbeddedProvider>,
    sink: Arc<dyn EventSink>,
}

impl ToolLocator {
    #[must_use]
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            config: config.clone(),
            embedded: config.bundle_dir.clone().map(EmbeddedProvider::new),
            sink: Arc::new(NullSink),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_embedded(mut self, provider: EmbeddedProvider) -> Self {
        self.embedded = Some(provider);
        self
    }

    fn configured(&self, tool: Tool) -> Option<&PathBuf> {
        match tool {
            Tool::Dd => self.config.dd.as_ref(),
            Tool::Fio => self.config.fio.as_ref(),
            Tool::Winsat => self.config.winsat.as_ref(),
            Tool::Timeout => self.config.timeout.as_ref(),
            Tool::Sync => self.config.sync.as_ref(),
        }
    }

    pub fn locate(&self, tool: Tool) -> Result<ToolLease> {
        if let Some(path) = self.configured(tool) {
            if path.is_file() {
                return Ok(ToolLease::new(path.clone(), ToolSource::Configured));
            }
            return Err(DtError::ToolUnavailable {
                tool: tool.name(),
                details: format!("configured path {} does not exist", path.display()),
            });
        }

        if self.config.search_path {
            if let Ok(path) = which::which(tool.name()) {
                return Ok(ToolLease::new(path, ToolSource::SystemPath));
            }
        }

        if tool.bundleable() {
            if let Some(provider) = &self.embedded {
                let lease = provider.provision(tool);
                let entry = LogEntry::info(EventType::ToolProvisioned).tool(tool.name());
                match &lease {
                    Ok(lease) => self.sink.record(entry.path(lease.path()).ok(true)),
                    Err(err) => self.sink.record(entry.ok(false).error(err)),
                }
                return lease;
            }
        }

        Err(DtError::ToolUnavailable {
            tool: tool.name(),
            details: "not found on PATH and no bundled binary available".to_string(),
        })
    }
}
