//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{DtError, Result};
use crate::plan::BlockSize;

const GIB: u64 = 1024 * 1024 * 1024;

/// Full disktest configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub selection: SelectionConfig,
    pub dd: DdConfig,
    pub fio: FioConfig,
    pub tools: ToolsConfig,
    pub logging: LoggingConfig,
    /// Where this config was loaded from (not serialized).
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

/// Report language. Only headers and failure labels change with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    #[default]
    Zh,
}

impl FromStr for Language {
    type Err = DtError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "zh" => Ok(Self::Zh),
            other => Err(DtError::InvalidConfig {
                details: format!("unknown language {other:?} (expected en or zh)"),
            }),
        }
    }
}

/// Which external tool drives the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TestMethod {
    #[default]
    Fio,
    Dd,
    Winsat,
}

impl TestMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fio => "fio",
            Self::Dd => "dd",
            Self::Winsat => "winsat",
        }
    }
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMethod {
    type Err = DtError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fio" => Ok(Self::Fio),
            "dd" => Ok(Self::Dd),
            "winsat" => Ok(Self::Winsat),
            other => Err(DtError::InvalidConfig {
                details: format!("unknown test method {other:?} (expected fio, dd or winsat)"),
            }),
        }
    }
}

/// What to benchmark and how to pace it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    pub language: Language,
    pub method: TestMethod,
    /// Benchmark every writable partition instead of the single default path.
    pub multi_path: bool,
    /// Benchmark exactly this directory; disables enumeration.
    pub test_path: Option<PathBuf>,
    /// Fixed pause between write/read phases and between targets.
    pub pause_ms: u64,
}

/// Path-selection thresholds and extra exclusions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Volumes with more free space than this are tested even in single-path mode.
    pub large_volume_min_free_bytes: u64,
    /// A mount under `/run` larger than this is treated as a real data volume.
    pub run_mount_min_total_bytes: u64,
    pub extra_excluded_fs_types: Vec<String>,
    pub extra_excluded_mounts: Vec<PathBuf>,
}

/// dd-specific knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DdConfig {
    /// Force `oflag=direct` on or off; `None` follows the platform profile.
    pub direct_io: Option<bool>,
}

/// fio-specific knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FioConfig {
    /// Outer `timeout` wrapper bound per invocation.
    pub timeout_secs: u64,
    pub runtime_secs: u64,
    pub warmup_runtime_secs: u64,
    pub iodepth: u32,
    pub numjobs: u32,
    pub block_sizes: Vec<String>,
}

/// Where the external binaries come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    pub dd: Option<PathBuf>,
    pub fio: Option<PathBuf>,
    pub winsat: Option<PathBuf>,
    pub timeout: Option<PathBuf>,
    pub sync: Option<PathBuf>,
    /// Look binaries up on `PATH` when no explicit path is configured.
    pub search_path: bool,
    /// Directory holding bundled fallback binaries (`fio-linux-amd64`, ...).
    pub bundle_dir: Option<PathBuf>,
}

/// Activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
    pub fallback_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            method: TestMethod::default(),
            multi_path: false,
            test_path: None,
            pause_ms: 1_000,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            large_volume_min_free_bytes: 210 * GIB,
            run_mount_min_total_bytes: 50 * GIB,
            extra_excluded_fs_types: Vec::new(),
            extra_excluded_mounts: Vec::new(),
        }
    }
}

impl Default for FioConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 35,
            runtime_secs: 30,
            warmup_runtime_secs: 1,
            iodepth: 64,
            numjobs: 2,
            block_sizes: ["4k", "64k", "512k", "1m"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dd: None,
            fio: None,
            winsat: None,
            timeout: None,
            sync: None,
            search_path: true,
            bundle_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            enabled: false,
            jsonl_path: data.join("disktest.jsonl"),
            fallback_path: Some(env::temp_dir().join("disktest.jsonl")),
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map_or_else(env::temp_dir, PathBuf::from)
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("disktest")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        home_dir()
            .join(".config")
            .join("disktest")
            .join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| DtError::io(&path_buf, source))?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(DtError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = Some(path_buf);
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parsed fio block sweep. Validation guarantees every entry parses.
    pub fn fio_block_sizes(&self) -> Result<Vec<BlockSize>> {
        self.fio
            .block_sizes
            .iter()
            .map(|raw| BlockSize::parse(raw))
            .collect()
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("DISKTEST_LANGUAGE") {
            self.run.language = raw.parse()?;
        }
        if let Some(raw) = lookup("DISKTEST_METHOD") {
            self.run.method = raw.parse()?;
        }
        if let Some(raw) = lookup("DISKTEST_MULTI_PATH") {
            self.run.multi_path = parse_env_bool("DISKTEST_MULTI_PATH", &raw)?;
        }
        if let Some(raw) = lookup("DISKTEST_TEST_PATH") {
            self.run.test_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("DISKTEST_PAUSE_MS") {
            self.run.pause_ms = parse_env_u64("DISKTEST_PAUSE_MS", &raw)?;
        }

        if let Some(raw) = lookup("DISKTEST_FIO_TIMEOUT_SECS") {
            self.fio.timeout_secs = parse_env_u64("DISKTEST_FIO_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("DISKTEST_FIO_RUNTIME_SECS") {
            self.fio.runtime_secs = parse_env_u64("DISKTEST_FIO_RUNTIME_SECS", &raw)?;
        }

        if let Some(raw) = lookup("DISKTEST_TOOLS_SEARCH_PATH") {
            self.tools.search_path = parse_env_bool("DISKTEST_TOOLS_SEARCH_PATH", &raw)?;
        }
        if let Some(raw) = lookup("DISKTEST_TOOLS_BUNDLE_DIR") {
            self.tools.bundle_dir = Some(PathBuf::from(raw));
        }

        if let Some(raw) = lookup("DISKTEST_LOG") {
            self.logging.enabled = parse_env_bool("DISKTEST_LOG", &raw)?;
        }
        if let Some(raw) = lookup("DISKTEST_LOG_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.fio.timeout_secs == 0 || self.fio.runtime_secs == 0 {
            return Err(DtError::InvalidConfig {
                details: "fio.timeout_secs and fio.runtime_secs must be > 0".to_string(),
            });
        }
        // The outer timeout must leave fio room to finish its own runtime.
        if self.fio.timeout_secs <= self.fio.runtime_secs {
            return Err(DtError::InvalidConfig {
                details: format!(
                    "fio.timeout_secs ({}) must be > fio.runtime_secs ({})",
                    self.fio.timeout_secs, self.fio.runtime_secs
                ),
            });
        }
        if self.fio.iodepth == 0 || self.fio.numjobs == 0 {
            return Err(DtError::InvalidConfig {
                details: "fio.iodepth and fio.numjobs must be >= 1".to_string(),
            });
        }
        if self.fio.block_sizes.is_empty() {
            return Err(DtError::InvalidConfig {
                details: "fio.block_sizes must not be empty".to_string(),
            });
        }
        self.fio_block_sizes()?;

        if self.selection.run_mount_min_total_bytes == 0 {
            return Err(DtError::InvalidConfig {
                details: "selection.run_mount_min_total_bytes must be > 0".to_string(),
            });
        }

        if let Some(path) = &self.run.test_path
            && path.as_os_str().is_empty()
        {
            return Err(DtError::InvalidConfig {
                details: "run.test_path must not be empty when set".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|error| DtError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DtError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: expected a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, DtError, Language, TestMethod};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.run.method, TestMethod::Fio);
        assert_eq!(cfg.run.language, Language::Zh);
        assert_eq!(cfg.fio.timeout_secs, 35);
    }

    #[test]
    fn fio_timeout_must_exceed_runtime() {
        let mut cfg = Config::default();
        cfg.fio.timeout_secs = 30;
        let err = cfg.validate().expect_err("expected timeout error");
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn empty_block_sweep_rejected() {
        let mut cfg = Config::default();
        cfg.fio.block_sizes.clear();
        let err = cfg.validate().expect_err("expected sweep error");
        assert!(err.to_string().contains("block_sizes"));
    }

    #[test]
    fn malformed_block_size_rejected() {
        let mut cfg = Config::default();
        cfg.fio.block_sizes = vec!["4k".to_string(), "lots".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_iodepth_rejected() {
        let mut cfg = Config::default();
        cfg.fio.iodepth = 0;
        let err = cfg.validate().expect_err("expected iodepth error");
        assert!(err.to_string().contains("iodepth"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("DISKTEST_LANGUAGE", "EN"),
            ("DISKTEST_METHOD", "dd"),
            ("DISKTEST_MULTI_PATH", "true"),
            ("DISKTEST_TEST_PATH", "/data/bench"),
            ("DISKTEST_PAUSE_MS", "0"),
            ("DISKTEST_LOG", "1"),
        ]);

        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");

        assert_eq!(cfg.run.language, Language::En);
        assert_eq!(cfg.run.method, TestMethod::Dd);
        assert!(cfg.run.multi_path);
        assert_eq!(cfg.run.test_path, Some(PathBuf::from("/data/bench")));
        assert_eq!(cfg.run.pause_ms, 0);
        assert!(cfg.logging.enabled);
    }

    #[test]
    fn env_invalid_number_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("DISKTEST_FIO_TIMEOUT_SECS", "soon")]);
        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid number should fail");
        match err {
            DtError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("DISKTEST_FIO_TIMEOUT_SECS"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_method_rejected() {
        assert!("zfs".parse::<TestMethod>().is_err());
        assert_eq!("WINSAT".parse::<TestMethod>().unwrap(), TestMethod::Winsat);
    }

    #[test]
    fn toml_sections_parse() {
        let raw = r#"
            [run]
            language = "en"
            method = "dd"
            multi_path = true

            [fio]
            block_sizes = ["4k", "1m"]

            [tools]
            search_path = false
            dd = "/usr/bin/dd"
        "#;
        let cfg: Config = toml::from_str(raw).expect("config should parse");
        assert_eq!(cfg.run.language, Language::En);
        assert_eq!(cfg.run.method, TestMethod::Dd);
        assert!(cfg.run.multi_path);
        assert_eq!(cfg.fio.block_sizes.len(), 2);
        assert_eq!(cfg.fio.timeout_secs, 35);
        assert!(!cfg.tools.search_path);
        assert_eq!(cfg.tools.dd, Some(PathBuf::from("/usr/bin/dd")));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/disktest/config.toml")));
        assert!(matches!(result, Err(DtError::MissingConfig { .. })));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[run]\npause_ms = 5\n").unwrap();
        let cfg = Config::load(Some(&path)).expect("config should load");
        assert_eq!(cfg.config_file.as_deref(), Some(path.as_path()));
    }
}
