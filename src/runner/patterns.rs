//! Error phrases the tools print instead of structured failures.
//!
//! dd and fio report "the sink refused this" only as free text, in the
//! host's locale. These tables are the complete list of phrases the runners
//! branch on; extend a table (and bump its version) when a new locale or
//! platform phrase turns up.

#![allow(missing_docs)]

/// A versioned list of substrings that mark a soft failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternTable {
    pub name: &'static str,
    pub version: u32,
    pub phrases: &'static [&'static str],
}

impl PatternTable {
    /// First phrase contained in `text`, if any.
    #[must_use]
    pub fn matches(&self, text: &str) -> Option<&'static str> {
        self.phrases.iter().copied().find(|p| text.contains(p))
    }
}

/// dd stderr: the sink or target refused the transfer (direct IO, permissions).
pub const DD_SOFT_FAILURE: PatternTable = PatternTable {
    name: "dd-soft-failure",
    version: 1,
    phrases: &["Invalid argument", "Permission denied", "失败", "无效的参数"],
};

/// fio stderr during the backing-file setup run.
pub const FIO_SETUP_FAILURE: PatternTable = PatternTable {
    name: "fio-setup-failure",
    version: 1,
    phrases: &["failed", "Permission denied", "No such file or directory"],
};
