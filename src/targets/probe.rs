//! Writability probing by creating and deleting a marker file.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const MARKER: &str = ".temp_write_check";

/// Decides whether a directory accepts new files.
pub trait WriteProbe: Send + Sync {
    fn is_writable(&self, dir: &Path) -> bool;
}

/// Real probe: create, write and delete a marker file in the directory.
#[derive(Debug, Default)]
pub struct FsWriteProbe;

impl WriteProbe for FsWriteProbe {
    fn is_writable(&self, dir: &Path) -> bool {
        if !dir.is_dir() {
            return false;
        }
        let marker = dir.join(MARKER);
        let written = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&marker)
            .and_then(|mut file| file.write_all(b"test"));
        let removed = fs::remove_file(&marker);
        written.is_ok() && removed.is_ok()
    }
}

/// Fixed answers for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    denied: HashSet<PathBuf>,
    deny_all: bool,
}

impl StaticProbe {
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn deny_all() -> Self {
        Self {
            deny_all: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn deny<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            denied: paths.into_iter().map(Into::into).collect(),
            deny_all: false,
        }
    }
}

impl WriteProbe for StaticProbe {
    fn is_writable(&self, dir: &Path) -> bool {
        !self.deny_all && !self.denied.contains(dir)
    }
}
