//! SIGINT/SIGTERM handling for a benchmark pass.
//!
//! Uses the `signal-hook` crate for safe signal registration. The session
//! polls [`InterruptFlag`] between cells rather than blocking on signals, so an
//! in-flight tool invocation is allowed to finish and its scratch files are
//! still removed.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Shared "stop scheduling new work" flag.
///
/// Relaxed ordering is enough: the flag guards no other memory.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    /// A flag nothing will raise except [`InterruptFlag::raise`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flag wired to SIGINT and SIGTERM.
    ///
    /// Registration is best-effort; failures are reported on stderr but not fatal.
    #[must_use]
    pub fn install() -> Self {
        let flag = Self::new();
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&flag.raised)) {
            eprintln!("[DT-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&flag.raised)) {
            eprintln!("[DT-SIGNAL] failed to register SIGINT: {e}");
        }
        flag
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Relaxed)
    }

    /// Programmatically request a stop (tests, scripted runners).
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_flag_is_clear() {
        assert!(!InterruptFlag::new().is_raised());
    }

    #[test]
    fn raise_is_visible_through_clones() {
        let flag = InterruptFlag::new();
        let observer = flag.clone();
        flag.raise();
        assert!(observer.is_raised());
    }

    #[test]
    fn installed_flag_starts_clear() {
        let flag = InterruptFlag::install();
        assert!(!flag.is_raised());
    }
}
