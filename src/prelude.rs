//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use disktest::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, Language, TestMethod};
pub use crate::core::errors::{DtError, Result};
pub use crate::core::interrupt::InterruptFlag;

// Platform
pub use crate::platform::pal::{FsStats, MountPoint, Platform, detect_platform};
pub use crate::platform::profile::PlatformProfile;

// Pipeline
pub use crate::bench::{BenchSession, PassBody, PassOutput};
pub use crate::targets::selector::TargetSelector;
pub use crate::targets::{TargetOrigin, TestTarget};

// Sizing and parsing
pub use crate::parse::{DdMeasurement, FioMeasurement, ParseFailure, WinsatScores, parse_dd, parse_fio, parse_winsat};
pub use crate::plan::sizing::{adjust_dd_plan, plan_fio};
pub use crate::plan::{BlockSize, DdPlan, FioPlan, PlanEntry, default_dd_plan};

// Reporting
pub use crate::report::{BenchmarkResult, Cell, FailureReason, Report, ReportKind};

// Logging
pub use crate::logger::sink::{EventSink, MemorySink, NullSink};
