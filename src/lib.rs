#![forbid(unsafe_code)]

//! disktest: disk I/O benchmarking across writable paths.
//!
//! A pass selects test targets (the home directory, every writable
//! partition, or one explicit path), shrinks test sizes to fit free space,
//! drives `dd`, `fio` or `winsat` against each target, parses their output
//! and renders a column-aligned table.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use disktest::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use disktest::core::config::Config;
//! use disktest::parse::dd::parse_dd;
//! ```

pub mod prelude;

pub mod bench;
pub mod core;
pub mod logger;
pub mod parse;
pub mod plan;
pub mod platform;
pub mod report;
pub mod runner;
pub mod targets;
