//! Core types: errors, configuration, paths, interruption.

pub mod config;
pub mod errors;
pub mod interrupt;
pub mod paths;
