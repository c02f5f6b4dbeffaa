//! External tool execution: locating binaries, running them, classifying the
//! outcome, and the per-tool benchmark drivers built on top.

pub mod dd;
pub mod exec;
pub mod fio;
pub mod locate;
pub mod patterns;
pub mod scratch;
pub mod winsat;
