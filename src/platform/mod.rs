//! Platform abstraction layer: partition enumeration, free-space queries and
//! the resolved per-OS profile.

pub mod pal;
pub mod profile;
