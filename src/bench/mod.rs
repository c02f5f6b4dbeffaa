//! The benchmark pass pipeline: select → size → run → parse → render.

pub mod session;

pub use session::{BenchSession, PassBody, PassOutput};
