//! Activity logging: an injected [`sink::EventSink`] with a JSONL file backend.

pub mod jsonl;
pub mod sink;
