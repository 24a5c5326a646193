//! Process-level entry point: initialize the selected backend once and hand
//! out communicators.

pub mod environment;
pub use environment::Environment;
