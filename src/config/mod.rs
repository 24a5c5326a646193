//! Process-wide communicator options.

pub mod options;
pub use options::{CommOptions, Mode};
