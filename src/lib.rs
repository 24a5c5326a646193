//! procomm: communicators over MPI-style message passing
//!
//! This crate provides a `Comm` trait covering point-to-point and collective
//! verbs over a closed set of element kinds, with interchangeable backends: the
//! MPI transport (feature `mpi`), a single-process stand-in, and an in-process
//! thread cluster for multi-rank testing. On top of it sit row-tiled gathers
//! of tensors and tables, even index partitioning, rank-gated output, and a
//! partitioned permutation for synchronized iteration.

pub mod parallel;

pub mod config;
pub mod env;
pub mod error;
pub mod layout;
pub mod output;
pub mod schedule;

// Re-exports for convenience
pub use config::{CommOptions, Mode};
pub use env::Environment;
pub use error::{CommError, Result};
pub use layout::{
    Table, Tensor, TensorData, allocate_range, gather_table_rows, gather_tensor_rows, partition,
};
pub use output::Printer;
pub use parallel::{Comm, Element, ElementKind, Op, UniverseComm};
pub use schedule::{PartitionedOrder, PartitionedTable, TimeScale};
