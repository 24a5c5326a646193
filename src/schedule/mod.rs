//! Partitioned iteration over a shared permutation.

pub mod counter;
pub mod partitioned;
pub mod table;

pub use counter::{Counter, TimeScale};
pub use partitioned::PartitionedOrder;
pub use table::{CurPrv, PartitionedTable};
