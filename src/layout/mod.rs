//! Data layout across ranks: index partitioning and row-tiled gathers of
//! tensors and tables.

pub mod alloc;
pub mod gather;
pub mod tensor;

pub use alloc::{allocate_range, partition};
pub use gather::{gather_table_rows, gather_tensor_rows};
pub use tensor::{Column, ColumnKind, ColumnSchema, Table, Tensor, TensorData};
