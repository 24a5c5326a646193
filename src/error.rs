use std::ops::Range;

use thiserror::Error;

use crate::parallel::{ElementKind, Op};

// Unified error type for procomm

pub type Result<T> = std::result::Result<T, CommError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommError {
    #[error("transport error {code} in {op}: {message}")]
    Transport {
        code: i32,
        message: String,
        op: &'static str,
    },
    #[error("{op}: buffer holds {actual} elements, expected {expected}")]
    BufferSize {
        op: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{op}: rank {rank} out of range for communicator of size {size}")]
    InvalidRank {
        op: &'static str,
        rank: usize,
        size: usize,
    },
    #[error("{op:?} is not defined for element kind {kind}")]
    UnsupportedOp { op: Op, kind: ElementKind },
    #[error("unsupported element kind: {0}")]
    UnsupportedKind(&'static str),
    #[error("schema mismatch: {0}")]
    Schema(String),
    #[error("number of items {n} is not an even multiple of number of procs {size}")]
    PartitionImbalance {
        n: usize,
        size: usize,
        /// Floor-divided range this rank should fall back to.
        range: Range<usize>,
    },
    #[error("rank {0} is not a member of the requested group")]
    NotAMember(usize),
    #[error("{op}: a peer rank failed; the communicator is unusable")]
    PeerFailed { op: &'static str },
    #[error("transport already initialized")]
    AlreadyInitialized,
    #[error("message-passing transport not available in this build")]
    TransportUnavailable,
    #[error("invalid option {key}={value}")]
    InvalidOption { key: &'static str, value: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl CommError {
    /// The best-effort range carried by a partition imbalance, if any.
    pub fn fallback_range(&self) -> Option<Range<usize>> {
        match self {
            CommError::PartitionImbalance { range, .. } => Some(range.clone()),
            _ => None,
        }
    }
}
