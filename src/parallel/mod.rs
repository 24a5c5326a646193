//! Communicators: the `Comm` contract and its backends.
//!
//! All verbs block until this rank's part of the operation is complete. There
//! is no timeout anywhere: a collective that some member never enters, or a
//! `recv` whose matching `send` never happens, blocks forever. Callers that
//! need bounded waits must run their own watchdog and escalate through
//! [`Comm::abort`].

use crate::error::{CommError, Result};

pub mod element;
pub use element::{Element, ElementKind};

pub mod serial_comm;
pub use serial_comm::SerialComm;

pub mod thread_comm;
pub use thread_comm::ThreadComm;

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

/// Rank conventionally used as the root of rooted collectives.
pub const ROOT: usize = 0;

/// Element-wise reduction operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Sum,
    Min,
    Max,
    Product,
}

impl Op {
    pub const ALL: [Op; 4] = [Op::Sum, Op::Min, Op::Max, Op::Product];
}

pub trait Comm {
    /// This process's position in the communicator.
    fn rank(&self) -> usize;
    /// Number of members; fixed at creation.
    fn size(&self) -> usize;
    /// Block until every member has entered the barrier.
    fn barrier(&self) -> Result<()>;
    /// Terminate the whole job abnormally.
    fn abort(&self) -> Result<()>;

    /// Send `values` to rank `to`. Must be paired with a `recv` using the same tag.
    fn send<T: Element>(&self, to: usize, tag: i32, values: &[T]) -> Result<()>;
    /// Receive into `values` from rank `from`.
    fn recv<T: Element>(&self, from: usize, tag: i32, values: &mut [T]) -> Result<()>;

    /// After return every member's `values` equals what `from` held.
    fn bcast<T: Element>(&self, from: usize, values: &mut [T]) -> Result<()>;
    /// Element-wise `op` over every member's `src`, delivered into `dest` on `to`.
    fn reduce<T: Element>(&self, to: usize, op: Op, dest: &mut [T], src: &[T]) -> Result<()>;
    /// Like `reduce`, but every member receives the result.
    fn all_reduce<T: Element>(&self, op: Op, dest: &mut [T], src: &[T]) -> Result<()>;
    /// Rank-ordered concatenation of every `src`, delivered into `dest` on `to`.
    fn gather<T: Element>(&self, to: usize, dest: &mut [T], src: &[T]) -> Result<()>;
    /// Rank-ordered concatenation of every `src`, delivered to every member.
    fn all_gather<T: Element>(&self, dest: &mut [T], src: &[T]) -> Result<()>;
    /// Split `src` on `from` into `size` chunks; chunk `i` lands in rank `i`'s `dest`.
    fn scatter<T: Element>(&self, from: usize, dest: &mut [T], src: &[T]) -> Result<()>;

    /// Communicator over a subset of this one's ranks; empty means all of them.
    ///
    /// Collective over this communicator. Ranks not listed get `NotAMember`.
    fn new_comm(&self, ranks: &[usize]) -> Result<Self>
    where
        Self: Sized;

    /// Reduce a single value across all members.
    fn all_reduce_scalar<T: Element>(&self, op: Op, value: T) -> Result<T> {
        let mut out = [T::default()];
        self.all_reduce(op, &mut out, &[value])?;
        Ok(out[0])
    }
}

pub(crate) fn check_rank(op: &'static str, rank: usize, size: usize) -> Result<()> {
    if rank < size {
        Ok(())
    } else {
        Err(CommError::InvalidRank { op, rank, size })
    }
}

pub(crate) fn check_len(op: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(CommError::BufferSize {
            op,
            expected,
            actual,
        })
    }
}

pub(crate) fn check_op<T: Element>(op: Op) -> Result<()> {
    if T::KIND.supports(op) {
        Ok(())
    } else {
        Err(CommError::UnsupportedOp { op, kind: T::KIND })
    }
}

/// Member ranks for a subset request, validated against `size`.
pub(crate) fn check_members(ranks: &[usize], size: usize) -> Result<Vec<usize>> {
    if ranks.is_empty() {
        return Ok((0..size).collect());
    }
    let mut seen = vec![false; size];
    for &r in ranks {
        check_rank("new_comm", r, size)?;
        if std::mem::replace(&mut seen[r], true) {
            return Err(CommError::InvalidRank {
                op: "new_comm",
                rank: r,
                size,
            });
        }
    }
    Ok(ranks.to_vec())
}

/// Communicator handed out by [`Environment`](crate::env::Environment),
/// selected once at process start.
pub enum UniverseComm {
    #[cfg(feature = "mpi")]
    Mpi(MpiComm),
    Serial(SerialComm),
}

impl UniverseComm {
    pub fn is_stand_in(&self) -> bool {
        matches!(self, UniverseComm::Serial(_))
    }
}

macro_rules! dispatch {
    ($self:ident, $comm:ident => $body:expr) => {
        match $self {
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi($comm) => $body,
            UniverseComm::Serial($comm) => $body,
        }
    };
}

impl Comm for UniverseComm {
    fn rank(&self) -> usize {
        dispatch!(self, comm => comm.rank())
    }
    fn size(&self) -> usize {
        dispatch!(self, comm => comm.size())
    }
    fn barrier(&self) -> Result<()> {
        dispatch!(self, comm => comm.barrier())
    }
    fn abort(&self) -> Result<()> {
        dispatch!(self, comm => comm.abort())
    }
    fn send<T: Element>(&self, to: usize, tag: i32, values: &[T]) -> Result<()> {
        dispatch!(self, comm => comm.send(to, tag, values))
    }
    fn recv<T: Element>(&self, from: usize, tag: i32, values: &mut [T]) -> Result<()> {
        dispatch!(self, comm => comm.recv(from, tag, values))
    }
    fn bcast<T: Element>(&self, from: usize, values: &mut [T]) -> Result<()> {
        dispatch!(self, comm => comm.bcast(from, values))
    }
    fn reduce<T: Element>(&self, to: usize, op: Op, dest: &mut [T], src: &[T]) -> Result<()> {
        dispatch!(self, comm => comm.reduce(to, op, dest, src))
    }
    fn all_reduce<T: Element>(&self, op: Op, dest: &mut [T], src: &[T]) -> Result<()> {
        dispatch!(self, comm => comm.all_reduce(op, dest, src))
    }
    fn gather<T: Element>(&self, to: usize, dest: &mut [T], src: &[T]) -> Result<()> {
        dispatch!(self, comm => comm.gather(to, dest, src))
    }
    fn all_gather<T: Element>(&self, dest: &mut [T], src: &[T]) -> Result<()> {
        dispatch!(self, comm => comm.all_gather(dest, src))
    }
    fn scatter<T: Element>(&self, from: usize, dest: &mut [T], src: &[T]) -> Result<()> {
        dispatch!(self, comm => comm.scatter(from, dest, src))
    }
    fn new_comm(&self, ranks: &[usize]) -> Result<Self> {
        match self {
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.new_comm(ranks).map(UniverseComm::Mpi),
            UniverseComm::Serial(comm) => comm.new_comm(ranks).map(UniverseComm::Serial),
        }
    }
}
