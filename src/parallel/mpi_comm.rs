//! MPI-backed communicator.
//!
//! This module provides the transport binding: an implementation of the `Comm`
//! trait that issues every verb as the matching MPI call on a wrapped
//! communicator handle. It is only available when the `mpi` feature is
//! enabled.
//!
//! Each verb derives the MPI datatype from the element kind at the call
//! boundary ([`wire_datatype`]) and checks the returned status code. A
//! nonzero status becomes [`CommError::Transport`] carrying the code, the
//! message from `MPI_Error_string`, and the name of the verb. Every
//! communicator is switched to `MPI_ERRORS_RETURN` when it is created, so a
//! failing call returns its status instead of aborting the job.
//!
//! Each communicator holds a reference to the transport universe. The
//! transport is finalized only after the environment and every communicator
//! obtained from it have been dropped.
//!
//! # References
//! - [MPI Standard](https://www.mpi-forum.org/)
//!
//! # Example
//! ```no_run
//! use procomm::{CommOptions, Environment, Mode};
//! use procomm::parallel::Comm;
//!
//! let env = Environment::init(CommOptions { mode: Mode::Active, ..Default::default() }).unwrap();
//! let world = env.world();
//! println!("Rank: {} / {}", world.rank(), world.size());
//! world.barrier().unwrap();
//! ```

use std::mem::MaybeUninit;
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Arc;

use mpi::collective::SystemOperation;
use mpi::datatype::Equivalence;
use mpi::environment::Universe;
use mpi::ffi;
use mpi::raw::AsRaw;
use mpi::topology::{Communicator, Group, SimpleCommunicator};
use num_complex::Complex64;

use super::{Comm, Element, ElementKind, Op, check_len, check_members, check_op, check_rank};
use crate::config::CommOptions;
use crate::error::{CommError, Result};

// Large enough for MPICH (1024) and Open MPI (256).
const MAX_ERROR_STRING: usize = 1024;

/// Wire datatype for an element kind.
pub fn wire_datatype(kind: ElementKind) -> ffi::MPI_Datatype {
    match kind {
        ElementKind::I8 => i8::equivalent_datatype().as_raw(),
        ElementKind::I16 => i16::equivalent_datatype().as_raw(),
        ElementKind::I32 => i32::equivalent_datatype().as_raw(),
        ElementKind::I64 => i64::equivalent_datatype().as_raw(),
        ElementKind::U8 => u8::equivalent_datatype().as_raw(),
        ElementKind::U16 => u16::equivalent_datatype().as_raw(),
        ElementKind::U32 => u32::equivalent_datatype().as_raw(),
        ElementKind::U64 => u64::equivalent_datatype().as_raw(),
        ElementKind::F32 => f32::equivalent_datatype().as_raw(),
        ElementKind::F64 => f64::equivalent_datatype().as_raw(),
        ElementKind::C128 => Complex64::equivalent_datatype().as_raw(),
    }
}

fn wire_op(op: Op) -> ffi::MPI_Op {
    match op {
        Op::Sum => SystemOperation::sum().as_raw(),
        Op::Min => SystemOperation::min().as_raw(),
        Op::Max => SystemOperation::max().as_raw(),
        Op::Product => SystemOperation::product().as_raw(),
    }
}

/// Human-readable message for a transport status code.
pub fn error_string(code: c_int) -> String {
    let mut buf = vec![0 as c_char; MAX_ERROR_STRING];
    let mut len: c_int = 0;
    let ret = unsafe { ffi::MPI_Error_string(code, buf.as_mut_ptr(), &mut len) };
    if ret != 0 {
        return format!("unknown transport error {code}");
    }
    let len = (len.max(0) as usize).min(buf.len());
    let bytes: Vec<u8> = buf[..len].iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn count(op: &'static str, len: usize) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| CommError::BufferSize {
        op,
        expected: c_int::MAX as usize,
        actual: len,
    })
}

/// MPI communicator wrapper.
///
/// Holds the transport handle plus the rank and size, which are fixed for the
/// communicator's lifetime and cached at creation.
pub struct MpiComm {
    // Dropped before `universe`: the handle is freed before finalize.
    comm: SimpleCommunicator,
    rank: usize,
    size: usize,
    opts: CommOptions,
    universe: Arc<Universe>,
}

impl MpiComm {
    /// Wrap `comm` and switch it to returning errors.
    pub(crate) fn new(
        comm: SimpleCommunicator,
        opts: CommOptions,
        universe: Arc<Universe>,
    ) -> Result<Self> {
        let wrapped = Self::attach(comm, opts, universe);
        wrapped.return_errors()?;
        Ok(wrapped)
    }

    /// Wrap a communicator whose error handler is already installed.
    pub(crate) fn attach(
        comm: SimpleCommunicator,
        opts: CommOptions,
        universe: Arc<Universe>,
    ) -> Self {
        let rank = comm.rank() as usize;
        let size = comm.size() as usize;
        MpiComm {
            comm,
            rank,
            size,
            opts,
            universe,
        }
    }

    fn return_errors(&self) -> Result<()> {
        let code = unsafe { ffi::MPI_Comm_set_errhandler(self.raw(), ffi::RSMPI_ERRORS_RETURN) };
        self.status("set_errhandler", code)
    }

    fn raw(&self) -> ffi::MPI_Comm {
        self.comm.as_raw()
    }

    /// Map a status code to `Ok` or a logged transport error.
    fn status(&self, op: &'static str, code: c_int) -> Result<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(self.opts.report(CommError::Transport {
                code,
                message: error_string(code),
                op,
            }))
        }
    }
}

impl Comm for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<()> {
        let code = unsafe { ffi::MPI_Barrier(self.raw()) };
        self.status("barrier", code)
    }

    fn abort(&self) -> Result<()> {
        let code = unsafe { ffi::MPI_Abort(self.raw(), 1) };
        self.status("abort", code)
    }

    fn send<T: Element>(&self, to: usize, tag: i32, values: &[T]) -> Result<()> {
        self.opts.check(check_rank("send", to, self.size))?;
        let n = self.opts.check(count("send", values.len()))?;
        let code = unsafe {
            ffi::MPI_Send(
                values.as_ptr().cast::<c_void>(),
                n,
                wire_datatype(T::KIND),
                to as c_int,
                tag,
                self.raw(),
            )
        };
        self.status("send", code)
    }

    fn recv<T: Element>(&self, from: usize, tag: i32, values: &mut [T]) -> Result<()> {
        self.opts.check(check_rank("recv", from, self.size))?;
        let n = self.opts.check(count("recv", values.len()))?;
        let mut status = MaybeUninit::<ffi::MPI_Status>::uninit();
        let code = unsafe {
            ffi::MPI_Recv(
                values.as_mut_ptr().cast::<c_void>(),
                n,
                wire_datatype(T::KIND),
                from as c_int,
                tag,
                self.raw(),
                status.as_mut_ptr(),
            )
        };
        self.status("recv", code)
    }

    fn bcast<T: Element>(&self, from: usize, values: &mut [T]) -> Result<()> {
        self.opts.check(check_rank("bcast", from, self.size))?;
        let n = self.opts.check(count("bcast", values.len()))?;
        let code = unsafe {
            ffi::MPI_Bcast(
                values.as_mut_ptr().cast::<c_void>(),
                n,
                wire_datatype(T::KIND),
                from as c_int,
                self.raw(),
            )
        };
        self.status("bcast", code)
    }

    fn reduce<T: Element>(&self, to: usize, op: Op, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check(check_rank("reduce", to, self.size))?;
        self.opts.check(check_op::<T>(op))?;
        if self.rank == to {
            self.opts.check(check_len("reduce", src.len(), dest.len()))?;
        }
        let n = self.opts.check(count("reduce", src.len()))?;
        let code = unsafe {
            ffi::MPI_Reduce(
                src.as_ptr().cast::<c_void>(),
                dest.as_mut_ptr().cast::<c_void>(),
                n,
                wire_datatype(T::KIND),
                wire_op(op),
                to as c_int,
                self.raw(),
            )
        };
        self.status("reduce", code)
    }

    fn all_reduce<T: Element>(&self, op: Op, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check(check_op::<T>(op))?;
        self.opts.check(check_len("all_reduce", src.len(), dest.len()))?;
        let n = self.opts.check(count("all_reduce", src.len()))?;
        let code = unsafe {
            ffi::MPI_Allreduce(
                src.as_ptr().cast::<c_void>(),
                dest.as_mut_ptr().cast::<c_void>(),
                n,
                wire_datatype(T::KIND),
                wire_op(op),
                self.raw(),
            )
        };
        self.status("all_reduce", code)
    }

    fn gather<T: Element>(&self, to: usize, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check(check_rank("gather", to, self.size))?;
        if self.rank == to {
            self.opts.check(check_len("gather", self.size * src.len(), dest.len()))?;
        }
        let n = self.opts.check(count("gather", src.len()))?;
        let dt = wire_datatype(T::KIND);
        let code = unsafe {
            ffi::MPI_Gather(
                src.as_ptr().cast::<c_void>(),
                n,
                dt,
                dest.as_mut_ptr().cast::<c_void>(),
                n,
                dt,
                to as c_int,
                self.raw(),
            )
        };
        self.status("gather", code)
    }

    fn all_gather<T: Element>(&self, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check(check_len("all_gather", self.size * src.len(), dest.len()))?;
        let n = self.opts.check(count("all_gather", src.len()))?;
        let dt = wire_datatype(T::KIND);
        let code = unsafe {
            ffi::MPI_Allgather(
                src.as_ptr().cast::<c_void>(),
                n,
                dt,
                dest.as_mut_ptr().cast::<c_void>(),
                n,
                dt,
                self.raw(),
            )
        };
        self.status("all_gather", code)
    }

    fn scatter<T: Element>(&self, from: usize, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check(check_rank("scatter", from, self.size))?;
        if self.rank == from {
            self.opts.check(check_len("scatter", self.size * dest.len(), src.len()))?;
        }
        let n = self.opts.check(count("scatter", dest.len()))?;
        let dt = wire_datatype(T::KIND);
        let code = unsafe {
            ffi::MPI_Scatter(
                src.as_ptr().cast::<c_void>(),
                n,
                dt,
                dest.as_mut_ptr().cast::<c_void>(),
                n,
                dt,
                from as c_int,
                self.raw(),
            )
        };
        self.status("scatter", code)
    }

    fn new_comm(&self, ranks: &[usize]) -> Result<Self> {
        if ranks.is_empty() {
            let dup = self.comm.duplicate();
            return MpiComm::new(dup, self.opts.clone(), Arc::clone(&self.universe));
        }
        let members = self.opts.check(check_members(ranks, self.size))?;
        let members: Vec<i32> = members.iter().map(|&r| r as i32).collect();
        let group = self.comm.group().include(&members[..]);
        match self.comm.split_by_subgroup_collective(&group) {
            Some(comm) => MpiComm::new(comm, self.opts.clone(), Arc::clone(&self.universe)),
            None => Err(self.opts.report(CommError::NotAMember(self.rank))),
        }
    }
}
