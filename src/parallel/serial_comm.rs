//! Single-process stand-in communicator.
//!
//! `SerialComm` behaves as the only member of a one-process job: rank 0,
//! size 1. Collectives copy `src` into `dest`, point-to-point calls succeed
//! without moving data, and barrier/abort return immediately. Preconditions
//! (buffer lengths, rank range, op support) are checked exactly as the
//! transport-backed communicator checks them, so code that runs here runs
//! unmodified on a real one-process job.

use super::{Comm, Element, Op, check_len, check_members, check_op, check_rank};
use crate::config::CommOptions;
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct SerialComm {
    opts: CommOptions,
}

impl SerialComm {
    pub fn new(opts: CommOptions) -> Self {
        SerialComm { opts }
    }

    pub fn options(&self) -> &CommOptions {
        &self.opts
    }
}

fn copy_into<T: Element>(op: &'static str, dest: &mut [T], src: &[T]) -> Result<()> {
    check_len(op, src.len(), dest.len())?;
    dest.copy_from_slice(src);
    Ok(())
}

impl Comm for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }

    fn abort(&self) -> Result<()> {
        Ok(())
    }

    fn send<T: Element>(&self, to: usize, _tag: i32, _values: &[T]) -> Result<()> {
        self.opts.check(check_rank("send", to, 1))
    }

    fn recv<T: Element>(&self, from: usize, _tag: i32, _values: &mut [T]) -> Result<()> {
        self.opts.check(check_rank("recv", from, 1))
    }

    fn bcast<T: Element>(&self, from: usize, _values: &mut [T]) -> Result<()> {
        self.opts.check(check_rank("bcast", from, 1))
    }

    fn reduce<T: Element>(&self, to: usize, op: Op, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check((|| {
            check_rank("reduce", to, 1)?;
            check_op::<T>(op)?;
            copy_into("reduce", dest, src)
        })())
    }

    fn all_reduce<T: Element>(&self, op: Op, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check((|| {
            check_op::<T>(op)?;
            copy_into("all_reduce", dest, src)
        })())
    }

    fn gather<T: Element>(&self, to: usize, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check((|| {
            check_rank("gather", to, 1)?;
            copy_into("gather", dest, src)
        })())
    }

    fn all_gather<T: Element>(&self, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check(copy_into("all_gather", dest, src))
    }

    fn scatter<T: Element>(&self, from: usize, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check((|| {
            check_rank("scatter", from, 1)?;
            copy_into("scatter", dest, src)
        })())
    }

    fn new_comm(&self, ranks: &[usize]) -> Result<Self> {
        self.opts.check(check_members(ranks, 1))?;
        Ok(self.clone())
    }
}
