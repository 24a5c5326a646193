//! Seeded permutation of `0..n` split across ranks.
//!
//! Every rank builds the same permutation from a shared seed, then walks only
//! its own contiguous block of positions (see [`partition`]). When a rank
//! steps past the end of its block, the permutation is shuffled again from
//! the same RNG stream, the position returns to the start of the block, and
//! the epoch counter increments. Ranks that start from the same seed and step
//! the same number of times stay synchronized without communicating.
//!
//! `n` should be a multiple of the number of ranks. When it is not, the
//! imbalance is logged and the trailing positions are never visited.

use std::ops::Range;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::counter::{Counter, TimeScale};
use crate::error::{CommError, Result};
use crate::layout::partition;
use crate::parallel::Comm;

#[derive(Debug, Clone)]
pub struct PartitionedOrder {
    order: Vec<usize>,
    rng: StdRng,
    range: Range<usize>,
    sequential: bool,
    started: bool,
    run: Counter,
    epoch: Counter,
    trial: Counter,
}

impl PartitionedOrder {
    /// Shuffled order of `0..n` for this rank of `comm`.
    pub fn new<C: Comm>(n: usize, seed: u64, comm: &C) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        Self::build(order, rng, comm.rank(), comm.size())
    }

    /// Start from an explicit order; later epochs are shuffled from `seed`.
    pub fn from_order(order: Vec<usize>, seed: u64, rank: usize, size: usize) -> Result<Self> {
        Self::build(order, StdRng::seed_from_u64(seed), rank, size)
    }

    fn build(order: Vec<usize>, rng: StdRng, rank: usize, size: usize) -> Result<Self> {
        let range = match partition(order.len(), rank, size) {
            Ok(range) => range,
            Err(CommError::PartitionImbalance { range, .. }) => range,
            Err(e) => return Err(e),
        };
        Ok(PartitionedOrder {
            order,
            rng,
            range,
            sequential: false,
            started: false,
            run: Counter::default(),
            epoch: Counter::default(),
            trial: Counter::default(),
        })
    }

    /// Visit positions in index order instead of through the permutation.
    /// The permutation is still shuffled each epoch so the RNG stream stays
    /// identical across ranks.
    pub fn with_sequential(mut self, on: bool) -> Self {
        self.sequential = on;
        self
    }

    pub fn set_sequential(&mut self, on: bool) {
        self.sequential = on;
    }

    pub fn is_sequential(&self) -> bool {
        self.sequential
    }

    /// Reset the epoch and trial counters and record `run`. The next
    /// [`step`](Self::step) lands on the first position of this rank's block.
    pub fn init(&mut self, run: usize) {
        self.run.reset();
        self.run.start_at(run);
        self.epoch.reset();
        self.trial.reset();
        self.started = false;
    }

    /// Advance one trial and return the index it selects, or `None` when
    /// this rank's block is empty.
    pub fn step(&mut self) -> Option<usize> {
        if self.range.is_empty() {
            return None;
        }
        self.run.same();
        self.epoch.same();
        if !self.started {
            self.started = true;
            self.trial.start_at(self.range.start);
        } else if self.trial.cur() + 1 >= self.range.end {
            self.permute();
            self.epoch.incr();
            self.trial.set(self.range.start);
        } else {
            self.trial.incr();
        }
        self.current()
    }

    /// Index selected by the current trial; `None` before the first step.
    pub fn current(&self) -> Option<usize> {
        if !self.started {
            return None;
        }
        let pos = self.trial.cur();
        if self.sequential {
            Some(pos)
        } else {
            self.order.get(pos).copied()
        }
    }

    /// Shuffle the order in place from the shared RNG stream.
    pub fn permute(&mut self) {
        self.order.shuffle(&mut self.rng);
    }

    /// `(cur, prv, changed)` of the counter at `scale`.
    pub fn counter(&self, scale: TimeScale) -> (usize, Option<usize>, bool) {
        match scale {
            TimeScale::Run => self.run.query(),
            TimeScale::Epoch => self.epoch.query(),
            TimeScale::Trial => self.trial.query(),
        }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// This rank's block of positions in the order.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }
}
