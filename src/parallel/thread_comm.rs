//! In-process multi-rank communicator.
//!
//! `ThreadComm` runs each rank on its own thread inside one process, so code
//! written against [`Comm`] can be exercised with several ranks without a
//! launcher or a transport. Collectives rendezvous through shared slots:
//! every member deposits its contribution, waits on a barrier, reads what it
//! needs, and waits again before the slots are reused. Point-to-point sends
//! are buffered in a mailbox keyed by `(from, to, tag)`; receives block until
//! a matching message arrives.
//!
//! A rank that panics marks its cluster failed. Every peer blocked in a
//! verb, in any group of that cluster, wakes with [`CommError::PeerFailed`],
//! and [`ThreadComm::run`] re-raises the original panic after all threads
//! have finished.
//!
//! # Example
//!
//! ```
//! use procomm::parallel::{Comm, Op, ThreadComm};
//!
//! let sums = ThreadComm::run(4, |comm| {
//!     comm.all_reduce_scalar(Op::Sum, comm.rank() as i64).unwrap()
//! });
//! assert_eq!(sums, vec![6, 6, 6, 6]);
//! ```

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};

use super::element::fold;
use super::{Comm, Element, Op, check_len, check_members, check_op, check_rank};
use crate::config::CommOptions;
use crate::error::{CommError, Result};

type Payload = Box<dyn Any + Send>;
type MailKey = (usize, usize, i32);

/// State shared by every group spawned from one [`ThreadComm::run`].
///
/// When a rank panics the cluster is marked failed and every waiter in every
/// group is woken, so blocked peers return [`CommError::PeerFailed`] instead
/// of waiting forever.
struct Cluster {
    failed: AtomicBool,
    first_failure: Mutex<Option<usize>>,
    groups: Mutex<Vec<Weak<Shared>>>,
}

impl Cluster {
    fn new() -> Self {
        Cluster {
            failed: AtomicBool::new(false),
            first_failure: Mutex::new(None),
            groups: Mutex::new(Vec::new()),
        }
    }

    fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    fn fail(&self, rank: usize) {
        lock(&self.first_failure).get_or_insert(rank);
        self.failed.store(true, Ordering::SeqCst);
        let groups: Vec<Arc<Shared>> =
            lock(&self.groups).iter().filter_map(Weak::upgrade).collect();
        for group in groups {
            group.wake_all();
        }
    }
}

#[derive(Default)]
struct Gate {
    waiting: usize,
    generation: u64,
}

struct Shared {
    size: usize,
    cluster: Arc<Cluster>,
    gate: Mutex<Gate>,
    released: Condvar,
    slots: Mutex<Vec<Option<Payload>>>,
    mailbox: Mutex<HashMap<MailKey, VecDeque<Payload>>>,
    delivered: Condvar,
    subgroups: Mutex<HashMap<Vec<usize>, Arc<Shared>>>,
}

impl Shared {
    fn new(size: usize, cluster: &Arc<Cluster>) -> Arc<Self> {
        let shared = Arc::new(Shared {
            size,
            cluster: Arc::clone(cluster),
            gate: Mutex::new(Gate::default()),
            released: Condvar::new(),
            slots: Mutex::new((0..size).map(|_| None).collect()),
            mailbox: Mutex::new(HashMap::new()),
            delivered: Condvar::new(),
            subgroups: Mutex::new(HashMap::new()),
        });
        lock(&cluster.groups).push(Arc::downgrade(&shared));
        shared
    }

    /// Generation barrier that gives up once the cluster has failed.
    fn wait(&self, op: &'static str) -> Result<()> {
        let mut gate = lock(&self.gate);
        if self.cluster.is_failed() {
            return Err(CommError::PeerFailed { op });
        }
        let generation = gate.generation;
        gate.waiting += 1;
        if gate.waiting == self.size {
            gate.waiting = 0;
            gate.generation += 1;
            self.released.notify_all();
            return Ok(());
        }
        while gate.generation == generation {
            if self.cluster.is_failed() {
                return Err(CommError::PeerFailed { op });
            }
            gate = self.released.wait(gate).unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }

    // Taking each lock before notifying means a waiter that saw the flag
    // unset is already parked and receives the wakeup.
    fn wake_all(&self) {
        drop(lock(&self.gate));
        self.released.notify_all();
        drop(lock(&self.mailbox));
        self.delivered.notify_all();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One rank of an in-process thread cluster.
pub struct ThreadComm {
    shared: Arc<Shared>,
    rank: usize,
    opts: CommOptions,
}

impl ThreadComm {
    /// Run `f` once per rank on `size` threads and collect the results in
    /// rank order.
    ///
    /// If any rank panics, peers blocked in (or later entering) a verb get
    /// [`CommError::PeerFailed`], and once every thread has finished the
    /// first rank's panic is resumed on the calling thread.
    pub fn run<F, R>(size: usize, f: F) -> Vec<R>
    where
        F: Fn(ThreadComm) -> R + Sync,
        R: Send,
    {
        Self::run_with(size, CommOptions::default(), f)
    }

    pub fn run_with<F, R>(size: usize, opts: CommOptions, f: F) -> Vec<R>
    where
        F: Fn(ThreadComm) -> R + Sync,
        R: Send,
    {
        if size == 0 {
            return Vec::new();
        }
        let cluster = Arc::new(Cluster::new());
        let shared = Shared::new(size, &cluster);
        let outcomes: Vec<std::thread::Result<R>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let comm = ThreadComm {
                        shared: Arc::clone(&shared),
                        rank,
                        opts: opts.clone(),
                    };
                    let (f, cluster) = (&f, &cluster);
                    s.spawn(move || {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(comm)));
                        if outcome.is_err() {
                            cluster.fail(rank);
                        }
                        outcome
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                .collect()
        });
        let first = *lock(&cluster.first_failure);
        let mut results = Vec::with_capacity(size);
        let mut first_panic = None;
        for (rank, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(r) => results.push(r),
                Err(payload) if Some(rank) == first => first_panic = Some(payload),
                Err(_) => {}
            }
        }
        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
        results
    }

    /// Deposit `contribution`, wait for every member, then hand all
    /// contributions (indexed by rank) to `read`.
    fn exchange<T, R, F>(&self, op: &'static str, contribution: Vec<T>, read: F) -> Result<R>
    where
        T: Element,
        F: FnOnce(&[&[T]]) -> Result<R>,
    {
        lock(&self.shared.slots)[self.rank] = Some(Box::new(contribution));
        self.shared.wait(op)?;
        let result = {
            let slots = lock(&self.shared.slots);
            let views: Option<Vec<&[T]>> = slots
                .iter()
                .map(|slot| {
                    slot.as_ref()
                        .and_then(|p| p.downcast_ref::<Vec<T>>())
                        .map(Vec::as_slice)
                })
                .collect();
            match views {
                Some(views) => read(&views),
                None => Err(CommError::Internal(format!(
                    "{op}: members disagree on element kind"
                ))),
            }
        };
        self.shared.wait(op)?;
        lock(&self.shared.slots)[self.rank] = None;
        result
    }

    fn reduce_views<T: Element>(
        op: &'static str,
        reduction: Op,
        views: &[&[T]],
        dest: &mut [T],
    ) -> Result<()> {
        let n = views[0].len();
        if let Some(bad) = views.iter().find(|v| v.len() != n) {
            return Err(CommError::BufferSize {
                op,
                expected: n,
                actual: bad.len(),
            });
        }
        check_len(op, n, dest.len())?;
        for (i, d) in dest.iter_mut().enumerate() {
            *d = fold(reduction, views.iter().map(|v| v[i])).ok_or(CommError::UnsupportedOp {
                op: reduction,
                kind: T::KIND,
            })?;
        }
        Ok(())
    }

    fn concat_views<T: Element>(op: &'static str, views: &[&[T]], dest: &mut [T]) -> Result<()> {
        let n = views[0].len();
        if let Some(bad) = views.iter().find(|v| v.len() != n) {
            return Err(CommError::BufferSize {
                op,
                expected: n,
                actual: bad.len(),
            });
        }
        check_len(op, views.len() * n, dest.len())?;
        for (chunk, v) in dest.chunks_mut(n.max(1)).zip(views) {
            chunk.copy_from_slice(v);
        }
        Ok(())
    }
}

impl Comm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> Result<()> {
        let res = self.shared.wait("barrier");
        self.opts.check(res)
    }

    fn abort(&self) -> Result<()> {
        tracing::error!(rank = self.rank, "abort requested, terminating process");
        std::process::abort()
    }

    fn send<T: Element>(&self, to: usize, tag: i32, values: &[T]) -> Result<()> {
        self.opts.check(check_rank("send", to, self.size()))?;
        lock(&self.shared.mailbox)
            .entry((self.rank, to, tag))
            .or_default()
            .push_back(Box::new(values.to_vec()));
        self.shared.delivered.notify_all();
        Ok(())
    }

    fn recv<T: Element>(&self, from: usize, tag: i32, values: &mut [T]) -> Result<()> {
        self.opts.check(check_rank("recv", from, self.size()))?;
        let key = (from, self.rank, tag);
        let payload = {
            let mut mailbox = lock(&self.shared.mailbox);
            loop {
                if let Some(p) = mailbox.get_mut(&key).and_then(VecDeque::pop_front) {
                    break p;
                }
                if self.shared.cluster.is_failed() {
                    return Err(self.opts.report(CommError::PeerFailed { op: "recv" }));
                }
                mailbox = self
                    .shared
                    .delivered
                    .wait(mailbox)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        let msg = payload.downcast::<Vec<T>>().map_err(|_| {
            self.opts.report(CommError::Internal(format!(
                "recv: message from rank {from} with tag {tag} is not {}",
                T::KIND
            )))
        })?;
        if msg.len() > values.len() {
            return Err(self.opts.report(CommError::BufferSize {
                op: "recv",
                expected: msg.len(),
                actual: values.len(),
            }));
        }
        values[..msg.len()].copy_from_slice(&msg);
        Ok(())
    }

    fn bcast<T: Element>(&self, from: usize, values: &mut [T]) -> Result<()> {
        self.opts.check(check_rank("bcast", from, self.size()))?;
        let mine = if self.rank == from { values.to_vec() } else { Vec::new() };
        let res = self.exchange("bcast", mine, |views| {
            let root = views[from];
            check_len("bcast", root.len(), values.len())?;
            values.copy_from_slice(root);
            Ok(())
        });
        self.opts.check(res)
    }

    fn reduce<T: Element>(&self, to: usize, op: Op, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check(check_rank("reduce", to, self.size()))?;
        self.opts.check(check_op::<T>(op))?;
        let is_root = self.rank == to;
        let res = self.exchange("reduce", src.to_vec(), |views| {
            if is_root {
                Self::reduce_views("reduce", op, views, dest)
            } else {
                Ok(())
            }
        });
        self.opts.check(res)
    }

    fn all_reduce<T: Element>(&self, op: Op, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check(check_op::<T>(op))?;
        let res = self.exchange("all_reduce", src.to_vec(), |views| {
            Self::reduce_views("all_reduce", op, views, dest)
        });
        self.opts.check(res)
    }

    fn gather<T: Element>(&self, to: usize, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check(check_rank("gather", to, self.size()))?;
        let is_root = self.rank == to;
        let res = self.exchange("gather", src.to_vec(), |views| {
            if is_root {
                Self::concat_views("gather", views, dest)
            } else {
                Ok(())
            }
        });
        self.opts.check(res)
    }

    fn all_gather<T: Element>(&self, dest: &mut [T], src: &[T]) -> Result<()> {
        let res = self.exchange("all_gather", src.to_vec(), |views| {
            Self::concat_views("all_gather", views, dest)
        });
        self.opts.check(res)
    }

    fn scatter<T: Element>(&self, from: usize, dest: &mut [T], src: &[T]) -> Result<()> {
        self.opts.check(check_rank("scatter", from, self.size()))?;
        let mine = if self.rank == from { src.to_vec() } else { Vec::new() };
        let (rank, size) = (self.rank, self.size());
        let res = self.exchange("scatter", mine, |views| {
            let root = views[from];
            let n = dest.len();
            check_len("scatter", size * n, root.len())?;
            dest.copy_from_slice(&root[rank * n..(rank + 1) * n]);
            Ok(())
        });
        self.opts.check(res)
    }

    fn new_comm(&self, ranks: &[usize]) -> Result<Self> {
        let members = self.opts.check(check_members(ranks, self.size()))?;
        let Some(pos) = members.iter().position(|&r| r == self.rank) else {
            return Err(self.opts.report(CommError::NotAMember(self.rank)));
        };
        let shared = {
            let mut groups = lock(&self.shared.subgroups);
            let len = members.len();
            Arc::clone(
                groups
                    .entry(members)
                    .or_insert_with(|| Shared::new(len, &self.shared.cluster)),
            )
        };
        Ok(ThreadComm {
            shared,
            rank: pos,
            opts: self.opts.clone(),
        })
    }
}
