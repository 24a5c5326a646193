//! `Environment` owns the transport for the life of the process (Active
//! mode) or stands in for it (Stand-in mode). Communicators obtained from it
//! are [`UniverseComm`]s, so callers are written once against [`Comm`] and
//! run under either mode.
//!
//! In Active mode the transport is finalized once the environment has been
//! dropped or [`finalize`](Environment::finalize)d and every communicator
//! obtained from it has been dropped too. It cannot be initialized again
//! afterwards.

#[cfg(feature = "mpi")]
use std::sync::Arc;

use crate::config::{CommOptions, Mode};
use crate::error::{CommError, Result};
use crate::output::Printer;
use crate::parallel::{Comm, SerialComm, UniverseComm};

#[cfg(feature = "mpi")]
use crate::parallel::MpiComm;

pub struct Environment {
    opts: CommOptions,
    #[cfg(feature = "mpi")]
    universe: Option<Arc<mpi::environment::Universe>>,
}

impl Environment {
    /// Start the backend selected by `opts.mode`.
    ///
    /// Fails with [`CommError::TransportUnavailable`] when Active mode is
    /// requested from a build without the `mpi` feature, and with
    /// [`CommError::AlreadyInitialized`] when the transport was already
    /// started in this process.
    pub fn init(opts: CommOptions) -> Result<Self> {
        tracing::debug!(mode = %opts.mode, "initializing communication environment");
        match opts.mode {
            Mode::StandIn => Ok(Self::stand_in(opts)),
            Mode::Active => Self::active(opts, false),
        }
    }

    /// Like [`init`](Self::init), but requests full multi-threaded transport
    /// support so verbs may be called from any thread. A transport that
    /// grants less is logged and used anyway.
    pub fn init_thread_safe(opts: CommOptions) -> Result<Self> {
        tracing::debug!(mode = %opts.mode, "initializing thread-safe communication environment");
        match opts.mode {
            Mode::StandIn => Ok(Self::stand_in(opts)),
            Mode::Active => Self::active(opts, true),
        }
    }

    /// [`init`](Self::init) with options read from `PROCOMM_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::init(CommOptions::from_env()?)
    }

    fn stand_in(opts: CommOptions) -> Self {
        Environment {
            opts,
            #[cfg(feature = "mpi")]
            universe: None,
        }
    }

    #[cfg(feature = "mpi")]
    fn active(opts: CommOptions, thread_safe: bool) -> Result<Self> {
        use mpi::Threading;

        let started = if thread_safe {
            mpi::initialize_with_threading(Threading::Multiple).map(|(universe, provided)| {
                if provided < Threading::Multiple {
                    tracing::warn!(?provided, "transport does not support multi-threaded calls");
                }
                universe
            })
        } else {
            mpi::initialize()
        };
        let Some(universe) = started else {
            return Err(opts.report(CommError::AlreadyInitialized));
        };
        let universe = Arc::new(universe);
        let world = MpiComm::new(universe.world(), opts.clone(), Arc::clone(&universe))?;
        tracing::debug!(rank = world.rank(), size = world.size(), "transport initialized");
        Ok(Environment {
            opts,
            universe: Some(universe),
        })
    }

    #[cfg(not(feature = "mpi"))]
    fn active(opts: CommOptions, _thread_safe: bool) -> Result<Self> {
        Err(opts.report(CommError::TransportUnavailable))
    }

    /// Whether the message-passing transport is running in this process.
    /// Always `false` in builds without the `mpi` feature.
    pub fn is_initialized() -> bool {
        #[cfg(feature = "mpi")]
        {
            mpi::environment::is_initialized()
        }
        #[cfg(not(feature = "mpi"))]
        {
            false
        }
    }

    pub fn mode(&self) -> Mode {
        self.opts.mode
    }

    pub fn options(&self) -> &CommOptions {
        &self.opts
    }

    /// Communicator over every process.
    pub fn world(&self) -> UniverseComm {
        #[cfg(feature = "mpi")]
        if let Some(universe) = &self.universe {
            let world = MpiComm::attach(universe.world(), self.opts.clone(), Arc::clone(universe));
            return UniverseComm::Mpi(world);
        }
        UniverseComm::Serial(SerialComm::new(self.opts.clone()))
    }

    /// Communicator over the given world ranks; empty means all of them.
    pub fn new_comm(&self, ranks: &[usize]) -> Result<UniverseComm> {
        self.world().new_comm(ranks)
    }

    pub fn world_rank(&self) -> usize {
        self.world().rank()
    }

    pub fn world_size(&self) -> usize {
        self.world().size()
    }

    /// Standard-output printer for this world rank.
    pub fn printer(&self) -> Printer {
        Printer::for_comm(&self.world(), &self.opts)
    }

    /// Shut the backend down. In Active mode the transport is finalized as
    /// soon as no communicator from this environment is alive.
    pub fn finalize(self) {
        tracing::debug!(mode = %self.opts.mode, "finalizing communication environment");
    }
}
