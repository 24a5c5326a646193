//! Runtime options for communicators and rank-gated output.
//!
//! This module provides the `CommOptions` struct, which selects the backend
//! mode and holds the two toggles that used to be ambient globals: whether
//! communicator errors are logged as they are returned, and whether
//! rank-gated printing happens on every rank. Options are built in code or
//! read from `PROCOMM_*` environment variables.

use std::fmt;
use std::str::FromStr;

use crate::error::{CommError, Result};

const ENV_MODE: &str = "PROCOMM_MODE";
const ENV_LOG_ERRORS: &str = "PROCOMM_LOG_ERRORS";
const ENV_PRINT_ALL: &str = "PROCOMM_PRINT_ALL";

/// Which communicator backend the environment hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Delegate to the message-passing transport (requires the `mpi` feature).
    Active,
    /// Single process of rank 0; every collective is a local copy.
    StandIn,
}

impl Default for Mode {
    fn default() -> Self {
        if cfg!(feature = "mpi") {
            Mode::Active
        } else {
            Mode::StandIn
        }
    }
}

impl FromStr for Mode {
    type Err = CommError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "mpi" => Ok(Mode::Active),
            "stand-in" | "standin" | "stand_in" | "serial" => Ok(Mode::StandIn),
            _ => Err(CommError::InvalidOption {
                key: ENV_MODE,
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Active => f.write_str("active"),
            Mode::StandIn => f.write_str("stand-in"),
        }
    }
}

/// Communicator and output options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommOptions {
    /// Backend selected at process start.
    pub mode: Mode,

    /// Log every error a communicator verb returns (default `true`).
    pub log_errors: bool,

    /// Print on every rank, prefixed with the rank, instead of rank 0 only
    /// (default `false`).
    pub print_all_ranks: bool,
}

impl Default for CommOptions {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            log_errors: true,
            print_all_ranks: false,
        }
    }
}

impl CommOptions {
    pub fn stand_in() -> Self {
        Self {
            mode: Mode::StandIn,
            ..Self::default()
        }
    }

    pub fn with_log_errors(mut self, on: bool) -> Self {
        self.log_errors = on;
        self
    }

    pub fn with_print_all_ranks(mut self, on: bool) -> Self {
        self.print_all_ranks = on;
        self
    }

    /// Read options from the process environment, falling back to defaults
    /// for unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build options from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();
        if let Some(v) = lookup(ENV_MODE) {
            opts.mode = v.parse()?;
        }
        if let Some(v) = lookup(ENV_LOG_ERRORS) {
            opts.log_errors = parse_flag(ENV_LOG_ERRORS, &v)?;
        }
        if let Some(v) = lookup(ENV_PRINT_ALL) {
            opts.print_all_ranks = parse_flag(ENV_PRINT_ALL, &v)?;
        }
        tracing::debug!(
            mode = %opts.mode,
            log_errors = opts.log_errors,
            print_all_ranks = opts.print_all_ranks,
            "communicator options loaded"
        );
        Ok(opts)
    }

    /// Pass `err` through, logging it first when `log_errors` is on.
    pub(crate) fn report(&self, err: CommError) -> CommError {
        if self.log_errors {
            tracing::error!(error = %err, "communicator call failed");
        }
        err
    }

    pub(crate) fn check<T>(&self, res: Result<T>) -> Result<T> {
        res.map_err(|e| self.report(e))
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(CommError::InvalidOption {
            key,
            value: value.to_string(),
        }),
    }
}
