//! `Printer` writes on rank 0 only, or on every rank with a `P<rank>: `
//! prefix when `print_all_ranks` is set. The `all_*` methods ignore the
//! toggle and always write, always prefixed.

use std::fmt;
use std::io::{self, Write};

use crate::config::CommOptions;
use crate::parallel::Comm;

pub struct Printer {
    rank: usize,
    print_all: bool,
    out: Box<dyn Write + Send>,
}

impl Printer {
    /// Printer on standard output.
    pub fn stdout(rank: usize, print_all: bool) -> Self {
        Self::with_writer(rank, print_all, io::stdout())
    }

    pub fn with_writer<W: Write + Send + 'static>(rank: usize, print_all: bool, out: W) -> Self {
        Printer {
            rank,
            print_all,
            out: Box::new(out),
        }
    }

    /// Standard-output printer for this rank of `comm`.
    pub fn for_comm<C: Comm>(comm: &C, opts: &CommOptions) -> Self {
        Self::stdout(comm.rank(), opts.print_all_ranks)
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn print_all(&self) -> bool {
        self.print_all
    }

    /// Print on rank 0; with `print_all` on, print on every rank with a
    /// rank prefix.
    pub fn print(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        if !self.print_all {
            if self.rank != 0 {
                return Ok(());
            }
            return self.out.write_fmt(args);
        }
        self.all_print(args)
    }

    pub fn println(&mut self, msg: impl fmt::Display) -> io::Result<()> {
        self.print(format_args!("{msg}\n"))
    }

    /// Print on every rank, prefixed with the rank.
    pub fn all_print(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        write!(self.out, "P{}: {}", self.rank, args)
    }

    pub fn all_println(&mut self, msg: impl fmt::Display) -> io::Result<()> {
        self.all_print(format_args!("{msg}\n"))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl fmt::Debug for Printer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Printer")
            .field("rank", &self.rank)
            .field("print_all", &self.print_all)
            .finish_non_exhaustive()
    }
}
