//! Rank-gated console output.

pub mod printer;
pub use printer::Printer;

/// Formatted print through a [`Printer`], rank 0 only unless all-rank
/// printing is on.
#[macro_export]
macro_rules! rprint {
    ($printer:expr, $($arg:tt)*) => {
        $printer.print(format_args!($($arg)*))
    };
}

/// Like [`rprint!`] with a trailing newline.
#[macro_export]
macro_rules! rprintln {
    ($printer:expr) => {
        $printer.println("")
    };
    ($printer:expr, $($arg:tt)*) => {
        $printer.println(format_args!($($arg)*))
    };
}
