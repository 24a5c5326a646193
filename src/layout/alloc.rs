//! Even partitioning of an index space across ranks.

use std::ops::Range;

use crate::error::{CommError, Result};
use crate::parallel::Comm;

/// This rank's contiguous block when `n` items are split into `size` equal
/// blocks.
///
/// `n` must be a multiple of `size`. Otherwise the imbalance is logged and
/// returned as [`CommError::PartitionImbalance`], whose `range` is the
/// floor-divided block (`n / size` items per rank, trailing items uncovered).
/// Callers decide whether that is fatal.
pub fn partition(n: usize, rank: usize, size: usize) -> Result<Range<usize>> {
    if size == 0 || rank >= size {
        return Err(CommError::InvalidRank {
            op: "partition",
            rank,
            size,
        });
    }
    let per = n / size;
    let start = per * rank;
    let range = start..start + per;
    if n % size != 0 {
        tracing::warn!(n, size, "number of items is not an even multiple of number of procs");
        return Err(CommError::PartitionImbalance { n, size, range });
    }
    Ok(range)
}

/// [`partition`] using the rank and size of `comm`.
pub fn allocate_range<C: Comm>(comm: &C, n: usize) -> Result<Range<usize>> {
    partition(n, comm.rank(), comm.size())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split_covers_everything() {
        for size in 1..=6 {
            let n = size * 5;
            let mut next = 0;
            for rank in 0..size {
                let r = partition(n, rank, size).unwrap();
                assert_eq!(r.start, next);
                assert_eq!(r.len(), 5);
                next = r.end;
            }
            assert_eq!(next, n);
        }
    }

    #[test]
    fn imbalance_reports_floor_range() {
        let e0 = partition(7, 0, 2).unwrap_err();
        let e1 = partition(7, 1, 2).unwrap_err();
        assert_eq!(e0.fallback_range(), Some(0..3));
        assert_eq!(e1.fallback_range(), Some(3..6));
        assert!(matches!(e1, CommError::PartitionImbalance { n: 7, size: 2, .. }));
    }

    #[test]
    fn fewer_items_than_ranks() {
        let err = partition(3, 2, 4).unwrap_err();
        assert_eq!(err.fallback_range(), Some(0..0));
    }

    #[test]
    fn zero_items() {
        assert_eq!(partition(0, 1, 2).unwrap(), 0..0);
    }

    #[test]
    fn rank_out_of_range() {
        assert!(matches!(partition(4, 2, 2), Err(CommError::InvalidRank { .. })));
        assert!(matches!(partition(4, 0, 0), Err(CommError::InvalidRank { .. })));
    }
}
