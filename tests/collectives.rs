//! Multi-rank collective semantics, exercised on an in-process thread cluster.
//!
//! Each test runs one closure per rank and checks what every rank ends up
//! holding: reductions over every op and element kind, rank-ordered
//! concatenation for gathers, scatter chunking, rooted-call behaviour on
//! non-root ranks, point-to-point pairing, and subset communicators.

use approx::assert_relative_eq;
use num_complex::Complex64;
use procomm::parallel::{Comm, Op, ThreadComm};
use procomm::{CommError, CommOptions};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const RANKS: usize = 4;

fn quiet() -> CommOptions {
    CommOptions::default().with_log_errors(false)
}

/// Reduce `[rank + 1, 1]` over four ranks with every op and check the result
/// on every rank.
macro_rules! all_reduce_kind {
    ($name:ident, $ty:ty) => {
        #[test]
        fn $name() {
            let conv = |v: u8| -> $ty { <$ty>::from(v) };
            for op in Op::ALL {
                let out = ThreadComm::run(RANKS, |comm| {
                    let src = [conv(comm.rank() as u8 + 1), conv(1)];
                    let mut dest = [<$ty>::default(); 2];
                    comm.all_reduce(op, &mut dest, &src).unwrap();
                    dest
                });
                let expected = match op {
                    Op::Sum => [conv(10), conv(4)],
                    Op::Product => [conv(24), conv(1)],
                    Op::Min => [conv(1), conv(1)],
                    Op::Max => [conv(4), conv(1)],
                };
                for dest in out {
                    assert_eq!(dest, expected, "{op:?}");
                }
            }
        }
    };
}

all_reduce_kind!(all_reduce_i16, i16);
all_reduce_kind!(all_reduce_i32, i32);
all_reduce_kind!(all_reduce_i64, i64);
all_reduce_kind!(all_reduce_u8, u8);
all_reduce_kind!(all_reduce_u16, u16);
all_reduce_kind!(all_reduce_u32, u32);
all_reduce_kind!(all_reduce_u64, u64);
all_reduce_kind!(all_reduce_f32, f32);
all_reduce_kind!(all_reduce_f64, f64);

#[test]
fn all_reduce_i8() {
    for op in Op::ALL {
        let out = ThreadComm::run(RANKS, |comm| {
            let mut dest = [0i8];
            comm.all_reduce(op, &mut dest, &[comm.rank() as i8 - 2]).unwrap();
            dest[0]
        });
        let expected = match op {
            Op::Sum => -2,
            Op::Product => 0,
            Op::Min => -2,
            Op::Max => 1,
        };
        assert!(out.iter().all(|&v| v == expected), "{op:?}: {out:?}");
    }
}

/// Sum of random per-rank vectors matches a local recomputation.
#[test]
fn all_reduce_random_f64_sum() {
    let len = 64;
    let contribution = |rank: usize| -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(rank as u64);
        (0..len).map(|_| rng.r#gen::<f64>() - 0.5).collect()
    };
    let out = ThreadComm::run(RANKS, |comm| {
        let src = contribution(comm.rank());
        let mut dest = vec![0.0; len];
        comm.all_reduce(Op::Sum, &mut dest, &src).unwrap();
        dest
    });
    let parts: Vec<Vec<f64>> = (0..RANKS).map(contribution).collect();
    for dest in &out {
        for i in 0..len {
            let expected: f64 = parts.iter().map(|p| p[i]).sum();
            assert_relative_eq!(dest[i], expected, epsilon = 1e-12);
        }
    }
}

#[test]
fn complex_sum_and_product() {
    let out = ThreadComm::run(RANKS, |comm| {
        let z = Complex64::new(0.0, 1.0);
        let s = comm.all_reduce_scalar(Op::Sum, z).unwrap();
        let p = comm.all_reduce_scalar(Op::Product, z).unwrap();
        (s, p)
    });
    for (s, p) in out {
        assert_relative_eq!(s.im, 4.0);
        // i^4 == 1
        assert_relative_eq!(p.re, 1.0);
        assert_relative_eq!(p.im, 0.0);
    }
}

#[test]
fn complex_ordering_rejected_on_every_rank() {
    let out = ThreadComm::run_with(RANKS, quiet(), |comm| {
        comm.all_reduce_scalar(Op::Max, Complex64::new(1.0, 0.0))
    });
    assert!(out.iter().all(|r| matches!(r, Err(CommError::UnsupportedOp { op: Op::Max, .. }))));
}

#[test]
fn all_gather_tiles_in_rank_order() {
    let out = ThreadComm::run(RANKS, |comm| {
        let r = comm.rank() as u32;
        let src = [r * 100, r * 100 + 1, r * 100 + 2];
        let mut dest = [0u32; 3 * RANKS];
        comm.all_gather(&mut dest, &src).unwrap();
        dest
    });
    for dest in out {
        for r in 0..RANKS {
            let seg = &dest[r * 3..r * 3 + 3];
            let base = r as u32 * 100;
            assert_eq!(seg, &[base, base + 1, base + 2]);
        }
    }
}

#[test]
fn gather_fills_root_only() {
    let root = 2;
    let out = ThreadComm::run(RANKS, |comm| {
        let mut dest = [-1i64; RANKS];
        comm.gather(root, &mut dest, &[comm.rank() as i64]).unwrap();
        dest
    });
    for (rank, dest) in out.iter().enumerate() {
        if rank == root {
            assert_eq!(dest, &[0, 1, 2, 3]);
        } else {
            assert_eq!(dest, &[-1; RANKS]);
        }
    }
}

#[test]
fn scatter_hands_out_chunks() {
    let out = ThreadComm::run(RANKS, |comm| {
        let src: Vec<u16> = if comm.rank() == 1 { (0..8).collect() } else { Vec::new() };
        let mut dest = [0u16; 2];
        comm.scatter(1, &mut dest, &src).unwrap();
        dest
    });
    assert_eq!(out, vec![[0, 1], [2, 3], [4, 5], [6, 7]]);
}

#[test]
fn reduce_leaves_non_root_dest_alone() {
    let out = ThreadComm::run(RANKS, |comm| {
        let mut dest = [f32::NAN];
        comm.reduce(3, Op::Max, &mut dest, &[comm.rank() as f32 * 1.5]).unwrap();
        dest[0]
    });
    assert_relative_eq!(out[3], 4.5);
    assert!(out[..3].iter().all(|v| v.is_nan()));
}

#[test]
fn bcast_overwrites_everyone() {
    let out = ThreadComm::run(RANKS, |comm| {
        let mut buf = [comm.rank() as i16; 3];
        comm.bcast(0, &mut buf).unwrap();
        buf
    });
    assert!(out.iter().all(|b| *b == [0, 0, 0]));
}

#[test]
fn bcast_rank_out_of_range() {
    let out = ThreadComm::run_with(2, quiet(), |comm| comm.bcast(5, &mut [0u8]));
    assert!(out.iter().all(|r| matches!(r, Err(CommError::InvalidRank { rank: 5, size: 2, .. }))));
}

/// Pairs exchange on distinct tags, so delivery is matched by tag not order.
#[test]
fn tagged_pairs() {
    let out = ThreadComm::run(2, |comm| {
        let peer = 1 - comm.rank();
        comm.send(peer, 1, &[comm.rank() as u64 + 10]).unwrap();
        comm.send(peer, 2, &[comm.rank() as u64 + 20]).unwrap();
        let (mut a, mut b) = ([0u64], [0u64]);
        comm.recv(peer, 2, &mut b).unwrap();
        comm.recv(peer, 1, &mut a).unwrap();
        (a[0], b[0])
    });
    assert_eq!(out, vec![(11, 21), (10, 20)]);
}

#[test]
fn subset_collectives_are_independent() {
    let out = ThreadComm::run_with(RANKS, quiet(), |comm| {
        let evens = comm.new_comm(&[0, 2]);
        let odds = comm.new_comm(&[1, 3]);
        let sub = match (evens, odds) {
            (Ok(sub), Err(CommError::NotAMember(_)))
            | (Err(CommError::NotAMember(_)), Ok(sub)) => sub,
            _ => panic!("rank {} should belong to exactly one subset", comm.rank()),
        };
        let mut dest = [0u8; 2];
        sub.all_gather(&mut dest, &[comm.rank() as u8]).unwrap();
        (sub.rank(), sub.size(), dest)
    });
    assert_eq!(
        out,
        vec![(0, 2, [0, 2]), (0, 2, [1, 3]), (1, 2, [0, 2]), (1, 2, [1, 3])]
    );
}

#[test]
fn whole_group_copy() {
    let out = ThreadComm::run(3, |comm| {
        let dup = comm.new_comm(&[]).unwrap();
        (dup.rank(), dup.size(), dup.all_reduce_scalar(Op::Sum, 1u8).unwrap())
    });
    assert_eq!(out, vec![(0, 3, 3), (1, 3, 3), (2, 3, 3)]);
}
