//! Gather a small per-rank table onto every rank and walk a partitioned
//! permutation.
//!
//! Stand-in (single process):
//!     cargo run --example gather_demo
//! Under MPI:
//!     cargo build --features mpi --example gather_demo
//!     mpirun -n 4 target/debug/examples/gather_demo

use procomm::layout::{Table, Tensor, TensorData};
use procomm::parallel::{Comm, Op};
use procomm::{Environment, PartitionedOrder, Result, gather_table_rows, rprintln};

fn main() -> Result<()> {
    let env = Environment::from_env()?;
    let world = env.world();
    let mut out = env.printer();
    let (rank, size) = (world.rank(), world.size());

    let rows = 2;
    let mut local = Table::new();
    local.add_column(
        "Name",
        Tensor::column(TensorData::Str((0..rows).map(|i| format!("p{rank}.{i}")).collect())),
    )?;
    local.add_column(
        "Score",
        Tensor::column(TensorData::F64((0..rows).map(|i| (rank * rows + i) as f64).collect())),
    )?;

    let mut all = Table::new();
    gather_table_rows(&mut all, &local, &world)?;
    let total = world.all_reduce_scalar(Op::Sum, rank as u64)?;
    let _ = rprintln!(out, "{size} ranks, {} gathered rows, rank sum {total}", all.rows());
    if let (Some(TensorData::Str(names)), Some(TensorData::F64(scores))) = (
        all.column("Name").map(Tensor::data),
        all.column("Score").map(Tensor::data),
    ) {
        for (name, score) in names.iter().zip(scores) {
            let _ = rprintln!(out, "  {name:<8} {score:>5.1}");
        }
    }

    let mut order = PartitionedOrder::new(4 * size, 1, &world)?;
    let visited: Vec<usize> = (0..4).filter_map(|_| order.step()).collect();
    let _ = out.all_println(format_args!("visits {visited:?}"));

    world.barrier()?;
    env.finalize();
    Ok(())
}
