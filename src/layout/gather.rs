//! Row-tiled all-gather of tensors and tables.
//!
//! Every rank contributes the same number of rows. After the call each rank
//! holds `size * rows` rows, tiled in rank order: rank 0's rows first, then
//! rank 1's, and so on.

use crate::error::{CommError, Result};
use crate::parallel::Comm;

use super::tensor::{ColumnKind, Table, Tensor, TensorData};

/// All-gather the rows of `src` into `dest` on every rank.
///
/// `dest` must already hold the same value kind as `src`; its cell shape is
/// taken from `src` and its row count becomes `size * src.rows()`. String
/// tensors are exchanged in two phases (lengths, then padded bytes). Boolean
/// tensors are rejected before anything is sent.
pub fn gather_tensor_rows<C: Comm>(dest: &mut Tensor, src: &Tensor, comm: &C) -> Result<()> {
    check_gatherable(dest.kind(), src.kind())?;
    dest.conform_to(src, comm.size() * src.rows());
    match (dest.data_mut(), src.data()) {
        (TensorData::I8(d), TensorData::I8(s)) => comm.all_gather(d, s),
        (TensorData::I16(d), TensorData::I16(s)) => comm.all_gather(d, s),
        (TensorData::I32(d), TensorData::I32(s)) => comm.all_gather(d, s),
        (TensorData::I64(d), TensorData::I64(s)) => comm.all_gather(d, s),
        (TensorData::U8(d), TensorData::U8(s)) => comm.all_gather(d, s),
        (TensorData::U16(d), TensorData::U16(s)) => comm.all_gather(d, s),
        (TensorData::U32(d), TensorData::U32(s)) => comm.all_gather(d, s),
        (TensorData::U64(d), TensorData::U64(s)) => comm.all_gather(d, s),
        (TensorData::F32(d), TensorData::F32(s)) => comm.all_gather(d, s),
        (TensorData::F64(d), TensorData::F64(s)) => comm.all_gather(d, s),
        (TensorData::C128(d), TensorData::C128(s)) => comm.all_gather(d, s),
        (TensorData::Str(d), TensorData::Str(s)) => gather_strings(d, s, comm),
        (d, s) => Err(CommError::Internal(format!(
            "unmatched tensor kinds {} and {}",
            d.kind(),
            s.kind()
        ))),
    }
}

/// All-gather every column of `src` into `dest`.
///
/// If `dest` has a different number of columns it is rebuilt from `src`'s
/// schema first. A `src` with a boolean column is rejected before `dest` is
/// touched, and column kinds are validated for the whole table before any
/// column is exchanged, so a rejected table leaves nothing half-sent.
pub fn gather_table_rows<C: Comm>(dest: &mut Table, src: &Table, comm: &C) -> Result<()> {
    if src.columns().iter().any(|c| c.tensor.kind() == ColumnKind::Bool) {
        return Err(CommError::UnsupportedKind("bool"));
    }
    let rows = comm.size() * src.rows();
    if dest.num_columns() != src.num_columns() {
        *dest = Table::from_schema(&src.schema(), rows);
    }
    for (d, s) in dest.columns().iter().zip(src.columns()) {
        check_gatherable(d.tensor.kind(), s.tensor.kind())
            .map_err(|e| match e {
                CommError::Schema(msg) => CommError::Schema(format!("column {}: {msg}", s.name)),
                other => other,
            })?;
    }
    for (d, s) in dest.columns_mut().iter_mut().zip(src.columns()) {
        gather_tensor_rows(&mut d.tensor, &s.tensor, comm)?;
    }
    dest.set_rows(rows);
    Ok(())
}

fn check_gatherable(dest: ColumnKind, src: ColumnKind) -> Result<()> {
    if src == ColumnKind::Bool {
        return Err(CommError::UnsupportedKind("bool"));
    }
    if dest != src {
        return Err(CommError::Schema(format!(
            "destination holds {dest}, source holds {src}"
        )));
    }
    Ok(())
}

fn gather_strings<C: Comm>(dest: &mut [String], src: &[String], comm: &C) -> Result<()> {
    let lens: Vec<u64> = src.iter().map(|s| s.len() as u64).collect();
    let mut all_lens = vec![0u64; dest.len()];
    comm.all_gather(&mut all_lens, &lens)?;

    let width = all_lens.iter().copied().max().unwrap_or(0) as usize;
    if width == 0 {
        dest.iter_mut().for_each(String::clear);
        return Ok(());
    }

    let mut padded = vec![0u8; src.len() * width];
    for (slot, s) in padded.chunks_mut(width).zip(src) {
        slot[..s.len()].copy_from_slice(s.as_bytes());
    }
    let mut all_bytes = vec![0u8; dest.len() * width];
    comm.all_gather(&mut all_bytes, &padded)?;

    for ((d, slot), &len) in dest.iter_mut().zip(all_bytes.chunks(width)).zip(&all_lens) {
        *d = String::from_utf8(slot[..len as usize].to_vec())
            .map_err(|e| CommError::Internal(format!("gathered string is not utf-8: {e}")))?;
    }
    Ok(())
}
