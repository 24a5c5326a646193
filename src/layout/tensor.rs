//! Row-major typed tensors and tables.
//!
//! The outermost dimension of a [`Tensor`] is its row count; the remaining
//! dimensions form the cell shape. A [`Table`] is a list of named tensor
//! columns that share a row count.

use std::fmt;

use num_complex::Complex64;

use crate::error::{CommError, Result};
use crate::parallel::ElementKind;

/// Storage for a tensor, one variant per supported value kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    C128(Vec<Complex64>),
    Str(Vec<String>),
}

/// Kind of a tensor's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Bool,
    Str,
    Elem(ElementKind),
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Bool => f.write_str("bool"),
            ColumnKind::Str => f.write_str("string"),
            ColumnKind::Elem(k) => write!(f, "{k}"),
        }
    }
}

macro_rules! with_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            TensorData::Bool($v) => $body,
            TensorData::I8($v) => $body,
            TensorData::I16($v) => $body,
            TensorData::I32($v) => $body,
            TensorData::I64($v) => $body,
            TensorData::U8($v) => $body,
            TensorData::U16($v) => $body,
            TensorData::U32($v) => $body,
            TensorData::U64($v) => $body,
            TensorData::F32($v) => $body,
            TensorData::F64($v) => $body,
            TensorData::C128($v) => $body,
            TensorData::Str($v) => $body,
        }
    };
}

macro_rules! map_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            TensorData::Bool($v) => TensorData::Bool($body),
            TensorData::I8($v) => TensorData::I8($body),
            TensorData::I16($v) => TensorData::I16($body),
            TensorData::I32($v) => TensorData::I32($body),
            TensorData::I64($v) => TensorData::I64($body),
            TensorData::U8($v) => TensorData::U8($body),
            TensorData::U16($v) => TensorData::U16($body),
            TensorData::U32($v) => TensorData::U32($body),
            TensorData::U64($v) => TensorData::U64($body),
            TensorData::F32($v) => TensorData::F32($body),
            TensorData::F64($v) => TensorData::F64($body),
            TensorData::C128($v) => TensorData::C128($body),
            TensorData::Str($v) => TensorData::Str($body),
        }
    };
}

impl TensorData {
    /// `len` default values of `kind`.
    pub fn zeros(kind: ColumnKind, len: usize) -> Self {
        match kind {
            ColumnKind::Bool => TensorData::Bool(vec![false; len]),
            ColumnKind::Str => TensorData::Str(vec![String::new(); len]),
            ColumnKind::Elem(k) => match k {
                ElementKind::I8 => TensorData::I8(vec![0; len]),
                ElementKind::I16 => TensorData::I16(vec![0; len]),
                ElementKind::I32 => TensorData::I32(vec![0; len]),
                ElementKind::I64 => TensorData::I64(vec![0; len]),
                ElementKind::U8 => TensorData::U8(vec![0; len]),
                ElementKind::U16 => TensorData::U16(vec![0; len]),
                ElementKind::U32 => TensorData::U32(vec![0; len]),
                ElementKind::U64 => TensorData::U64(vec![0; len]),
                ElementKind::F32 => TensorData::F32(vec![0.0; len]),
                ElementKind::F64 => TensorData::F64(vec![0.0; len]),
                ElementKind::C128 => TensorData::C128(vec![Complex64::default(); len]),
            },
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            TensorData::Bool(_) => ColumnKind::Bool,
            TensorData::Str(_) => ColumnKind::Str,
            TensorData::I8(_) => ColumnKind::Elem(ElementKind::I8),
            TensorData::I16(_) => ColumnKind::Elem(ElementKind::I16),
            TensorData::I32(_) => ColumnKind::Elem(ElementKind::I32),
            TensorData::I64(_) => ColumnKind::Elem(ElementKind::I64),
            TensorData::U8(_) => ColumnKind::Elem(ElementKind::U8),
            TensorData::U16(_) => ColumnKind::Elem(ElementKind::U16),
            TensorData::U32(_) => ColumnKind::Elem(ElementKind::U32),
            TensorData::U64(_) => ColumnKind::Elem(ElementKind::U64),
            TensorData::F32(_) => ColumnKind::Elem(ElementKind::F32),
            TensorData::F64(_) => ColumnKind::Elem(ElementKind::F64),
            TensorData::C128(_) => ColumnKind::Elem(ElementKind::C128),
        }
    }

    pub fn len(&self) -> usize {
        with_data!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resize(&mut self, len: usize) {
        with_data!(self, v => v.resize(len, Default::default()))
    }
}

/// Row-major tensor; `shape[0]` is the row count.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl Tensor {
    /// Default-filled tensor of the given kind and shape.
    pub fn new(kind: ColumnKind, shape: &[usize]) -> Result<Self> {
        check_shape(shape)?;
        Ok(Tensor {
            shape: shape.to_vec(),
            data: TensorData::zeros(kind, shape.iter().product()),
        })
    }

    pub fn from_data(shape: &[usize], data: TensorData) -> Result<Self> {
        check_shape(shape)?;
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(CommError::Schema(format!(
                "shape {shape:?} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Tensor {
            shape: shape.to_vec(),
            data,
        })
    }

    /// One-dimensional tensor with one value per row.
    pub fn column(data: TensorData) -> Self {
        Tensor {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cell_shape(&self) -> &[usize] {
        &self.shape[1..]
    }

    /// Number of values per row.
    pub fn cell_size(&self) -> usize {
        self.cell_shape().iter().product()
    }

    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut TensorData {
        &mut self.data
    }

    /// Copy of one row as a one-row tensor with the same cell shape.
    pub fn row(&self, row: usize) -> Option<Tensor> {
        if row >= self.rows() {
            return None;
        }
        let cell = self.cell_size();
        let span = row * cell..(row + 1) * cell;
        let mut shape = self.shape.clone();
        shape[0] = 1;
        Some(Tensor {
            shape,
            data: map_data!(&self.data, v => v[span.clone()].to_vec()),
        })
    }

    /// Change the row count, keeping existing rows and default-filling new ones.
    pub fn set_rows(&mut self, rows: usize) {
        self.shape[0] = rows;
        let len = rows * self.cell_size();
        self.data.resize(len);
    }

    /// Take `other`'s cell shape and set the row count to `rows`.
    pub(crate) fn conform_to(&mut self, other: &Tensor, rows: usize) {
        if self.cell_shape() != other.cell_shape() {
            self.shape = std::iter::once(0)
                .chain(other.cell_shape().iter().copied())
                .collect();
            self.data = TensorData::zeros(self.kind(), 0);
        }
        self.set_rows(rows);
    }
}

fn check_shape(shape: &[usize]) -> Result<()> {
    if shape.is_empty() {
        return Err(CommError::Schema("tensor shape needs a row dimension".into()));
    }
    Ok(())
}

/// A named column of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub tensor: Tensor,
}

/// Name, kind, and cell shape of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
    pub cell_shape: Vec<usize>,
}

/// Named tensor columns sharing one row count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty-valued table with the given schema and row count.
    pub fn from_schema(schema: &[ColumnSchema], rows: usize) -> Self {
        let columns = schema
            .iter()
            .map(|c| {
                let shape: Vec<usize> = std::iter::once(rows)
                    .chain(c.cell_shape.iter().copied())
                    .collect();
                let len = shape.iter().product();
                Column {
                    name: c.name.clone(),
                    tensor: Tensor {
                        shape,
                        data: TensorData::zeros(c.kind, len),
                    },
                }
            })
            .collect();
        Table { columns, rows }
    }

    /// Append a column; its row count must match the table's.
    pub fn add_column(&mut self, name: impl Into<String>, tensor: Tensor) -> Result<()> {
        let name = name.into();
        if !self.columns.is_empty() && tensor.rows() != self.rows {
            return Err(CommError::Schema(format!(
                "column {name} has {} rows, table has {}",
                tensor.rows(),
                self.rows
            )));
        }
        if self.columns.iter().any(|c| c.name == name) {
            return Err(CommError::Schema(format!("duplicate column {name}")));
        }
        self.rows = tensor.rows();
        self.columns.push(Column { name, tensor });
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Tensor> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.tensor)
    }

    pub fn schema(&self) -> Vec<ColumnSchema> {
        self.columns
            .iter()
            .map(|c| ColumnSchema {
                name: c.name.clone(),
                kind: c.tensor.kind(),
                cell_shape: c.tensor.cell_shape().to_vec(),
            })
            .collect()
    }

    pub fn set_rows(&mut self, rows: usize) {
        for c in &mut self.columns {
            c.tensor.set_rows(rows);
        }
        self.rows = rows;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_and_cells() {
        let t = Tensor::new(ColumnKind::Elem(ElementKind::F32), &[4, 2, 3]).unwrap();
        assert_eq!(t.rows(), 4);
        assert_eq!(t.cell_shape(), &[2, 3]);
        assert_eq!(t.cell_size(), 6);
        assert_eq!(t.data().len(), 24);
    }

    #[test]
    fn scalar_shape_rejected() {
        assert!(Tensor::new(ColumnKind::Str, &[]).is_err());
    }

    #[test]
    fn from_data_checks_length() {
        let err = Tensor::from_data(&[2, 2], TensorData::I32(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, CommError::Schema(_)));
    }

    #[test]
    fn set_rows_keeps_prefix() {
        let mut t = Tensor::from_data(&[2, 2], TensorData::U16(vec![1, 2, 3, 4])).unwrap();
        t.set_rows(3);
        assert_eq!(t.data(), &TensorData::U16(vec![1, 2, 3, 4, 0, 0]));
        t.set_rows(1);
        assert_eq!(t.data(), &TensorData::U16(vec![1, 2]));
    }

    #[test]
    fn row_copies_one_cell() {
        let t = Tensor::from_data(&[3, 2], TensorData::I16(vec![1, 2, 3, 4, 5, 6])).unwrap();
        let r = t.row(1).unwrap();
        assert_eq!(r.shape(), &[1, 2]);
        assert_eq!(r.data(), &TensorData::I16(vec![3, 4]));
        assert!(t.row(3).is_none());
    }

    #[test]
    fn table_rows_must_agree() {
        let mut t = Table::new();
        t.add_column("a", Tensor::column(TensorData::I64(vec![1, 2]))).unwrap();
        assert!(t.add_column("b", Tensor::column(TensorData::F64(vec![1.0]))).is_err());
        assert!(t.add_column("a", Tensor::column(TensorData::I64(vec![3, 4]))).is_err());
        assert_eq!(t.rows(), 2);
    }

    #[test]
    fn schema_round_trip() {
        let mut t = Table::new();
        t.add_column("name", Tensor::column(TensorData::Str(vec!["x".into(), "y".into()])))
            .unwrap();
        t.add_column(
            "input",
            Tensor::from_data(&[2, 3], TensorData::F32(vec![0.0; 6])).unwrap(),
        )
        .unwrap();
        let fresh = Table::from_schema(&t.schema(), 5);
        assert_eq!(fresh.rows(), 5);
        assert_eq!(fresh.schema(), t.schema());
        assert_eq!(fresh.column("input").unwrap().shape(), &[5, 3]);
    }

    #[test]
    fn kind_display() {
        assert_eq!(ColumnKind::Elem(ElementKind::C128).to_string(), "complex128");
        assert_eq!(ColumnKind::Str.to_string(), "string");
    }
}
