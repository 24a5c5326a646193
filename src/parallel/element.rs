//! Element kinds that may cross the transport.
//!
//! Every communicator verb is generic over [`Element`], a sealed trait
//! implemented for a closed set of primitive kinds. Each kind carries an
//! [`ElementKind`] tag; backends derive the wire datatype from that tag at the
//! call boundary, so there is one generic implementation per verb instead of
//! one per kind.
//!
//! | Rust type   | Kind         | Wire datatype (MPI)  |
//! |-------------|--------------|----------------------|
//! | `i8`        | `I8`         | `MPI_INT8_T`         |
//! | `i16`       | `I16`        | `MPI_INT16_T`        |
//! | `i32`       | `I32`        | `MPI_INT32_T`        |
//! | `i64`       | `I64`        | `MPI_INT64_T`        |
//! | `u8`        | `U8`         | `MPI_UINT8_T` (raw bytes) |
//! | `u16`       | `U16`        | `MPI_UINT16_T`       |
//! | `u32`       | `U32`        | `MPI_UINT32_T`       |
//! | `u64`       | `U64`        | `MPI_UINT64_T`       |
//! | `f32`       | `F32`        | `MPI_FLOAT`          |
//! | `f64`       | `F64`        | `MPI_DOUBLE`         |
//! | `Complex64` | `C128`       | `MPI_C_DOUBLE_COMPLEX` |

use std::fmt;

use num_complex::Complex64;
use num_traits::{WrappingAdd, WrappingMul};

use super::Op;

mod sealed {
    pub trait Sealed {}
}

/// Tag identifying an element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    C128,
}

impl ElementKind {
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::I8 => "i8",
            ElementKind::I16 => "i16",
            ElementKind::I32 => "i32",
            ElementKind::I64 => "i64",
            ElementKind::U8 => "u8",
            ElementKind::U16 => "u16",
            ElementKind::U32 => "u32",
            ElementKind::U64 => "u64",
            ElementKind::F32 => "f32",
            ElementKind::F64 => "f64",
            ElementKind::C128 => "complex128",
        }
    }

    /// Min and Max have no ordering to work with on complex values.
    pub fn supports(self, op: Op) -> bool {
        !matches!((self, op), (ElementKind::C128, Op::Min | Op::Max))
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value that can be sent, received, and reduced by a communicator.
///
/// Sealed: the set of kinds is closed so each one has a wire datatype.
pub trait Element:
    sealed::Sealed + Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static
{
    const KIND: ElementKind;

    /// Combine two values with `op`. `None` when `op` is undefined for the kind.
    fn combine(op: Op, a: Self, b: Self) -> Option<Self>;
}

// Integer sums and products wrap, matching what transports do on overflow.
macro_rules! impl_int_element {
    ($ty:ty, $kind:expr) => {
        impl sealed::Sealed for $ty {}
        impl Element for $ty {
            const KIND: ElementKind = $kind;

            fn combine(op: Op, a: Self, b: Self) -> Option<Self> {
                Some(match op {
                    Op::Sum => WrappingAdd::wrapping_add(&a, &b),
                    Op::Product => WrappingMul::wrapping_mul(&a, &b),
                    Op::Min => a.min(b),
                    Op::Max => a.max(b),
                })
            }
        }
    };
}

macro_rules! impl_float_element {
    ($ty:ty, $kind:expr) => {
        impl sealed::Sealed for $ty {}
        impl Element for $ty {
            const KIND: ElementKind = $kind;

            fn combine(op: Op, a: Self, b: Self) -> Option<Self> {
                Some(match op {
                    Op::Sum => a + b,
                    Op::Product => a * b,
                    Op::Min => a.min(b),
                    Op::Max => a.max(b),
                })
            }
        }
    };
}

impl_int_element!(i8, ElementKind::I8);
impl_int_element!(i16, ElementKind::I16);
impl_int_element!(i32, ElementKind::I32);
impl_int_element!(i64, ElementKind::I64);
impl_int_element!(u8, ElementKind::U8);
impl_int_element!(u16, ElementKind::U16);
impl_int_element!(u32, ElementKind::U32);
impl_int_element!(u64, ElementKind::U64);
impl_float_element!(f32, ElementKind::F32);
impl_float_element!(f64, ElementKind::F64);

impl sealed::Sealed for Complex64 {}
impl Element for Complex64 {
    const KIND: ElementKind = ElementKind::C128;

    fn combine(op: Op, a: Self, b: Self) -> Option<Self> {
        match op {
            Op::Sum => Some(a + b),
            Op::Product => Some(a * b),
            Op::Min | Op::Max => None,
        }
    }
}

/// Fold `values` left to right with `op`, in rank order.
pub(crate) fn fold<T: Element>(op: Op, values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut it = values.into_iter();
    let first = it.next()?;
    it.try_fold(first, |acc, v| T::combine(op, acc, v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_distinct_names() {
        use std::collections::HashSet;
        let kinds = [
            i8::KIND,
            i16::KIND,
            i32::KIND,
            i64::KIND,
            u8::KIND,
            u16::KIND,
            u32::KIND,
            u64::KIND,
            f32::KIND,
            f64::KIND,
            Complex64::KIND,
        ];
        let names: HashSet<_> = kinds.iter().map(|k| k.name()).collect();
        assert_eq!(names.len(), kinds.len());
    }

    #[test]
    fn element_tags_match_kinds() {
        assert_eq!(i8::KIND, ElementKind::I8);
        assert_eq!(i16::KIND, ElementKind::I16);
        assert_eq!(i32::KIND, ElementKind::I32);
        assert_eq!(i64::KIND, ElementKind::I64);
        assert_eq!(u8::KIND, ElementKind::U8);
        assert_eq!(u16::KIND, ElementKind::U16);
        assert_eq!(u32::KIND, ElementKind::U32);
        assert_eq!(u64::KIND, ElementKind::U64);
        assert_eq!(f32::KIND, ElementKind::F32);
        assert_eq!(f64::KIND, ElementKind::F64);
        assert_eq!(Complex64::KIND, ElementKind::C128);
    }

    #[test]
    fn integer_combine() {
        assert_eq!(i32::combine(Op::Sum, 3, -5), Some(-2));
        assert_eq!(i32::combine(Op::Product, 3, -5), Some(-15));
        assert_eq!(u16::combine(Op::Min, 7, 2), Some(2));
        assert_eq!(u16::combine(Op::Max, 7, 2), Some(7));
        assert_eq!(u8::combine(Op::Sum, 250, 10), Some(4));
    }

    #[test]
    fn float_combine() {
        assert_eq!(f64::combine(Op::Sum, 1.5, 2.25), Some(3.75));
        assert_eq!(f32::combine(Op::Max, -1.0, 0.5), Some(0.5));
    }

    #[test]
    fn complex_has_no_ordering() {
        let a = Complex64::new(1.0, 2.0);
        let b = Complex64::new(0.5, -1.0);
        assert_eq!(Complex64::combine(Op::Sum, a, b), Some(Complex64::new(1.5, 1.0)));
        assert_eq!(Complex64::combine(Op::Min, a, b), None);
        assert!(!ElementKind::C128.supports(Op::Max));
        assert!(ElementKind::C128.supports(Op::Product));
        assert!(ElementKind::U64.supports(Op::Min));
    }

    #[test]
    fn fold_in_order() {
        assert_eq!(fold(Op::Sum, [1i64, 2, 3, 4]), Some(10));
        assert_eq!(fold(Op::Product, [2.0f64, 3.0, 0.5]), Some(3.0));
        assert_eq!(fold::<i32>(Op::Max, []), None);
    }
}
