use std::fmt::Debug;

use num_traits::{Num, NumCast, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::BlobNetError;
use crate::types::DType;

/// Typed, contiguous CPU storage behind a tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Buffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

/// Applies `$body` to the inner vector of `$buffer`, whatever its element type.
macro_rules! with_vec {
    ($buffer:expr, $v:ident => $body:expr) => {
        match $buffer {
            Buffer::F32($v) => $body,
            Buffer::F64($v) => $body,
            Buffer::I32($v) => $body,
            Buffer::I64($v) => $body,
        }
    };
}

/// Same as `with_vec!`, for two buffers of the same element type.
/// Evaluates to `Err(DataTypeMismatch)` when the types differ.
macro_rules! with_vec_pair {
    ($lhs:expr, $rhs:expr, $op:expr, ($a:ident, $b:ident) => $body:expr) => {
        match ($lhs, $rhs) {
            (Buffer::F32($a), Buffer::F32($b)) => Ok($body),
            (Buffer::F64($a), Buffer::F64($b)) => Ok($body),
            (Buffer::I32($a), Buffer::I32($b)) => Ok($body),
            (Buffer::I64($a), Buffer::I64($b)) => Ok($body),
            (lhs, rhs) => Err(BlobNetError::DataTypeMismatch {
                expected: lhs.dtype(),
                actual: rhs.dtype(),
                operation: $op.to_string(),
            }),
        }
    };
}

fn cast_vec<T: NumCast + Default>(values: &[f64]) -> Vec<T> {
    values
        .iter()
        .map(|v| T::from(*v).unwrap_or_default())
        .collect()
}

fn fill_slice<T: NumCast + Default + Copy>(dst: &mut [T], value: f64) {
    let cast = T::from(value).unwrap_or_default();
    dst.iter_mut().for_each(|x| *x = cast);
}

fn sub_assign_slice<T: Num + Copy>(dst: &mut [T], src: &[T]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = *d - *s;
    }
}

fn add_assign_slice<T: Num + Copy>(dst: &mut [T], src: &[T]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = *d + *s;
    }
}

impl Buffer {
    /// Allocates `len` zeroed elements of the given type.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => Buffer::F32(vec![0.0; len]),
            DType::F64 => Buffer::F64(vec![0.0; len]),
            DType::I32 => Buffer::I32(vec![0; len]),
            DType::I64 => Buffer::I64(vec![0; len]),
        }
    }

    /// Builds a buffer of the given type from `f64` values, casting each element.
    /// Values that do not fit the target type become zero.
    pub fn from_f64_slice(dtype: DType, values: &[f64]) -> Self {
        match dtype {
            DType::F32 => Buffer::F32(cast_vec(values)),
            DType::F64 => Buffer::F64(values.to_vec()),
            DType::I32 => Buffer::I32(cast_vec(values)),
            DType::I64 => Buffer::I64(cast_vec(values)),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Buffer::F32(_) => DType::F32,
            Buffer::F64(_) => DType::F64,
            Buffer::I32(_) => DType::I32,
            Buffer::I64(_) => DType::I64,
        }
    }

    pub fn len(&self) -> usize {
        with_vec!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the elements out as `f64`, the working type of the float kernels.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        with_vec!(self, v => v.iter().map(|x| x.to_f64().unwrap_or_default()).collect())
    }

    /// Sets every element to `value`, cast to the buffer's type.
    pub fn fill(&mut self, value: f64) {
        with_vec!(self, v => fill_slice(v, value))
    }

    /// Overwrites the elements with `values` (cast), lengths must agree.
    pub fn assign_f64(&mut self, values: &[f64]) -> Result<(), BlobNetError> {
        if values.len() != self.len() {
            return Err(BlobNetError::TensorCreationError {
                data_len: values.len(),
                shape: vec![self.len()],
            });
        }
        *self = Buffer::from_f64_slice(self.dtype(), values);
        Ok(())
    }

    /// `self -= other`, elementwise.
    pub fn sub_assign(&mut self, other: &Buffer) -> Result<(), BlobNetError> {
        with_vec_pair!(self, other, "sub_assign", (a, b) => sub_assign_slice(a, b))
    }

    /// `self += other`, elementwise.
    pub fn add_assign(&mut self, other: &Buffer) -> Result<(), BlobNetError> {
        with_vec_pair!(self, other, "add_assign", (a, b) => add_assign_slice(a, b))
    }

    /// Copies `other` into `self` without reallocating.
    pub fn copy_from(&mut self, other: &Buffer) -> Result<(), BlobNetError> {
        with_vec_pair!(self, other, "copy_from", (a, b) => a.copy_from_slice(b))
    }

    /// Appends the elements of `other`, which must share the element type.
    pub fn extend_from(&mut self, other: &Buffer) -> Result<(), BlobNetError> {
        with_vec_pair!(self, other, "extend_from", (a, b) => a.extend_from_slice(b))
    }

    /// Gathers rows of `row_len` elements in the given order.
    pub fn select_rows(&self, row_len: usize, rows: &[usize]) -> Buffer {
        match self {
            Buffer::F32(v) => Buffer::F32(gather(v, row_len, rows)),
            Buffer::F64(v) => Buffer::F64(gather(v, row_len, rows)),
            Buffer::I32(v) => Buffer::I32(gather(v, row_len, rows)),
            Buffer::I64(v) => Buffer::I64(gather(v, row_len, rows)),
        }
    }

    /// Raw little-endian encoding, element after element.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        with_vec!(self, v => v.iter().flat_map(|x| x.to_le_bytes()).collect())
    }

    /// Decodes little-endian bytes written by [`Buffer::to_le_bytes`].
    pub fn from_le_bytes(dtype: DType, bytes: &[u8]) -> Result<Self, BlobNetError> {
        let width = dtype.size_of();
        if bytes.len() % width != 0 {
            return Err(BlobNetError::Io(format!(
                "{} bytes is not a whole number of {:?} elements",
                bytes.len(),
                dtype
            )));
        }
        let chunks = bytes.chunks_exact(width);
        // chunks_exact guarantees the slice width, the conversions cannot fail.
        let buffer = match dtype {
            DType::F32 => Buffer::F32(
                chunks
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            DType::F64 => Buffer::F64(
                chunks
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            DType::I32 => Buffer::I32(
                chunks
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            DType::I64 => Buffer::I64(
                chunks
                    .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
        };
        Ok(buffer)
    }
}

fn gather<T: Copy + Debug>(values: &[T], row_len: usize, rows: &[usize]) -> Vec<T> {
    let mut out = Vec::with_capacity(row_len * rows.len());
    for &row in rows {
        out.extend_from_slice(&values[row * row_len..(row + 1) * row_len]);
    }
    out
}
