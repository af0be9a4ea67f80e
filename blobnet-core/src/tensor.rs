use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;
use crate::error::BlobNetError;
use crate::types::DType;

/// A shared handle over a typed CPU buffer, viewed with a given shape.
///
/// Cloning a `Tensor` does not copy data: both handles alias the same storage,
/// and writes through one are visible through the other. [`Tensor::reshape`]
/// returns another aliasing handle with a different shape. Use
/// [`Tensor::deep_clone`] for a detached copy.
#[derive(Clone)]
pub struct Tensor {
    storage: Arc<RwLock<Buffer>>,
    shape: Vec<usize>,
    dtype: DType,
}

/// Serialized form of a tensor: shape plus typed elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorRecord {
    pub shape: Vec<usize>,
    pub data: Buffer,
}

impl Tensor {
    /// Creates a tensor over `buffer`, checking the element count against `shape`.
    pub fn new(buffer: Buffer, shape: Vec<usize>) -> Result<Self, BlobNetError> {
        let numel: usize = shape.iter().product();
        if buffer.len() != numel {
            return Err(BlobNetError::TensorCreationError {
                data_len: buffer.len(),
                shape,
            });
        }
        let dtype = buffer.dtype();
        Ok(Tensor {
            storage: Arc::new(RwLock::new(buffer)),
            shape,
            dtype,
        })
    }

    pub fn from_f32(data: Vec<f32>, shape: Vec<usize>) -> Result<Self, BlobNetError> {
        Self::new(Buffer::F32(data), shape)
    }

    pub fn from_f64(data: Vec<f64>, shape: Vec<usize>) -> Result<Self, BlobNetError> {
        Self::new(Buffer::F64(data), shape)
    }

    pub fn from_i32(data: Vec<i32>, shape: Vec<usize>) -> Result<Self, BlobNetError> {
        Self::new(Buffer::I32(data), shape)
    }

    pub fn from_i64(data: Vec<i64>, shape: Vec<usize>) -> Result<Self, BlobNetError> {
        Self::new(Buffer::I64(data), shape)
    }

    /// Builds a tensor of type `dtype` from `f64` values.
    pub fn from_f64_vec(dtype: DType, data: &[f64], shape: Vec<usize>) -> Result<Self, BlobNetError> {
        Self::new(Buffer::from_f64_slice(dtype, data), shape)
    }

    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        let numel = shape.iter().product();
        Tensor {
            storage: Arc::new(RwLock::new(Buffer::zeros(dtype, numel))),
            shape: shape.to_vec(),
            dtype,
        }
    }

    pub fn full(shape: &[usize], value: f64, dtype: DType) -> Self {
        let numel = shape.iter().product();
        let mut buffer = Buffer::zeros(dtype, numel);
        buffer.fill(value);
        Tensor {
            storage: Arc::new(RwLock::new(buffer)),
            shape: shape.to_vec(),
            dtype,
        }
    }

    pub fn from_record(record: TensorRecord) -> Result<Self, BlobNetError> {
        Self::new(record.data, record.shape)
    }

    /// Copies the current contents into a serializable record.
    pub fn to_record(&self) -> Result<TensorRecord, BlobNetError> {
        Ok(TensorRecord {
            shape: self.shape.clone(),
            data: self.read()?.clone(),
        })
    }

    // --- Accessors ---

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Read access to the underlying storage.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Buffer>, BlobNetError> {
        self.storage.read().map_err(|e| BlobNetError::LockError {
            lock_type: "read".to_string(),
            reason: e.to_string(),
        })
    }

    /// Write access to the underlying storage. Callers must keep the element
    /// type and length unchanged.
    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, Buffer>, BlobNetError> {
        self.storage.write().map_err(|e| BlobNetError::LockError {
            lock_type: "write".to_string(),
            reason: e.to_string(),
        })
    }

    /// True if both handles point at the same storage.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    // --- Views and copies ---

    /// Returns an aliasing view with another shape. No data is copied.
    pub fn reshape(&self, shape: &[usize]) -> Result<Tensor, BlobNetError> {
        let numel: usize = shape.iter().product();
        if numel != self.numel() {
            return Err(BlobNetError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: shape.to_vec(),
                operation: "reshape".to_string(),
            });
        }
        Ok(Tensor {
            storage: Arc::clone(&self.storage),
            shape: shape.to_vec(),
            dtype: self.dtype,
        })
    }

    /// Copies the data into fresh, unshared storage.
    pub fn deep_clone(&self) -> Result<Tensor, BlobNetError> {
        let buffer = self.read()?.clone();
        Tensor::new(buffer, self.shape.clone())
    }

    pub fn to_f64_vec(&self) -> Result<Vec<f64>, BlobNetError> {
        Ok(self.read()?.to_f64_vec())
    }

    pub fn get_f32_data(&self) -> Result<Vec<f32>, BlobNetError> {
        match &*self.read()? {
            Buffer::F32(v) => Ok(v.clone()),
            other => Err(BlobNetError::DataTypeMismatch {
                expected: DType::F32,
                actual: other.dtype(),
                operation: "get_f32_data".to_string(),
            }),
        }
    }

    pub fn get_f64_data(&self) -> Result<Vec<f64>, BlobNetError> {
        match &*self.read()? {
            Buffer::F64(v) => Ok(v.clone()),
            other => Err(BlobNetError::DataTypeMismatch {
                expected: DType::F64,
                actual: other.dtype(),
                operation: "get_f64_data".to_string(),
            }),
        }
    }

    // --- In-place kernels ---

    pub fn fill(&self, value: f64) -> Result<(), BlobNetError> {
        self.write()?.fill(value);
        Ok(())
    }

    /// Overwrites every element from `f64` values, cast to this tensor's type.
    pub fn assign_f64(&self, values: &[f64]) -> Result<(), BlobNetError> {
        self.write()?.assign_f64(values)
    }

    pub fn scale(&self, factor: f64) -> Result<(), BlobNetError> {
        let mut guard = self.write()?;
        let scaled: Vec<f64> = guard.to_f64_vec().into_iter().map(|v| v * factor).collect();
        guard.assign_f64(&scaled)
    }

    /// `self -= other`, elementwise.
    pub fn sub_assign(&self, other: &Tensor) -> Result<(), BlobNetError> {
        self.zip_apply(other, "sub_assign", |dst, src| dst.sub_assign(src))
    }

    /// `self += other`, elementwise.
    pub fn add_assign(&self, other: &Tensor) -> Result<(), BlobNetError> {
        self.zip_apply(other, "add_assign", |dst, src| dst.add_assign(src))
    }

    pub fn copy_from(&self, other: &Tensor) -> Result<(), BlobNetError> {
        self.zip_apply(other, "copy_from", |dst, src| dst.copy_from(src))
    }

    fn zip_apply<F>(&self, other: &Tensor, operation: &str, f: F) -> Result<(), BlobNetError>
    where
        F: FnOnce(&mut Buffer, &Buffer) -> Result<(), BlobNetError>,
    {
        if self.shape != other.shape {
            return Err(BlobNetError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: other.shape.clone(),
                operation: operation.to_string(),
            });
        }
        if self.shares_storage(other) {
            // Same lock on both sides: work from a snapshot of the source.
            let snapshot = other.read()?.clone();
            let mut dst = self.write()?;
            f(&mut *dst, &snapshot)
        } else {
            let src = other.read()?;
            let mut dst = self.write()?;
            f(&mut *dst, &*src)
        }
    }

    // --- Row helpers used by data sources and the record store ---

    /// Number of elements in one record along the leading axis.
    pub fn row_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Gathers the given leading-axis rows into a new tensor.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Tensor, BlobNetError> {
        let leading = self.shape.first().copied().unwrap_or(0);
        if let Some(&bad) = rows.iter().find(|&&r| r >= leading) {
            return Err(BlobNetError::OutOfRange {
                index: bad,
                start: 0,
                end: leading,
            });
        }
        let buffer = self.read()?.select_rows(self.row_len(), rows);
        let mut shape = self.shape.clone();
        shape[0] = rows.len();
        Tensor::new(buffer, shape)
    }

    /// Stacks tensors along the leading axis. Trailing dims and dtype must agree.
    pub fn cat_rows(parts: &[Tensor]) -> Result<Tensor, BlobNetError> {
        let first = parts.first().ok_or_else(|| {
            BlobNetError::UnsupportedOperation("cat_rows on an empty list".to_string())
        })?;
        let mut buffer = first.read()?.clone();
        let mut leading = first.shape.first().copied().unwrap_or(1);
        for part in &parts[1..] {
            if part.shape.get(1..) != first.shape.get(1..) || part.shape.is_empty() {
                return Err(BlobNetError::ShapeMismatch {
                    expected: first.shape.clone(),
                    actual: part.shape.clone(),
                    operation: "cat_rows".to_string(),
                });
            }
            buffer.extend_from(&*part.read()?)?;
            leading += part.shape[0];
        }
        let mut shape = first.shape.clone();
        if shape.is_empty() {
            shape.push(leading);
        } else {
            shape[0] = leading;
        }
        Tensor::new(buffer, shape)
    }

    pub fn to_le_bytes(&self) -> Result<Vec<u8>, BlobNetError> {
        Ok(self.read()?.to_le_bytes())
    }

    pub fn from_le_bytes(dtype: DType, shape: Vec<usize>, bytes: &[u8]) -> Result<Tensor, BlobNetError> {
        Tensor::new(Buffer::from_le_bytes(dtype, bytes)?, shape)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .finish()
    }
}

// Compares shape and contents; a poisoned lock compares unequal.
impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        if self.shape != other.shape || self.dtype != other.dtype {
            return false;
        }
        if self.shares_storage(other) {
            return true;
        }
        match (self.read(), other.read()) {
            (Ok(a), Ok(b)) => *a == *b,
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "tensor_test.rs"]
mod tests;
