use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::BlobNetError;
use crate::nn::init::Filler;
use crate::tensor::{Tensor, TensorRecord};
use crate::types::DType;

#[derive(Debug, Default)]
struct BlobData {
    value: Option<Tensor>,
    gradient: Option<Tensor>,
    filler: Option<Filler>,
    /// The value aliases storage owned elsewhere (set by `mirror*`).
    value_is_view: bool,
    gradient_is_view: bool,
}

/// A named tensor container inside a net: a value plus an optional gradient of
/// the same shape and type.
///
/// `Blob` is a handle: clones refer to the same container, which is how the
/// net's execution plans and the layers share blobs. The value and the
/// gradient are [`Tensor`] handles and can alias another blob's storage
/// through [`Blob::mirror`] / [`Blob::mirror_gradient`]; such a view keeps the
/// source storage alive and writes are visible from both sides.
#[derive(Debug, Clone, Default)]
pub struct Blob(Arc<RwLock<BlobData>>);

impl Blob {
    /// Creates an empty blob without filler.
    pub fn new() -> Self {
        Blob::default()
    }

    pub fn with_filler(filler: Filler) -> Self {
        let blob = Blob::default();
        blob.set_filler(Some(filler));
        blob
    }

    /// Creates a blob owning `tensor` as its value.
    pub fn from_tensor(tensor: Tensor) -> Self {
        let blob = Blob::default();
        blob.write_data().value = Some(tensor);
        blob
    }

    fn read_data(&self) -> RwLockReadGuard<'_, BlobData> {
        self.0.read().unwrap_or_else(|poisoned| {
            log::warn!("RwLock for blob was poisoned. Recovering reader guard.");
            poisoned.into_inner()
        })
    }

    fn write_data(&self) -> RwLockWriteGuard<'_, BlobData> {
        self.0.write().unwrap_or_else(|poisoned| {
            log::warn!("RwLock for blob was poisoned. Recovering writer guard.");
            poisoned.into_inner()
        })
    }

    /// True if both handles refer to the same container.
    pub fn ptr_eq(&self, other: &Blob) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // --- Accessors ---

    pub fn has_value(&self) -> bool {
        self.read_data().value.is_some()
    }

    pub fn has_gradient(&self) -> bool {
        self.read_data().gradient.is_some()
    }

    /// A view of the value (shares storage).
    pub fn value(&self) -> Option<Tensor> {
        self.read_data().value.clone()
    }

    /// A view of the gradient (shares storage).
    pub fn gradient(&self) -> Option<Tensor> {
        self.read_data().gradient.clone()
    }

    pub fn filler(&self) -> Option<Filler> {
        self.read_data().filler.clone()
    }

    pub fn set_filler(&self, filler: Option<Filler>) {
        self.write_data().filler = filler;
    }

    /// Drops value and gradient.
    pub fn clear(&self) {
        let mut data = self.write_data();
        data.value = None;
        data.gradient = None;
        data.value_is_view = false;
        data.gradient_is_view = false;
    }

    // --- Initialization ---

    /// Makes sure the value has the given shape and type, zeroed, then runs
    /// the filler. Existing owned storage of the right shape is reused; a
    /// mirrored value is detached instead of being zeroed in place.
    pub fn init_value(&self, shape: &[usize], dtype: DType) -> Result<Tensor, BlobNetError> {
        let mut data = self.write_data();
        let reusable = match &data.value {
            Some(v) if !data.value_is_view && v.shape() == shape && v.dtype() == dtype => {
                Some(v.clone())
            }
            _ => None,
        };
        let value = match reusable {
            Some(v) => {
                v.fill(0.0)?;
                v
            }
            None => Tensor::zeros(shape, dtype),
        };
        if let Some(filler) = &data.filler {
            filler.fill(&value)?;
        }
        data.value = Some(value.clone());
        data.value_is_view = false;
        drop_mismatched_gradient(&mut data);
        Ok(value)
    }

    /// Zeroes the gradient, (re)allocating it to the value's shape and type.
    pub fn init_gradient(&self) -> Result<Tensor, BlobNetError> {
        let mut data = self.write_data();
        let value = data
            .value
            .clone()
            .ok_or_else(|| BlobNetError::ValueNotInitialized {
                operation: "init_gradient".to_string(),
            })?;
        let reusable = match &data.gradient {
            Some(g)
                if !data.gradient_is_view
                    && g.shape() == value.shape()
                    && g.dtype() == value.dtype() =>
            {
                Some(g.clone())
            }
            _ => None,
        };
        let gradient = match reusable {
            Some(g) => {
                g.fill(0.0)?;
                g
            }
            None => Tensor::zeros(value.shape(), value.dtype()),
        };
        data.gradient = Some(gradient.clone());
        data.gradient_is_view = false;
        Ok(gradient)
    }

    /// Replaces the value with an owned tensor (used when restoring parameters).
    pub fn set_value(&self, tensor: Tensor) {
        let mut data = self.write_data();
        data.value = Some(tensor);
        data.value_is_view = false;
        drop_mismatched_gradient(&mut data);
    }

    // --- Aliasing ---

    /// Makes the value a view of `source`'s value, optionally reshaped.
    pub fn mirror(&self, source: &Blob, reshape: Option<&[usize]>) -> Result<(), BlobNetError> {
        let value = source
            .value()
            .ok_or_else(|| BlobNetError::ValueNotInitialized {
                operation: "mirror".to_string(),
            })?;
        self.mirror_tensor(&value, reshape)
    }

    /// Makes the value a view of an externally supplied tensor.
    pub fn mirror_tensor(&self, tensor: &Tensor, reshape: Option<&[usize]>) -> Result<(), BlobNetError> {
        let view = match reshape {
            Some(shape) => tensor.reshape(shape)?,
            None => tensor.clone(),
        };
        let mut data = self.write_data();
        data.value = Some(view);
        data.value_is_view = true;
        drop_mismatched_gradient(&mut data);
        Ok(())
    }

    /// Makes the gradient a view of `source`'s gradient, optionally reshaped.
    pub fn mirror_gradient(&self, source: &Blob, reshape: Option<&[usize]>) -> Result<(), BlobNetError> {
        let gradient = source
            .gradient()
            .ok_or_else(|| BlobNetError::GradientNotInitialized {
                operation: "mirror_gradient".to_string(),
            })?;
        self.mirror_gradient_tensor(&gradient, reshape)
    }

    /// Makes the gradient a view of an externally supplied tensor. The view
    /// must match the value's shape and type.
    pub fn mirror_gradient_tensor(
        &self,
        tensor: &Tensor,
        reshape: Option<&[usize]>,
    ) -> Result<(), BlobNetError> {
        let view = match reshape {
            Some(shape) => tensor.reshape(shape)?,
            None => tensor.clone(),
        };
        let mut data = self.write_data();
        let value = data
            .value
            .as_ref()
            .ok_or_else(|| BlobNetError::ValueNotInitialized {
                operation: "mirror_gradient".to_string(),
            })?;
        if value.shape() != view.shape() {
            return Err(BlobNetError::ShapeMismatch {
                expected: value.shape().to_vec(),
                actual: view.shape().to_vec(),
                operation: "mirror_gradient".to_string(),
            });
        }
        if value.dtype() != view.dtype() {
            return Err(BlobNetError::DataTypeMismatch {
                expected: value.dtype(),
                actual: view.dtype(),
                operation: "mirror_gradient".to_string(),
            });
        }
        data.gradient = Some(view);
        data.gradient_is_view = true;
        Ok(())
    }

    // --- Update & persistence ---

    /// `value -= gradient`. The gradient is a descent direction: it is always
    /// subtracted.
    pub fn apply_update(&self) -> Result<(), BlobNetError> {
        let (value, gradient) = {
            let data = self.read_data();
            (data.value.clone(), data.gradient.clone())
        };
        let value = value.ok_or_else(|| BlobNetError::ValueNotInitialized {
            operation: "apply_update".to_string(),
        })?;
        let gradient = gradient.ok_or_else(|| BlobNetError::GradientNotInitialized {
            operation: "apply_update".to_string(),
        })?;
        value.sub_assign(&gradient)
    }

    /// The value as a serializable record. The gradient is never persisted.
    pub fn snapshot(&self) -> Result<Option<TensorRecord>, BlobNetError> {
        self.value().map(|v| v.to_record()).transpose()
    }
}

fn drop_mismatched_gradient(data: &mut BlobData) {
    let mismatched = match (&data.value, &data.gradient) {
        (Some(v), Some(g)) => v.shape() != g.shape() || v.dtype() != g.dtype(),
        (None, Some(_)) => true,
        _ => false,
    };
    if mismatched {
        data.gradient = None;
        data.gradient_is_view = false;
    }
}

#[cfg(test)]
#[path = "blob_test.rs"]
mod tests;
