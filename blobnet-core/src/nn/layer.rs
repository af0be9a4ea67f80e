use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::BlobNetError;
use crate::tensor::Tensor;

/// The variants the net distinguishes when scheduling and persisting layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// A differentiable map contributing no loss.
    Compute,
    /// Feeds output blobs from an external source. Never runs backward.
    DataSource,
    /// Computes a scalar loss and the gradients of its inputs. Provides no blobs.
    Loss,
    /// Engine-inserted fan-out node.
    Split,
}

/// The base trait of every unit of computation in a [`Net`](crate::net::Net).
///
/// A layer reads the blobs it declared as needs and writes the blobs it
/// declared as provides; the net hands them over, in declaration order, on
/// every call. Parameters are blobs owned by the layer.
pub trait Layer: Debug + Send + Sync {
    /// Unique name of the layer inside its net.
    fn name(&self) -> &str;

    fn kind(&self) -> LayerKind {
        LayerKind::Compute
    }

    /// Registry key used to rebuild the layer from its config.
    fn type_name(&self) -> &'static str;

    /// A frozen layer keeps its parameters out of gradient-based updates.
    fn is_frozen(&self) -> bool {
        false
    }

    /// Computes the outputs from the inputs.
    fn forward(&mut self, inputs: &[Blob], outputs: &[Blob]) -> Result<(), BlobNetError>;

    /// Computes parameter gradients and, if `propagate_down`, the gradients of
    /// the inputs. Returns the loss contribution of the layer.
    fn backward(
        &mut self,
        inputs: &[Blob],
        outputs: &[Blob],
        propagate_down: bool,
    ) -> Result<f64, BlobNetError>;

    /// Applies the parameter gradients: `value -= gradient` on every
    /// parameter that holds one. No-op for frozen layers.
    fn update(&mut self) -> Result<(), BlobNetError> {
        if self.is_frozen() {
            return Ok(());
        }
        for param in self.parameters() {
            if param.has_value() && param.has_gradient() {
                param.apply_update()?;
            }
        }
        Ok(())
    }

    /// The owned parameter blobs, in a stable order.
    fn parameters(&self) -> Vec<Blob> {
        Vec::new()
    }

    /// Serializable configuration the registry rebuilds the layer from.
    fn config(&self) -> Result<serde_json::Value, BlobNetError>;
}

// --- Helpers shared by the shipped layers ---

/// Fails with `ArityMismatch` unless `actual == expected`.
pub fn check_arity(
    layer: &str,
    role: &str,
    expected: usize,
    actual: usize,
) -> Result<(), BlobNetError> {
    if expected != actual {
        return Err(BlobNetError::ArityMismatch {
            layer: layer.to_string(),
            role: role.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// The value of `blob`, or `ValueNotInitialized` naming `operation`.
pub(crate) fn value_of(blob: &Blob, operation: &str) -> Result<Tensor, BlobNetError> {
    blob.value().ok_or_else(|| BlobNetError::ValueNotInitialized {
        operation: operation.to_string(),
    })
}

/// The gradient of an output blob as `f64` values. An output nobody
/// back-propagated into counts as a zero gradient.
pub(crate) fn output_gradient(blob: &Blob, operation: &str) -> Result<Vec<f64>, BlobNetError> {
    match blob.gradient() {
        Some(g) => g.to_f64_vec(),
        None => Ok(vec![0.0; value_of(blob, operation)?.numel()]),
    }
}

pub(crate) fn require_float(layer: &str, tensor: &Tensor) -> Result<(), BlobNetError> {
    if !tensor.dtype().is_float() {
        return Err(BlobNetError::UnsupportedOperation(format!(
            "layer '{}' needs a floating point input, got {:?}",
            layer,
            tensor.dtype()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "layer_test.rs"]
mod tests;
