use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::BlobNetError;

/// Adds a penalty gradient into a parameter blob.
pub trait Regularizer: std::fmt::Debug + Send + Sync {
    /// Accumulates the penalty gradient into `blob`'s gradient and returns
    /// the penalty value.
    fn reg(&self, blob: &Blob) -> Result<f64, BlobNetError>;
}

/// Weight decay: `grad += weight * value`, penalty `weight / 2 * ||value||^2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct L2Regularizer {
    pub weight: f64,
}

impl L2Regularizer {
    pub fn new(weight: f64) -> Result<Self, BlobNetError> {
        let reg = L2Regularizer { weight };
        reg.validate()?;
        Ok(reg)
    }

    pub fn validate(&self) -> Result<(), BlobNetError> {
        if !(self.weight.is_finite() && self.weight >= 0.0) {
            return Err(BlobNetError::InvalidSolverConfig {
                reason: format!("l2 weight must be finite and >= 0, got {}", self.weight),
            });
        }
        Ok(())
    }
}

impl Regularizer for L2Regularizer {
    fn reg(&self, blob: &Blob) -> Result<f64, BlobNetError> {
        let value = blob.value().ok_or_else(|| BlobNetError::ValueNotInitialized {
            operation: "l2_regularizer".to_string(),
        })?;
        let gradient = blob.gradient().ok_or_else(|| BlobNetError::GradientNotInitialized {
            operation: "l2_regularizer".to_string(),
        })?;
        let values = value.to_f64_vec()?;
        if self.weight == 0.0 {
            return Ok(0.0);
        }
        let regularized: Vec<f64> = gradient
            .to_f64_vec()?
            .iter()
            .zip(&values)
            .map(|(g, v)| g + self.weight * v)
            .collect();
        gradient.assign_f64(&regularized)?;
        let squared: f64 = values.iter().map(|v| v * v).sum();
        Ok(0.5 * self.weight * squared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;
    use approx::assert_abs_diff_eq;

    fn parameter(value: Vec<f64>, gradient: Vec<f64>) -> Result<Blob, BlobNetError> {
        let len = value.len();
        let blob = Blob::from_tensor(Tensor::from_f64(value, vec![len])?);
        blob.init_gradient()?.assign_f64(&gradient)?;
        Ok(blob)
    }

    #[test]
    fn test_l2_adds_weighted_value() -> Result<(), BlobNetError> {
        let blob = parameter(vec![1.0, -2.0], vec![0.5, 0.5])?;
        let penalty = L2Regularizer::new(0.1)?.reg(&blob)?;
        assert_abs_diff_eq!(penalty, 0.25, epsilon = 1e-12);
        let grad = blob.gradient().unwrap().to_f64_vec()?;
        assert_abs_diff_eq!(grad[0], 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(grad[1], 0.3, epsilon = 1e-12);
        // The value itself is untouched.
        assert_eq!(blob.value().unwrap().to_f64_vec()?, vec![1.0, -2.0]);
        Ok(())
    }

    #[test]
    fn test_l2_requires_a_gradient() -> Result<(), BlobNetError> {
        let blob = Blob::from_tensor(Tensor::from_f64(vec![1.0], vec![1])?);
        assert_eq!(
            L2Regularizer::new(0.1)?.reg(&blob).unwrap_err(),
            BlobNetError::GradientNotInitialized {
                operation: "l2_regularizer".to_string()
            }
        );
        Ok(())
    }

    #[test]
    fn test_l2_rejects_negative_weight() {
        assert!(matches!(
            L2Regularizer::new(-1.0),
            Err(BlobNetError::InvalidSolverConfig { .. })
        ));
        assert!(L2Regularizer::new(f64::NAN).is_err());
    }
}
