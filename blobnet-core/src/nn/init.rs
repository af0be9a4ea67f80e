use rand::distributions::Distribution;
use rand_distr::{Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::BlobNetError;
use crate::tensor::Tensor;

/// Initialization strategy of a blob value.
///
/// A blob applies its filler every time its value is (re)initialized, after
/// the zero fill.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filler {
    /// Leaves the zero fill in place.
    #[default]
    Zero,
    Constant { value: f64 },
    /// Uniform samples in `[low, high)`.
    Uniform { low: f64, high: f64 },
    Gaussian { mean: f64, std: f64 },
    /// Uniform in `±sqrt(3 / fan_in)`, fan_in being the product of all dims
    /// but the last.
    Xavier,
}

impl Filler {
    /// Checks the filler parameters on behalf of `layer`.
    pub fn validate(&self, layer: &str) -> Result<(), BlobNetError> {
        let reason = match self {
            Filler::Uniform { low, high } if !(low < high) || !(high - low).is_finite() => {
                format!("uniform filler needs finite low < high, got [{}, {})", low, high)
            }
            Filler::Gaussian { mean, std }
                if !(*std >= 0.0) || !std.is_finite() || !mean.is_finite() =>
            {
                format!(
                    "gaussian filler needs a finite mean and std >= 0, got ({}, {})",
                    mean, std
                )
            }
            _ => return Ok(()),
        };
        Err(BlobNetError::InvalidLayerConfig {
            layer: layer.to_string(),
            reason,
        })
    }

    /// Fills `tensor` in place.
    pub fn fill(&self, tensor: &Tensor) -> Result<(), BlobNetError> {
        self.validate("filler")?;
        match self {
            Filler::Zero => tensor.fill(0.0),
            Filler::Constant { value } => tensor.fill(*value),
            Filler::Uniform { low, high } => {
                let dist = Uniform::new(*low, *high);
                fill_random(tensor, &dist, "uniform")
            }
            Filler::Gaussian { mean, std } => {
                let dist = Normal::new(*mean, *std).map_err(|e| {
                    BlobNetError::UnsupportedOperation(format!("gaussian filler: {}", e))
                })?;
                fill_random(tensor, &dist, "gaussian")
            }
            Filler::Xavier => {
                let last = tensor.shape().last().copied().unwrap_or(1).max(1);
                let fan_in = (tensor.numel() / last).max(1);
                let scale = (3.0 / fan_in as f64).sqrt();
                let dist = Uniform::new_inclusive(-scale, scale);
                fill_random(tensor, &dist, "xavier")
            }
        }
    }
}

// --- Internal helper for random fills ---

fn fill_random<D>(tensor: &Tensor, dist: &D, name: &str) -> Result<(), BlobNetError>
where
    D: Distribution<f64>,
{
    if !tensor.dtype().is_float() {
        return Err(BlobNetError::UnsupportedOperation(format!(
            "{} filler on a {:?} tensor",
            name,
            tensor.dtype()
        )));
    }
    let mut rng = rand::thread_rng();
    let values: Vec<f64> = (0..tensor.numel()).map(|_| dist.sample(&mut rng)).collect();
    tensor.assign_f64(&values)
}

#[cfg(test)]
#[path = "init_test.rs"]
mod tests;
