use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::BlobNetError;
use crate::nn::layer::{check_arity, require_float, value_of, Layer, LayerKind};

fn default_weight() -> f64 {
    1.0
}

/// Configuration of a [`SquaredLossLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SquaredLossConfig {
    /// Scale applied to the loss and its gradient.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Default for SquaredLossConfig {
    fn default() -> Self {
        SquaredLossConfig { weight: 1.0 }
    }
}

impl SquaredLossConfig {
    pub fn validate(&self, layer: &str) -> Result<(), BlobNetError> {
        if !(self.weight.is_finite() && self.weight >= 0.0) {
            return Err(BlobNetError::InvalidLayerConfig {
                layer: layer.to_string(),
                reason: format!("loss weight must be finite and non-negative, got {}", self.weight),
            });
        }
        Ok(())
    }
}

/// Euclidean loss between a prediction (input 0) and a target (input 1).
///
/// With `N` the leading dimension of the prediction:
/// `loss = weight * sum((pred - target)^2) / (2 N)`. The gradient
/// `weight * (pred - target) / N` is written to the prediction during the
/// forward pass; the target gets no gradient.
#[derive(Debug)]
pub struct SquaredLossLayer {
    name: String,
    config: SquaredLossConfig,
    loss: f64,
}

impl SquaredLossLayer {
    pub fn new(name: impl Into<String>, config: SquaredLossConfig) -> Result<Self, BlobNetError> {
        let name = name.into();
        config.validate(&name)?;
        Ok(SquaredLossLayer {
            name,
            config,
            loss: 0.0,
        })
    }

    /// Loss computed by the last forward pass.
    pub fn loss(&self) -> f64 {
        self.loss
    }
}

impl Layer for SquaredLossLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Loss
    }

    fn type_name(&self) -> &'static str {
        "squared_loss"
    }

    fn forward(&mut self, inputs: &[Blob], outputs: &[Blob]) -> Result<(), BlobNetError> {
        check_arity(&self.name, "input", 2, inputs.len())?;
        check_arity(&self.name, "output", 0, outputs.len())?;
        let pred = value_of(&inputs[0], "squared_loss forward")?;
        let target = value_of(&inputs[1], "squared_loss forward")?;
        require_float(&self.name, &pred)?;
        if pred.numel() != target.numel() {
            return Err(BlobNetError::ShapeMismatch {
                expected: pred.shape().to_vec(),
                actual: target.shape().to_vec(),
                operation: "squared_loss forward".to_string(),
            });
        }
        let n = pred.shape().first().copied().unwrap_or(1).max(1) as f64;
        let diff: Vec<f64> = pred
            .to_f64_vec()?
            .into_iter()
            .zip(target.to_f64_vec()?)
            .map(|(p, t)| p - t)
            .collect();
        let sum_sq: f64 = diff.iter().map(|d| d * d).sum();
        self.loss = self.config.weight * sum_sq / (2.0 * n);

        let scale = self.config.weight / n;
        let grad: Vec<f64> = diff.iter().map(|d| d * scale).collect();
        inputs[0].init_gradient()?.assign_f64(&grad)
    }

    fn backward(&mut self, _: &[Blob], _: &[Blob], _: bool) -> Result<f64, BlobNetError> {
        Ok(self.loss)
    }

    fn update(&mut self) -> Result<(), BlobNetError> {
        Ok(())
    }

    fn config(&self) -> Result<serde_json::Value, BlobNetError> {
        Ok(serde_json::to_value(self.config)?)
    }
}

#[cfg(test)]
#[path = "squared_test.rs"]
mod tests;
