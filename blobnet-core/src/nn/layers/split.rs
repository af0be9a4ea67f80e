use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::BlobNetError;
use crate::nn::layer::{check_arity, output_gradient, value_of, Layer, LayerKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub num_outputs: usize,
}

impl SplitConfig {
    pub fn validate(&self, layer: &str) -> Result<(), BlobNetError> {
        if self.num_outputs < 2 {
            return Err(BlobNetError::InvalidLayerConfig {
                layer: layer.to_string(),
                reason: format!("a split needs at least 2 outputs, got {}", self.num_outputs),
            });
        }
        Ok(())
    }
}

/// Fans one blob out to several consumers.
///
/// Every output aliases the input value. The input gradient is the sum of the
/// output gradients, so each consumer back-propagates into its own blob.
#[derive(Debug)]
pub struct SplitLayer {
    name: String,
    config: SplitConfig,
}

impl SplitLayer {
    pub fn new(name: impl Into<String>, config: SplitConfig) -> Result<Self, BlobNetError> {
        let name = name.into();
        config.validate(&name)?;
        Ok(SplitLayer { name, config })
    }
}

impl Layer for SplitLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Split
    }

    fn type_name(&self) -> &'static str {
        "split"
    }

    fn forward(&mut self, inputs: &[Blob], outputs: &[Blob]) -> Result<(), BlobNetError> {
        check_arity(&self.name, "input", 1, inputs.len())?;
        check_arity(&self.name, "output", self.config.num_outputs, outputs.len())?;
        for output in outputs {
            output.mirror(&inputs[0], None)?;
        }
        Ok(())
    }

    fn backward(
        &mut self,
        inputs: &[Blob],
        outputs: &[Blob],
        propagate_down: bool,
    ) -> Result<f64, BlobNetError> {
        if !propagate_down {
            return Ok(0.0);
        }
        check_arity(&self.name, "input", 1, inputs.len())?;
        check_arity(&self.name, "output", self.config.num_outputs, outputs.len())?;
        let numel = value_of(&inputs[0], "split backward")?.numel();
        let mut sum = vec![0.0; numel];
        for output in outputs {
            let g = output_gradient(output, "split backward")?;
            sum.iter_mut().zip(g).for_each(|(s, g)| *s += g);
        }
        inputs[0].init_gradient()?.assign_f64(&sum)?;
        Ok(0.0)
    }

    fn config(&self) -> Result<serde_json::Value, BlobNetError> {
        Ok(serde_json::to_value(self.config)?)
    }
}
