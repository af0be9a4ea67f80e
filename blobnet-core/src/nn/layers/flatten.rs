use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::BlobNetError;
use crate::nn::layer::{check_arity, value_of, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FlattenConfig {}

impl FlattenConfig {
    pub fn validate(&self, _layer: &str) -> Result<(), BlobNetError> {
        Ok(())
    }
}

/// Views each input `[N, d1, d2, ..]` as `[N, d1 * d2 * ..]`.
///
/// No data moves: the output value aliases the input value and, on the way
/// back, the input gradient aliases the output gradient. Inputs and outputs
/// are paired in order.
#[derive(Debug)]
pub struct FlattenLayer {
    name: String,
}

impl FlattenLayer {
    pub fn new(name: impl Into<String>) -> Self {
        FlattenLayer { name: name.into() }
    }
}

fn flat_shape(shape: &[usize]) -> Vec<usize> {
    match shape.split_first() {
        Some((&n, rest)) => vec![n, rest.iter().product()],
        None => vec![1, 1],
    }
}

impl Layer for FlattenLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "flatten"
    }

    fn forward(&mut self, inputs: &[Blob], outputs: &[Blob]) -> Result<(), BlobNetError> {
        check_arity(&self.name, "output", inputs.len(), outputs.len())?;
        for (input, output) in inputs.iter().zip(outputs) {
            let x = value_of(input, "flatten forward")?;
            output.mirror_tensor(&x, Some(&flat_shape(x.shape())))?;
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
        check_arity(&self.name, "output", inputs.len(), outputs.len())?;
        for (input, output) in inputs.iter().zip(outputs) {
            if !output.has_gradient() {
                output.init_gradient()?;
            }
            let shape = value_of(input, "flatten backward")?.shape().to_vec();
            input.mirror_gradient(output, Some(&shape))?;
        }
        Ok(0.0)
    }

    fn config(&self) -> Result<serde_json::Value, BlobNetError> {
        Ok(serde_json::to_value(FlattenConfig::default())?)
    }
}
