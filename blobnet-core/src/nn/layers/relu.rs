use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::BlobNetError;
use crate::nn::layer::{check_arity, output_gradient, value_of, Layer};

/// Configuration of a [`ReluLayer`]. ReLU has no parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReluConfig {}

impl ReluConfig {
    pub fn validate(&self, _layer: &str) -> Result<(), BlobNetError> {
        Ok(())
    }
}

/// Rectified linear unit, `max(0, x)` elementwise.
#[derive(Debug)]
pub struct ReluLayer {
    name: String,
}

impl ReluLayer {
    pub fn new(name: impl Into<String>) -> Self {
        ReluLayer { name: name.into() }
    }
}

impl Layer for ReluLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "relu"
    }

    fn forward(&mut self, inputs: &[Blob], outputs: &[Blob]) -> Result<(), BlobNetError> {
        check_arity(&self.name, "input", 1, inputs.len())?;
        check_arity(&self.name, "output", 1, outputs.len())?;
        let x = value_of(&inputs[0], "relu forward")?;
        let y: Vec<f64> = x.to_f64_vec()?.into_iter().map(|v| v.max(0.0)).collect();
        outputs[0].init_value(x.shape(), x.dtype())?.assign_f64(&y)
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
        check_arity(&self.name, "output", 1, outputs.len())?;
        let x = value_of(&inputs[0], "relu backward")?.to_f64_vec()?;
        let dy = output_gradient(&outputs[0], "relu backward")?;
        let dx: Vec<f64> = x
            .iter()
            .zip(&dy)
            .map(|(x, g)| if *x > 0.0 { *g } else { 0.0 })
            .collect();
        inputs[0].init_gradient()?.assign_f64(&dx)?;
        Ok(0.0)
    }

    fn config(&self) -> Result<serde_json::Value, BlobNetError> {
        Ok(serde_json::to_value(ReluConfig::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[test]
    fn test_relu_forward_backward() -> Result<(), BlobNetError> {
        let mut layer = ReluLayer::new("relu");
        let input = Blob::from_tensor(Tensor::from_f32(vec![-1.0, 0.0, 2.0, -3.0], vec![2, 2])?);
        let output = Blob::new();
        layer.forward(&[input.clone()], &[output.clone()])?;
        assert_eq!(output.value().unwrap().get_f32_data()?, vec![0.0, 0.0, 2.0, 0.0]);

        output.init_gradient()?.fill(1.5)?;
        layer.backward(&[input.clone()], &[output], true)?;
        assert_eq!(input.gradient().unwrap().get_f32_data()?, vec![0.0, 0.0, 1.5, 0.0]);
        Ok(())
    }

    #[test]
    fn test_relu_backward_without_propagate_down() -> Result<(), BlobNetError> {
        let mut layer = ReluLayer::new("relu");
        let input = Blob::from_tensor(Tensor::from_f64(vec![1.0], vec![1])?);
        assert_eq!(layer.backward(&[input.clone()], &[Blob::new()], false)?, 0.0);
        assert!(!input.has_gradient());
        Ok(())
    }
}
