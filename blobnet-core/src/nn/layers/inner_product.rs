use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::BlobNetError;
use crate::nn::init::Filler;
use crate::nn::layer::{check_arity, output_gradient, require_float, value_of, Layer};

fn default_bias() -> bool {
    true
}

fn default_weight_filler() -> Filler {
    Filler::Xavier
}

/// Configuration of an [`InnerProductLayer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnerProductConfig {
    /// Width of the output.
    pub num_output: usize,
    #[serde(default = "default_bias")]
    pub bias: bool,
    #[serde(default = "default_weight_filler")]
    pub weight_filler: Filler,
    #[serde(default)]
    pub bias_filler: Filler,
    #[serde(default)]
    pub frozen: bool,
}

impl InnerProductConfig {
    pub fn new(num_output: usize) -> Self {
        InnerProductConfig {
            num_output,
            bias: true,
            weight_filler: Filler::Xavier,
            bias_filler: Filler::Zero,
            frozen: false,
        }
    }

    pub fn validate(&self, layer: &str) -> Result<(), BlobNetError> {
        if self.num_output == 0 {
            return Err(BlobNetError::InvalidLayerConfig {
                layer: layer.to_string(),
                reason: "num_output must be positive".to_string(),
            });
        }
        self.weight_filler.validate(layer)?;
        self.bias_filler.validate(layer)
    }
}

/// Fully connected layer: `y = x W + b`.
///
/// The input is viewed as `[N, in]` with `in` the product of its trailing
/// dimensions. The weight has shape `[in, num_output]` and is allocated on the
/// first forward pass, from the input width; the bias has shape `[num_output]`.
#[derive(Debug)]
pub struct InnerProductLayer {
    name: String,
    config: InnerProductConfig,
    weight: Blob,
    bias: Option<Blob>,
}

impl InnerProductLayer {
    pub fn new(name: impl Into<String>, config: InnerProductConfig) -> Result<Self, BlobNetError> {
        let name = name.into();
        config.validate(&name)?;
        let weight = Blob::with_filler(config.weight_filler.clone());
        let bias = config
            .bias
            .then(|| Blob::with_filler(config.bias_filler.clone()));
        Ok(InnerProductLayer {
            name,
            config,
            weight,
            bias,
        })
    }

    pub fn weight(&self) -> &Blob {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Blob> {
        self.bias.as_ref()
    }

    /// Allocates the parameters for an input of width `in_width`, unless they
    /// already exist. A width change is an error rather than a silent reset.
    fn ensure_parameters(&self, in_width: usize, dtype: crate::types::DType) -> Result<(), BlobNetError> {
        let weight_shape = [in_width, self.config.num_output];
        match self.weight.value() {
            Some(w) if w.shape() != weight_shape => {
                return Err(BlobNetError::ShapeMismatch {
                    expected: w.shape().to_vec(),
                    actual: weight_shape.to_vec(),
                    operation: format!("{} forward", self.name),
                });
            }
            Some(_) => {}
            None => {
                log::debug!(
                    "Layer '{}': allocating weight {:?} ({:?})",
                    self.name,
                    weight_shape,
                    dtype
                );
                self.weight.init_value(&weight_shape, dtype)?;
            }
        }
        if let Some(bias) = &self.bias {
            if !bias.has_value() {
                bias.init_value(&[self.config.num_output], dtype)?;
            }
        }
        Ok(())
    }
}

/// Splits a shape into `(rows, row width)`.
fn as_matrix(shape: &[usize]) -> (usize, usize) {
    match shape.split_first() {
        Some((&n, rest)) => (n, rest.iter().product()),
        None => (1, 1),
    }
}

// Row-major `[m, k] x [k, n]`.
fn matmul(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    let mut out = vec![0.0; m * n];
    for i in 0..m {
        for l in 0..k {
            let a_il = a[i * k + l];
            for j in 0..n {
                out[i * n + j] += a_il * b[l * n + j];
            }
        }
    }
    out
}

// `a^T b` with `a: [m, k]`, `b: [m, n]`, giving `[k, n]`.
fn matmul_at_b(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    let mut out = vec![0.0; k * n];
    for i in 0..m {
        for l in 0..k {
            let a_il = a[i * k + l];
            for j in 0..n {
                out[l * n + j] += a_il * b[i * n + j];
            }
        }
    }
    out
}

// `a b^T` with `a: [m, n]`, `b: [k, n]`, giving `[m, k]`.
fn matmul_a_bt(a: &[f64], b: &[f64], m: usize, n: usize, k: usize) -> Vec<f64> {
    let mut out = vec![0.0; m * k];
    for i in 0..m {
        for l in 0..k {
            out[i * k + l] = (0..n).map(|j| a[i * n + j] * b[l * n + j]).sum();
        }
    }
    out
}

impl Layer for InnerProductLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        "inner_product"
    }

    fn is_frozen(&self) -> bool {
        self.config.frozen
    }

    fn forward(&mut self, inputs: &[Blob], outputs: &[Blob]) -> Result<(), BlobNetError> {
        check_arity(&self.name, "input", 1, inputs.len())?;
        check_arity(&self.name, "output", 1, outputs.len())?;
        let x = value_of(&inputs[0], "inner_product forward")?;
        require_float(&self.name, &x)?;
        let (rows, in_width) = as_matrix(x.shape());
        let out_width = self.config.num_output;
        self.ensure_parameters(in_width, x.dtype())?;

        let weight = value_of(&self.weight, "inner_product forward")?.to_f64_vec()?;
        let mut y = matmul(&x.to_f64_vec()?, &weight, rows, in_width, out_width);
        if let Some(bias) = &self.bias {
            let b = value_of(bias, "inner_product forward")?.to_f64_vec()?;
            for row in y.chunks_mut(out_width) {
                row.iter_mut().zip(&b).for_each(|(v, b)| *v += b);
            }
        }
        outputs[0]
            .init_value(&[rows, out_width], x.dtype())?
            .assign_f64(&y)
    }

    fn backward(
        &mut self,
        inputs: &[Blob],
        outputs: &[Blob],
        propagate_down: bool,
    ) -> Result<f64, BlobNetError> {
        check_arity(&self.name, "input", 1, inputs.len())?;
        check_arity(&self.name, "output", 1, outputs.len())?;
        let x = value_of(&inputs[0], "inner_product backward")?;
        let (rows, in_width) = as_matrix(x.shape());
        let out_width = self.config.num_output;
        let dy = output_gradient(&outputs[0], "inner_product backward")?;

        if !self.config.frozen {
            let dw = matmul_at_b(&x.to_f64_vec()?, &dy, rows, in_width, out_width);
            self.weight.init_gradient()?.assign_f64(&dw)?;
            if let Some(bias) = &self.bias {
                let mut db = vec![0.0; out_width];
                for row in dy.chunks(out_width) {
                    db.iter_mut().zip(row).for_each(|(d, g)| *d += g);
                }
                bias.init_gradient()?.assign_f64(&db)?;
            }
        }
        if propagate_down {
            let weight = value_of(&self.weight, "inner_product backward")?.to_f64_vec()?;
            let dx = matmul_a_bt(&dy, &weight, rows, out_width, in_width);
            inputs[0].init_gradient()?.assign_f64(&dx)?;
        }
        Ok(0.0)
    }

    fn parameters(&self) -> Vec<Blob> {
        let mut params = vec![self.weight.clone()];
        params.extend(self.bias.clone());
        params
    }

    fn config(&self) -> Result<serde_json::Value, BlobNetError> {
        Ok(serde_json::to_value(&self.config)?)
    }
}

#[cfg(test)]
#[path = "inner_product_test.rs"]
mod tests;
