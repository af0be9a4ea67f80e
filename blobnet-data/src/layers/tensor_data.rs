use blobnet_core::nn::layer::check_arity;
use blobnet_core::{Blob, BlobNetError, Layer, LayerKind, Tensor, TensorRecord};
use serde::{Deserialize, Serialize};

use crate::samplers::{Sampler, SamplerConfig};

/// Configuration of a [`TensorDataLayer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorDataConfig {
    /// Rows per forward pass.
    pub batch_size: usize,
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// One tensor per output blob, all with the same leading dimension.
    pub sources: Vec<TensorRecord>,
}

impl TensorDataConfig {
    pub fn validate(&self, layer: &str) -> Result<(), BlobNetError> {
        let reason = if self.batch_size == 0 {
            "batch_size must be at least 1"
        } else if self.sources.is_empty() {
            "at least one source tensor is required"
        } else {
            return Ok(());
        };
        Err(BlobNetError::InvalidLayerConfig {
            layer: layer.to_string(),
            reason: reason.to_string(),
        })
    }
}

/// Serves minibatches of in-memory tensors.
///
/// Each forward pass writes `batch_size` rows, taken at the same indices from
/// every source, into the matching outputs. Indices come from the sampler one
/// epoch at a time; a batch spanning two epochs takes the tail of one and the
/// head of the next.
#[derive(Debug)]
pub struct TensorDataLayer {
    name: String,
    batch_size: usize,
    sampler_config: SamplerConfig,
    sampler: Box<dyn Sampler>,
    sources: Vec<Tensor>,
    order: Vec<usize>,
    cursor: usize,
    epoch: usize,
}

impl TensorDataLayer {
    pub fn new(
        name: impl Into<String>,
        sources: Vec<Tensor>,
        batch_size: usize,
        sampler: SamplerConfig,
    ) -> Result<Self, BlobNetError> {
        let name = name.into();
        let invalid = |reason: String| BlobNetError::InvalidLayerConfig {
            layer: name.clone(),
            reason,
        };
        if batch_size == 0 {
            return Err(invalid("batch_size must be at least 1".to_string()));
        }
        let num_records = match sources.first().and_then(|s| s.shape().first()) {
            Some(&n) if n > 0 => n,
            _ => {
                return Err(invalid(
                    "sources need a non-empty leading dimension".to_string(),
                ))
            }
        };
        if let Some(bad) = sources.iter().find(|s| s.shape().first() != Some(&num_records)) {
            return Err(invalid(format!(
                "every source needs {} rows, got shape {:?}",
                num_records,
                bad.shape()
            )));
        }
        Ok(TensorDataLayer {
            name,
            batch_size,
            sampler: sampler.build(),
            sampler_config: sampler,
            sources,
            order: Vec::new(),
            cursor: 0,
            epoch: 0,
        })
    }

    pub fn from_config(name: impl Into<String>, config: TensorDataConfig) -> Result<Self, BlobNetError> {
        let name = name.into();
        config.validate(&name)?;
        let sources = config
            .sources
            .into_iter()
            .map(Tensor::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(name, sources, config.batch_size, config.sampler)
    }

    /// Rows in each source.
    pub fn num_records(&self) -> usize {
        self.sources[0].shape()[0]
    }

    /// Epochs started so far.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    fn next_rows(&mut self) -> Result<Vec<usize>, BlobNetError> {
        let mut rows = Vec::with_capacity(self.batch_size);
        while rows.len() < self.batch_size {
            if self.cursor == self.order.len() {
                self.order = self.sampler.iter(self.num_records()).collect();
                self.cursor = 0;
                self.epoch += 1;
                if self.order.is_empty() {
                    return Err(BlobNetError::UnsupportedOperation(format!(
                        "sampler of layer '{}' yielded an empty epoch",
                        self.name
                    )));
                }
            }
            let take = (self.batch_size - rows.len()).min(self.order.len() - self.cursor);
            rows.extend_from_slice(&self.order[self.cursor..self.cursor + take]);
            self.cursor += take;
        }
        Ok(rows)
    }
}

impl Layer for TensorDataLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> LayerKind {
        LayerKind::DataSource
    }

    fn type_name(&self) -> &'static str {
        "tensor_data"
    }

    fn forward(&mut self, _inputs: &[Blob], outputs: &[Blob]) -> Result<(), BlobNetError> {
        check_arity(&self.name, "output", self.sources.len(), outputs.len())?;
        let rows = self.next_rows()?;
        for (source, output) in self.sources.iter().zip(outputs) {
            output.set_value(source.select_rows(&rows)?);
        }
        Ok(())
    }

    fn backward(&mut self, _: &[Blob], _: &[Blob], _: bool) -> Result<f64, BlobNetError> {
        Err(BlobNetError::BackwardOnDataLayer {
            layer: self.name.clone(),
        })
    }

    fn update(&mut self) -> Result<(), BlobNetError> {
        Ok(())
    }

    fn config(&self) -> Result<serde_json::Value, BlobNetError> {
        let sources = self
            .sources
            .iter()
            .map(Tensor::to_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(serde_json::to_value(TensorDataConfig {
            batch_size: self.batch_size,
            sampler: self.sampler_config.clone(),
            sources,
        })?)
    }
}

#[cfg(test)]
#[path = "tensor_data_test.rs"]
mod tests;
