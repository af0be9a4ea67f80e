use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::BlobNetError;
use crate::nn::layer::{check_arity, Layer, LayerKind};
use crate::tensor::{Tensor, TensorRecord};

/// Configuration of an [`NdarrayDataLayer`]: one record per output blob.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NdarrayDataConfig {
    pub sources: Vec<TensorRecord>,
}

impl NdarrayDataConfig {
    pub fn validate(&self, layer: &str) -> Result<(), BlobNetError> {
        if self.sources.is_empty() {
            return Err(BlobNetError::InvalidLayerConfig {
                layer: layer.to_string(),
                reason: "at least one source tensor is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Exposes fixed in-memory tensors, output `i` mirroring source `i`.
#[derive(Debug)]
pub struct NdarrayDataLayer {
    name: String,
    sources: Vec<Tensor>,
}

impl NdarrayDataLayer {
    pub fn new(name: impl Into<String>, sources: Vec<Tensor>) -> Result<Self, BlobNetError> {
        let name = name.into();
        if sources.is_empty() {
            return Err(BlobNetError::InvalidLayerConfig {
                layer: name,
                reason: "at least one source tensor is required".to_string(),
            });
        }
        Ok(NdarrayDataLayer { name, sources })
    }

    pub fn from_config(name: impl Into<String>, config: NdarrayDataConfig) -> Result<Self, BlobNetError> {
        let name = name.into();
        config.validate(&name)?;
        let sources = config
            .sources
            .into_iter()
            .map(Tensor::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(name, sources)
    }
}

impl Layer for NdarrayDataLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> LayerKind {
        LayerKind::DataSource
    }

    fn type_name(&self) -> &'static str {
        "ndarray_data"
    }

    fn forward(&mut self, _inputs: &[Blob], outputs: &[Blob]) -> Result<(), BlobNetError> {
        check_arity(&self.name, "output", self.sources.len(), outputs.len())?;
        for (source, output) in self.sources.iter().zip(outputs) {
            output.mirror_tensor(source, None)?;
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
        Ok(serde_json::to_value(NdarrayDataConfig { sources })?)
    }
}
