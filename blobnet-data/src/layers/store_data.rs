use std::ops::Range;
use std::path::PathBuf;

use blobnet_core::nn::layer::check_arity;
use blobnet_core::{Blob, BlobNetError, Layer, LayerKind};
use serde::{Deserialize, Serialize};

use crate::store::RecordReader;

/// Configuration of a [`StoreDataLayer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDataConfig {
    /// Store path without extension.
    pub stem: PathBuf,
    pub batch_size: usize,
    /// Local record range; the whole store when absent.
    #[serde(default)]
    pub range: Option<Range<usize>>,
}

impl StoreDataConfig {
    pub fn validate(&self, layer: &str) -> Result<(), BlobNetError> {
        if self.batch_size == 0 {
            return Err(BlobNetError::InvalidLayerConfig {
                layer: layer.to_string(),
                reason: "batch_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Streams consecutive batches from a record store into its single output,
/// wrapping around the end of the local range.
#[derive(Debug)]
pub struct StoreDataLayer {
    name: String,
    config: StoreDataConfig,
    reader: RecordReader,
}

impl StoreDataLayer {
    pub fn new(name: impl Into<String>, config: StoreDataConfig) -> Result<Self, BlobNetError> {
        let name = name.into();
        config.validate(&name)?;
        let reader = RecordReader::open(&config.stem, config.range.clone())?;
        if config.batch_size > reader.num_local_records() {
            return Err(BlobNetError::InvalidLayerConfig {
                layer: name,
                reason: format!(
                    "batch_size {} exceeds the {} records in range",
                    config.batch_size,
                    reader.num_local_records()
                ),
            });
        }
        Ok(StoreDataLayer {
            name,
            config,
            reader,
        })
    }

    pub fn reader(&self) -> &RecordReader {
        &self.reader
    }
}

impl Layer for StoreDataLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> LayerKind {
        LayerKind::DataSource
    }

    fn type_name(&self) -> &'static str {
        "store_data"
    }

    fn forward(&mut self, _inputs: &[Blob], outputs: &[Blob]) -> Result<(), BlobNetError> {
        check_arity(&self.name, "output", 1, outputs.len())?;
        outputs[0].set_value(self.reader.read(self.config.batch_size)?);
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
        Ok(serde_json::to_value(&self.config)?)
    }
}

#[cfg(test)]
#[path = "store_data_test.rs"]
mod tests;
