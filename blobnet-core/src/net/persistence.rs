use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{LayerRegistry, Net};
use crate::error::BlobNetError;
use crate::nn::layer::{Layer, LayerKind};
use crate::tensor::{Tensor, TensorRecord};

pub const NET_SCHEMA_VERSION: u32 = 1;

/// Which layers [`Net::save`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Drops data-source, loss and synthetic layers: what remains is the
    /// model used for prediction.
    #[default]
    Pruned,
    Full,
}

/// Serialized form of a net.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetSchema {
    pub version: u32,
    pub name: String,
    /// In registration order.
    pub layers: Vec<LayerRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub name: String,
    pub kind: LayerKind,
    pub type_name: String,
    /// Engine-inserted; rebuilt by `finish` rather than loaded.
    #[serde(default)]
    pub synthetic: bool,
    pub config: serde_json::Value,
    /// Parameter values in `Layer::parameters` order. `None` for a parameter
    /// not allocated yet. Gradients are never saved.
    pub params: Vec<Option<TensorRecord>>,
    pub needs: Vec<String>,
    pub provides: Vec<String>,
}

/// Copies recorded values onto the layer's parameter blobs.
fn overlay_parameters(layer: &dyn Layer, params: Vec<Option<TensorRecord>>) -> Result<(), BlobNetError> {
    let blobs = layer.parameters();
    if blobs.len() != params.len() {
        return Err(BlobNetError::ArityMismatch {
            layer: layer.name().to_string(),
            role: "parameter".to_string(),
            expected: blobs.len(),
            actual: params.len(),
        });
    }
    for (blob, record) in blobs.iter().zip(params) {
        if let Some(record) = record {
            blob.set_value(Tensor::from_record(record)?);
        }
    }
    Ok(())
}

fn build_layer(record: LayerRecord, registry: &LayerRegistry) -> Result<Box<dyn Layer>, BlobNetError> {
    let layer = registry.build(&record.type_name, &record.name, record.config)?;
    overlay_parameters(layer.as_ref(), record.params)?;
    Ok(layer)
}

impl Net {
    /// Captures the registrations, configs and parameter values.
    pub fn to_schema(&self, mode: SaveMode) -> Result<NetSchema, BlobNetError> {
        let mut layers = Vec::new();
        for entry in &self.layers {
            let layer = entry.layer.as_ref();
            let kind = layer.kind();
            let pruned = entry.synthetic || matches!(kind, LayerKind::DataSource | LayerKind::Loss);
            if mode == SaveMode::Pruned && pruned {
                continue;
            }
            let params = layer
                .parameters()
                .iter()
                .map(|p| p.snapshot())
                .collect::<Result<Vec<_>, _>>()?;
            layers.push(LayerRecord {
                name: layer.name().to_string(),
                kind,
                type_name: layer.type_name().to_string(),
                synthetic: entry.synthetic,
                config: layer.config()?,
                params,
                needs: self.blob_names(&entry.needs),
                provides: self.blob_names(&entry.provides),
            });
        }
        Ok(NetSchema {
            version: NET_SCHEMA_VERSION,
            name: self.name.clone(),
            layers,
        })
    }

    /// Rebuilds a finished net by replaying the registrations.
    pub fn from_schema(schema: NetSchema, registry: &LayerRegistry) -> Result<Net, BlobNetError> {
        check_version(&schema)?;
        let mut net = Net::new(schema.name);
        for record in schema.layers {
            if record.synthetic {
                continue;
            }
            let needs = record.needs.clone();
            let provides = record.provides.clone();
            let layer = build_layer(record, registry)?;
            net.add_boxed_layer(layer, needs, provides)?;
        }
        net.finish()?;
        Ok(net)
    }

    /// Writes the net as JSON to `path`.
    pub fn save(&self, path: impl AsRef<Path>, mode: SaveMode) -> Result<(), BlobNetError> {
        let path = path.as_ref();
        let schema = self.to_schema(mode)?;
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &schema)?;
        writer.flush()?;
        log::debug!(
            "Net '{}': saved {} layers to {}",
            self.name,
            schema.layers.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>, registry: &LayerRegistry) -> Result<Net, BlobNetError> {
        let schema = read_schema(path.as_ref())?;
        Net::from_schema(schema, registry)
    }

    /// Overlays the saved layers whose name matches a registered layer of
    /// this net, then finishes the net again. Other records are ignored.
    pub fn load_parameters(
        &mut self,
        path: impl AsRef<Path>,
        registry: &LayerRegistry,
    ) -> Result<(), BlobNetError> {
        let schema = read_schema(path.as_ref())?;
        check_version(&schema)?;
        let mut replacements = Vec::new();
        for record in schema.layers {
            if record.synthetic || !self.is_registered_layer(&record.name) {
                log::debug!("Net '{}': skipping saved layer '{}'", self.name, record.name);
                continue;
            }
            let layer = build_layer(record, registry)?;
            self.check_replacement(layer.as_ref())?;
            replacements.push(layer);
        }
        for layer in replacements {
            self.replace_layer(layer)?;
        }
        self.finish()
    }
}

fn check_version(schema: &NetSchema) -> Result<(), BlobNetError> {
    if schema.version != NET_SCHEMA_VERSION {
        return Err(BlobNetError::Serialization(format!(
            "unsupported net schema version {} (expected {})",
            schema.version, NET_SCHEMA_VERSION
        )));
    }
    Ok(())
}

fn read_schema(path: &Path) -> Result<NetSchema, BlobNetError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
