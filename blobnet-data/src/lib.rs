//! Data sources for blobnet: a binary tensor record store, record samplers
//! and the data-source layers built on them.

pub mod layers;
pub mod samplers;
pub mod store;

pub use layers::{StoreDataConfig, StoreDataLayer, TensorDataConfig, TensorDataLayer};
pub use samplers::{RandomSampler, Sampler, SamplerConfig, SequentialSampler};
pub use store::{
    map_store, merge_stores, write_store, MapMode, RecordReader, RecordWriter, StoreMeta,
};

use blobnet_core::net::registry::parse_config;
use blobnet_core::{BlobNetError, Layer, LayerRegistry};

fn build_tensor_data(name: &str, config: serde_json::Value) -> Result<Box<dyn Layer>, BlobNetError> {
    let config: TensorDataConfig = parse_config(name, config)?;
    Ok(Box::new(TensorDataLayer::from_config(name, config)?))
}

fn build_store_data(name: &str, config: serde_json::Value) -> Result<Box<dyn Layer>, BlobNetError> {
    let config: StoreDataConfig = parse_config(name, config)?;
    Ok(Box::new(StoreDataLayer::new(name, config)?))
}

/// Makes the layers of this crate loadable from a saved net.
pub fn register_layers(registry: &mut LayerRegistry) {
    registry.register("tensor_data", build_tensor_data);
    registry.register("store_data", build_store_data);
}

/// The core built-in layers plus the layers of this crate.
pub fn registry() -> LayerRegistry {
    let mut registry = LayerRegistry::with_builtins();
    register_layers(&mut registry);
    registry
}
