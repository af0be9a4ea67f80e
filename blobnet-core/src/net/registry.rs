use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;

use crate::error::BlobNetError;
use crate::nn::layer::Layer;
use crate::nn::layers::{
    FlattenConfig, FlattenLayer, InnerProductConfig, InnerProductLayer, NdarrayDataConfig,
    NdarrayDataLayer, ReluConfig, ReluLayer, SplitConfig, SplitLayer,
};
use crate::nn::losses::{SquaredLossConfig, SquaredLossLayer};

/// Builds a layer named `name` from its persisted configuration.
pub type LayerFactory = fn(name: &str, config: serde_json::Value) -> Result<Box<dyn Layer>, BlobNetError>;

/// Maps layer type names to factories, so a saved net can be rebuilt.
#[derive(Clone)]
pub struct LayerRegistry {
    factories: HashMap<String, LayerFactory>,
}

/// Parses a config, mapping the serde error onto the layer.
pub fn parse_config<C: DeserializeOwned>(name: &str, config: serde_json::Value) -> Result<C, BlobNetError> {
    serde_json::from_value(config).map_err(|e| BlobNetError::InvalidLayerConfig {
        layer: name.to_string(),
        reason: e.to_string(),
    })
}

fn build_inner_product(name: &str, config: serde_json::Value) -> Result<Box<dyn Layer>, BlobNetError> {
    let config: InnerProductConfig = parse_config(name, config)?;
    Ok(Box::new(InnerProductLayer::new(name, config)?))
}

fn build_relu(name: &str, config: serde_json::Value) -> Result<Box<dyn Layer>, BlobNetError> {
    parse_config::<ReluConfig>(name, config)?.validate(name)?;
    Ok(Box::new(ReluLayer::new(name)))
}

fn build_flatten(name: &str, config: serde_json::Value) -> Result<Box<dyn Layer>, BlobNetError> {
    parse_config::<FlattenConfig>(name, config)?.validate(name)?;
    Ok(Box::new(FlattenLayer::new(name)))
}

fn build_split(name: &str, config: serde_json::Value) -> Result<Box<dyn Layer>, BlobNetError> {
    let config: SplitConfig = parse_config(name, config)?;
    Ok(Box::new(SplitLayer::new(name, config)?))
}

fn build_ndarray_data(name: &str, config: serde_json::Value) -> Result<Box<dyn Layer>, BlobNetError> {
    let config: NdarrayDataConfig = parse_config(name, config)?;
    Ok(Box::new(NdarrayDataLayer::from_config(name, config)?))
}

fn build_squared_loss(name: &str, config: serde_json::Value) -> Result<Box<dyn Layer>, BlobNetError> {
    let config: SquaredLossConfig = parse_config(name, config)?;
    Ok(Box::new(SquaredLossLayer::new(name, config)?))
}

impl LayerRegistry {
    /// A registry without any layer type.
    pub fn empty() -> Self {
        LayerRegistry {
            factories: HashMap::new(),
        }
    }

    /// A registry knowing every layer type of this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("inner_product", build_inner_product);
        registry.register("relu", build_relu);
        registry.register("flatten", build_flatten);
        registry.register("split", build_split);
        registry.register("ndarray_data", build_ndarray_data);
        registry.register("squared_loss", build_squared_loss);
        registry
    }

    /// Registers (or replaces) the factory of `type_name`.
    pub fn register(&mut self, type_name: &str, factory: LayerFactory) {
        if self.factories.insert(type_name.to_string(), factory).is_some() {
            log::debug!("Layer type '{}' registered again, replacing factory", type_name);
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn build(
        &self,
        type_name: &str,
        name: &str,
        config: serde_json::Value,
    ) -> Result<Box<dyn Layer>, BlobNetError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| BlobNetError::UnknownLayerType(type_name.to_string()))?;
        factory(name, config)
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("LayerRegistry").field("types", &names).finish()
    }
}
