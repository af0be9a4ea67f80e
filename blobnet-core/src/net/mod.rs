//! The net: an owning graph of layers and blobs, and its execution plans.

use std::collections::HashMap;

use crate::blob::Blob;
use crate::error::BlobNetError;
use crate::nn::layer::{Layer, LayerKind};

mod execution;
mod graph;
pub mod persistence;
pub mod registry;

pub use persistence::{LayerRecord, NetSchema, SaveMode, NET_SCHEMA_VERSION};
pub use registry::{LayerFactory, LayerRegistry};

/// A list of blob names, as accepted by [`Net::add_layer`].
///
/// A bare string is a singleton list; slices, arrays and vectors of names
/// convert as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobNames(Vec<String>);

impl BlobNames {
    pub fn none() -> Self {
        BlobNames(Vec::new())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for BlobNames {
    fn from(name: &str) -> Self {
        BlobNames(vec![name.to_string()])
    }
}

impl From<String> for BlobNames {
    fn from(name: String) -> Self {
        BlobNames(vec![name])
    }
}

impl From<&[&str]> for BlobNames {
    fn from(names: &[&str]) -> Self {
        BlobNames(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<&[String]> for BlobNames {
    fn from(names: &[String]) -> Self {
        BlobNames(names.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for BlobNames {
    fn from(names: [&str; N]) -> Self {
        BlobNames(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<Vec<&str>> for BlobNames {
    fn from(names: Vec<&str>) -> Self {
        BlobNames(names.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for BlobNames {
    fn from(names: Vec<String>) -> Self {
        BlobNames(names)
    }
}

/// Entry of the shared name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeRef {
    Layer(usize),
    Blob(usize),
}

#[derive(Debug)]
struct LayerEntry {
    layer: Box<dyn Layer>,
    /// Declared input blob indices.
    needs: Vec<usize>,
    provides: Vec<usize>,
    /// Inserted by `finish`, dropped when the schedule is invalidated.
    synthetic: bool,
}

#[derive(Debug)]
struct BlobEntry {
    name: String,
    blob: Blob,
    /// Layer writing this blob, if any.
    provider: Option<usize>,
    /// Number of `needs` occurrences naming this blob.
    consumers: usize,
    synthetic: bool,
}

/// One layer invocation with its resolved blob bindings.
#[derive(Debug, Clone)]
struct PlanStep {
    layer: usize,
    inputs: Vec<Blob>,
    outputs: Vec<Blob>,
    propagate_down: bool,
}

/// Everything `finish` derives from the registrations.
#[derive(Debug, Default)]
struct Schedule {
    input_blobs: Vec<usize>,
    output_blobs: Vec<usize>,
    /// Per layer, the needs after fan-out rewiring.
    bound_needs: Vec<Vec<usize>>,
    layer_needs_backward: Vec<bool>,
    blob_needs_backward: Vec<bool>,
    propagate_down: Vec<bool>,
    forward: Vec<PlanStep>,
    backward: Vec<PlanStep>,
    parameters: Vec<Blob>,
}

/// A directed acyclic graph of layers connected through named blobs.
///
/// Layers are registered with [`Net::add_layer`]; blobs are created on first
/// reference. [`Net::finish`] validates the graph and freezes the forward and
/// backward plans that the execution entry points replay. Any later mutation
/// drops the plans, and `finish` has to run again.
///
/// ```
/// use blobnet_core::net::Net;
/// use blobnet_core::nn::{InnerProductConfig, InnerProductLayer, ReluLayer};
///
/// let mut net = Net::new("mlp");
/// net.add_layer(InnerProductLayer::new("fc1", InnerProductConfig::new(8))?, "x", "h")?;
/// net.add_layer(ReluLayer::new("relu1"), "h", "a")?;
/// net.finish()?;
/// assert_eq!(net.input_blobs()?, vec!["x".to_string()]);
/// # Ok::<(), blobnet_core::BlobNetError>(())
/// ```
#[derive(Debug)]
pub struct Net {
    name: String,
    layers: Vec<LayerEntry>,
    blobs: Vec<BlobEntry>,
    names: HashMap<String, NodeRef>,
    schedule: Option<Schedule>,
}

impl Net {
    pub fn new(name: impl Into<String>) -> Self {
        Net {
            name: name.into(),
            layers: Vec::new(),
            blobs: Vec::new(),
            names: HashMap::new(),
            schedule: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.schedule.is_some()
    }

    // --- Construction ---

    /// Registers `layer`, reading the blobs named in `needs` and writing the
    /// blobs named in `provides`. Unknown blob names create empty blobs.
    pub fn add_layer<L>(
        &mut self,
        layer: L,
        needs: impl Into<BlobNames>,
        provides: impl Into<BlobNames>,
    ) -> Result<(), BlobNetError>
    where
        L: Layer + 'static,
    {
        self.add_boxed_layer(Box::new(layer), needs, provides)
    }

    /// Same as [`Net::add_layer`] for an already boxed layer.
    pub fn add_boxed_layer(
        &mut self,
        layer: Box<dyn Layer>,
        needs: impl Into<BlobNames>,
        provides: impl Into<BlobNames>,
    ) -> Result<(), BlobNetError> {
        let needs = needs.into().into_vec();
        let provides = provides.into().into_vec();
        self.validate_registration(layer.as_ref(), &needs, &provides)?;
        self.invalidate();

        let index = self.layers.len();
        let needs: Vec<usize> = needs.iter().map(|n| self.blob_index_or_create(n)).collect();
        let provides: Vec<usize> = provides
            .iter()
            .map(|n| self.blob_index_or_create(n))
            .collect();
        for &b in &needs {
            self.blobs[b].consumers += 1;
        }
        for &b in &provides {
            self.blobs[b].provider = Some(index);
        }
        self.names
            .insert(layer.name().to_string(), NodeRef::Layer(index));
        log::debug!(
            "Net '{}': added layer '{}' ({}) needs {:?} provides {:?}",
            self.name,
            layer.name(),
            layer.type_name(),
            self.blob_names(&needs),
            self.blob_names(&provides)
        );
        self.layers.push(LayerEntry {
            layer,
            needs,
            provides,
            synthetic: false,
        });
        Ok(())
    }

    fn validate_registration(
        &self,
        layer: &dyn Layer,
        needs: &[String],
        provides: &[String],
    ) -> Result<(), BlobNetError> {
        let name = layer.name();
        if self.registered(name).is_some() {
            return Err(BlobNetError::NameCollision {
                name: name.to_string(),
            });
        }
        if layer.kind() == LayerKind::Loss && !provides.is_empty() {
            return Err(BlobNetError::InvalidLayerConfig {
                layer: name.to_string(),
                reason: format!("a loss layer provides no blobs, got {:?}", provides),
            });
        }
        for (i, blob) in provides.iter().enumerate() {
            if provides[..i].contains(blob) {
                return Err(BlobNetError::DuplicateProvider {
                    blob: blob.clone(),
                    provider: name.to_string(),
                    layer: name.to_string(),
                });
            }
            if let Some(NodeRef::Blob(b)) = self.registered(blob) {
                if let Some(provider) = self.blobs[b].provider {
                    return Err(BlobNetError::DuplicateProvider {
                        blob: blob.clone(),
                        provider: self.layers[provider].layer.name().to_string(),
                        layer: name.to_string(),
                    });
                }
            }
        }
        for blob in needs.iter().chain(provides) {
            let is_layer = matches!(self.registered(blob), Some(NodeRef::Layer(_)));
            if is_layer || blob == name {
                return Err(BlobNetError::BlobNameIsLayer { name: blob.clone() });
            }
        }
        Ok(())
    }

    pub(crate) fn is_registered_layer(&self, name: &str) -> bool {
        matches!(self.registered(name), Some(NodeRef::Layer(_)))
    }

    /// Name lookup that ignores engine-inserted nodes.
    fn registered(&self, name: &str) -> Option<NodeRef> {
        match self.names.get(name).copied() {
            Some(NodeRef::Layer(i)) if self.layers[i].synthetic => None,
            Some(NodeRef::Blob(b)) if self.blobs[b].synthetic => None,
            other => other,
        }
    }

    fn blob_index_or_create(&mut self, name: &str) -> usize {
        if let Some(NodeRef::Blob(b)) = self.names.get(name) {
            return *b;
        }
        self.push_blob(name.to_string(), false)
    }

    fn push_blob(&mut self, name: String, synthetic: bool) -> usize {
        let index = self.blobs.len();
        self.names.insert(name.clone(), NodeRef::Blob(index));
        self.blobs.push(BlobEntry {
            name,
            blob: Blob::new(),
            provider: None,
            consumers: 0,
            synthetic,
        });
        index
    }

    /// Swaps the implementation of the registered layer of the same name,
    /// keeping its connectivity. The schedule is dropped.
    pub fn replace_layer(&mut self, layer: Box<dyn Layer>) -> Result<(), BlobNetError> {
        let index = self.check_replacement(layer.as_ref())?;
        self.invalidate();
        self.layers[index].layer = layer;
        Ok(())
    }

    /// Index of the user-registered layer `layer` would replace. Leaves the
    /// net untouched.
    pub(crate) fn check_replacement(&self, layer: &dyn Layer) -> Result<usize, BlobNetError> {
        let index = match self.registered(layer.name()) {
            Some(NodeRef::Layer(i)) => i,
            _ => return Err(BlobNetError::UnknownLayer(layer.name().to_string())),
        };
        if layer.kind() == LayerKind::Loss && !self.layers[index].provides.is_empty() {
            return Err(BlobNetError::InvalidLayerConfig {
                layer: layer.name().to_string(),
                reason: "a loss layer provides no blobs".to_string(),
            });
        }
        Ok(index)
    }

    /// Drops the derived schedule and the engine-inserted nodes, keeping the
    /// registrations.
    pub fn reset(&mut self) {
        self.invalidate();
    }

    /// Synthetic layers and blobs always sit at the tail of their arenas.
    fn invalidate(&mut self) {
        self.schedule = None;
        while self.layers.last().map_or(false, |l| l.synthetic) {
            if let Some(entry) = self.layers.pop() {
                self.names.remove(entry.layer.name());
            }
        }
        while self.blobs.last().map_or(false, |b| b.synthetic) {
            if let Some(entry) = self.blobs.pop() {
                self.names.remove(&entry.name);
            }
        }
    }

    // --- Introspection ---

    fn schedule(&self, operation: &str) -> Result<&Schedule, BlobNetError> {
        self.schedule
            .as_ref()
            .ok_or_else(|| BlobNetError::NotFinalized {
                operation: operation.to_string(),
            })
    }

    fn blob_names(&self, indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&b| self.blobs[b].name.clone()).collect()
    }

    fn layer_index(&self, name: &str) -> Result<usize, BlobNetError> {
        match self.names.get(name) {
            Some(NodeRef::Layer(i)) => Ok(*i),
            _ => Err(BlobNetError::UnknownLayer(name.to_string())),
        }
    }

    /// Layer names in registration order, synthetic layers last.
    pub fn layer_names(&self) -> Vec<String> {
        self.layers
            .iter()
            .map(|l| l.layer.name().to_string())
            .collect()
    }

    pub fn layer(&self, name: &str) -> Result<&dyn Layer, BlobNetError> {
        let index = self.layer_index(name)?;
        Ok(self.layers[index].layer.as_ref())
    }

    /// A handle on the named blob.
    pub fn blob(&self, name: &str) -> Result<Blob, BlobNetError> {
        match self.names.get(name) {
            Some(NodeRef::Blob(b)) => Ok(self.blobs[*b].blob.clone()),
            _ => Err(BlobNetError::UnknownBlob(name.to_string())),
        }
    }

    pub fn is_synthetic(&self, layer: &str) -> Result<bool, BlobNetError> {
        Ok(self.layers[self.layer_index(layer)?].synthetic)
    }

    /// Blobs no layer produces.
    pub fn input_blobs(&self) -> Result<Vec<String>, BlobNetError> {
        Ok(self.blob_names(&self.schedule("input_blobs")?.input_blobs))
    }

    /// Blobs no layer consumes.
    pub fn output_blobs(&self) -> Result<Vec<String>, BlobNetError> {
        Ok(self.blob_names(&self.schedule("output_blobs")?.output_blobs))
    }

    pub fn forward_order(&self) -> Result<Vec<String>, BlobNetError> {
        let schedule = self.schedule("forward_order")?;
        Ok(schedule
            .forward
            .iter()
            .map(|s| self.layers[s.layer].layer.name().to_string())
            .collect())
    }

    /// Reverse forward order filtered by needs-backward. Loss layers are
    /// always kept so their losses are summed by `forward_backward`.
    pub fn backward_order(&self) -> Result<Vec<String>, BlobNetError> {
        let schedule = self.schedule("backward_order")?;
        Ok(schedule
            .backward
            .iter()
            .map(|s| self.layers[s.layer].layer.name().to_string())
            .collect())
    }

    /// The needs-backward flag of a layer or blob.
    pub fn needs_backward(&self, node: &str) -> Result<bool, BlobNetError> {
        let schedule = self.schedule("needs_backward")?;
        match self.names.get(node) {
            Some(NodeRef::Layer(i)) => Ok(schedule.layer_needs_backward[*i]),
            Some(NodeRef::Blob(b)) => Ok(schedule.blob_needs_backward[*b]),
            None => Err(BlobNetError::UnknownLayer(node.to_string())),
        }
    }

    pub fn propagate_down(&self, layer: &str) -> Result<bool, BlobNetError> {
        let schedule = self.schedule("propagate_down")?;
        Ok(schedule.propagate_down[self.layer_index(layer)?])
    }

    /// The blobs a layer actually reads, after fan-out rewiring.
    pub fn bound_needs(&self, layer: &str) -> Result<Vec<String>, BlobNetError> {
        let schedule = self.schedule("bound_needs")?;
        Ok(self.blob_names(&schedule.bound_needs[self.layer_index(layer)?]))
    }

    /// Every layer's parameters, concatenated in forward order.
    pub fn parameters(&self) -> Result<Vec<Blob>, BlobNetError> {
        Ok(self.schedule("parameters")?.parameters.clone())
    }
}

#[cfg(test)]
#[path = "net_test.rs"]
mod tests;
