use std::collections::BTreeMap;

use super::{Net, NodeRef};
use crate::error::BlobNetError;
use crate::nn::layer::value_of;
use crate::tensor::Tensor;

impl Net {
    /// Runs the forward plan then the backward plan and returns the summed
    /// loss contributions.
    ///
    /// The net must be finished and have no input blobs; use
    /// [`Net::predict`] to feed inputs.
    pub fn forward_backward(&mut self) -> Result<f64, BlobNetError> {
        let schedule = self
            .schedule
            .as_ref()
            .ok_or_else(|| BlobNetError::NotFinalized {
                operation: "forward_backward".to_string(),
            })?;
        if !schedule.input_blobs.is_empty() {
            return Err(BlobNetError::UnresolvedInputs {
                blobs: self.blob_names(&schedule.input_blobs),
            });
        }
        if !schedule.output_blobs.is_empty() {
            log::warn!(
                "Net '{}' has unused output blobs {:?}. Is a loss layer missing?",
                self.name,
                self.blob_names(&schedule.output_blobs)
            );
        }
        for step in &schedule.forward {
            self.layers[step.layer]
                .layer
                .forward(&step.inputs, &step.outputs)?;
        }
        let mut loss = 0.0;
        for step in &schedule.backward {
            let layer = &mut self.layers[step.layer].layer;
            let layer_loss = layer.backward(&step.inputs, &step.outputs, step.propagate_down)?;
            if layer_loss > 0.0 {
                log::debug!("Layer '{}' produces loss {}", layer.name(), layer_loss);
            }
            loss += layer_loss;
        }
        Ok(loss)
    }

    /// Runs the forward plan only.
    pub fn forward(&mut self) -> Result<(), BlobNetError> {
        let schedule = self
            .schedule
            .as_ref()
            .ok_or_else(|| BlobNetError::NotFinalized {
                operation: "forward".to_string(),
            })?;
        for step in &schedule.forward {
            self.layers[step.layer]
                .layer
                .forward(&step.inputs, &step.outputs)?;
        }
        Ok(())
    }

    /// Feeds `inputs` into the named blobs (by aliasing, no copy), runs the
    /// forward plan and returns views of every output blob.
    pub fn predict<I, S>(&mut self, inputs: I) -> Result<BTreeMap<String, Tensor>, BlobNetError>
    where
        I: IntoIterator<Item = (S, Tensor)>,
        S: AsRef<str>,
    {
        self.schedule("predict")?;
        for (name, tensor) in inputs {
            let name = name.as_ref();
            match self.names.get(name) {
                Some(NodeRef::Blob(b)) => self.blobs[*b].blob.mirror_tensor(&tensor, None)?,
                _ => return Err(BlobNetError::UnknownBlob(name.to_string())),
            }
        }
        let schedule = self.schedule("predict")?;
        let missing: Vec<usize> = schedule
            .input_blobs
            .iter()
            .copied()
            .filter(|&b| !self.blobs[b].blob.has_value())
            .collect();
        if !missing.is_empty() {
            return Err(BlobNetError::UnresolvedInputs {
                blobs: self.blob_names(&missing),
            });
        }
        self.forward()?;

        let schedule = self.schedule("predict")?;
        schedule
            .output_blobs
            .iter()
            .map(|&b| {
                let entry = &self.blobs[b];
                Ok((entry.name.clone(), value_of(&entry.blob, "predict")?))
            })
            .collect()
    }

    /// Calls `update` on every layer.
    pub fn update(&mut self) -> Result<(), BlobNetError> {
        for entry in self.layers.iter_mut() {
            entry.layer.update()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "execution_test.rs"]
mod tests;
