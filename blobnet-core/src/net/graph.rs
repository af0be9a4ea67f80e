use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{LayerEntry, Net, NodeRef, PlanStep, Schedule};
use crate::error::BlobNetError;
use crate::nn::layer::LayerKind;
use crate::nn::layers::split::{SplitConfig, SplitLayer};

/// Dependency graph over node ids: layers are `0..num_layers`, blob `b` is
/// `num_layers + b`.
struct Graph {
    num_layers: usize,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl Graph {
    fn new(num_layers: usize, num_blobs: usize) -> Self {
        let n = num_layers + num_blobs;
        Graph {
            num_layers,
            successors: vec![Vec::new(); n],
            predecessors: vec![Vec::new(); n],
        }
    }

    fn blob_node(&self, blob: usize) -> usize {
        self.num_layers + blob
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        self.successors[from].push(to);
        self.predecessors[to].push(from);
    }

    /// Kahn's algorithm. Among ready nodes the smallest id goes first, so the
    /// order follows registration order wherever the edges allow. Returns the
    /// unscheduled nodes on a cycle.
    fn topological_order(&self) -> Result<Vec<usize>, Vec<usize>> {
        let n = self.successors.len();
        let mut indegree: Vec<usize> = self.predecessors.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&id| indegree[id] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for &next in &self.successors[id] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
        if order.len() == n {
            Ok(order)
        } else {
            Err((0..n).filter(|&id| indegree[id] > 0).collect())
        }
    }
}

impl Net {
    /// Validates the graph and freezes the execution plans.
    ///
    /// Inserts one split layer per blob consumed more than once, orders the
    /// layers topologically, derives the backward flags and binds every step
    /// to its blobs. Running it again without mutation gives the same plans.
    pub fn finish(&mut self) -> Result<(), BlobNetError> {
        self.invalidate();
        match self
            .insert_splits()
            .and_then(|bound_needs| self.build_schedule(bound_needs))
        {
            Ok(schedule) => {
                self.schedule = Some(schedule);
                Ok(())
            }
            Err(e) => {
                self.invalidate();
                Err(e)
            }
        }
    }

    /// Creates a unique name from `base`, appending `_<n>` if needed.
    fn unique_name(&self, base: String) -> String {
        if !self.names.contains_key(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !self.names.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Resolves fan-out. Returns the per-layer needs after rewiring.
    fn insert_splits(&mut self) -> Result<Vec<Vec<usize>>, BlobNetError> {
        let mut bound_needs: Vec<Vec<usize>> = self.layers.iter().map(|l| l.needs.clone()).collect();
        let fanned_out: Vec<usize> = (0..self.blobs.len())
            .filter(|&b| self.blobs[b].consumers > 1)
            .collect();

        for blob in fanned_out {
            let blob_name = self.blobs[blob].name.clone();
            let count = self.blobs[blob].consumers;
            let layer_index = self.layers.len();
            let layer_name = self.unique_name(format!("{}/split", blob_name));
            self.names.insert(layer_name.clone(), NodeRef::Layer(layer_index));

            let mut outputs = Vec::with_capacity(count);
            for i in 0..count {
                let name = self.unique_name(format!("{}/split_{}", blob_name, i));
                let b = self.push_blob(name, true);
                self.blobs[b].provider = Some(layer_index);
                self.blobs[b].consumers = 1;
                outputs.push(b);
            }

            // Consumer occurrences in registration order, then position.
            let mut next_output = outputs.iter();
            for needs in bound_needs.iter_mut() {
                for slot in needs.iter_mut().filter(|slot| **slot == blob) {
                    if let Some(&out) = next_output.next() {
                        *slot = out;
                    }
                }
            }

            let split = SplitLayer::new(layer_name, SplitConfig { num_outputs: count })?;
            log::debug!(
                "Net '{}': blob '{}' has {} consumers, inserting split",
                self.name,
                blob_name,
                count
            );
            bound_needs.push(vec![blob]);
            self.layers.push(LayerEntry {
                layer: Box::new(split),
                needs: vec![blob],
                provides: outputs,
                synthetic: true,
            });
        }
        Ok(bound_needs)
    }

    fn build_schedule(&self, bound_needs: Vec<Vec<usize>>) -> Result<Schedule, BlobNetError> {
        let num_layers = self.layers.len();
        let input_blobs: Vec<usize> = (0..self.blobs.len())
            .filter(|&b| self.blobs[b].provider.is_none())
            .collect();
        let output_blobs: Vec<usize> = (0..self.blobs.len())
            .filter(|&b| self.blobs[b].consumers == 0)
            .collect();
        log::info!("Net '{}': input blobs {:?}", self.name, self.blob_names(&input_blobs));
        log::info!("Net '{}': output blobs {:?}", self.name, self.blob_names(&output_blobs));

        let mut graph = Graph::new(num_layers, self.blobs.len());
        for (l, needs) in bound_needs.iter().enumerate() {
            for &b in needs {
                graph.add_edge(graph.blob_node(b), l);
            }
            for &b in &self.layers[l].provides {
                graph.add_edge(l, graph.blob_node(b));
            }
        }

        let order = graph.topological_order().map_err(|left| {
            let layers = left
                .into_iter()
                .filter(|&id| id < num_layers)
                .map(|l| self.layers[l].layer.name().to_string())
                .collect();
            BlobNetError::CycleDetected { layers }
        })?;

        // Backward flags, in topological order.
        let mut node_needs_backward = vec![false; graph.successors.len()];
        let mut propagate_down = vec![false; num_layers];
        for &id in &order {
            let from_predecessors = graph.predecessors[id]
                .iter()
                .any(|&p| node_needs_backward[p]);
            if id < num_layers {
                let layer = &self.layers[id].layer;
                let trains = !layer.parameters().is_empty() && !layer.is_frozen();
                node_needs_backward[id] = trains || from_predecessors;
                propagate_down[id] = from_predecessors;
            } else {
                node_needs_backward[id] = from_predecessors;
            }
        }
        let blob_needs_backward = node_needs_backward.split_off(num_layers);
        let layer_needs_backward = node_needs_backward;

        let layer_order: Vec<usize> = order.into_iter().filter(|&id| id < num_layers).collect();
        log::info!(
            "Net '{}': layer order {:?}",
            self.name,
            layer_order
                .iter()
                .map(|&l| self.layers[l].layer.name())
                .collect::<Vec<_>>()
        );

        let step = |l: usize| PlanStep {
            layer: l,
            inputs: bound_needs[l].iter().map(|&b| self.blobs[b].blob.clone()).collect(),
            outputs: self.layers[l]
                .provides
                .iter()
                .map(|&b| self.blobs[b].blob.clone())
                .collect(),
            propagate_down: propagate_down[l],
        };
        let forward: Vec<PlanStep> = layer_order.iter().map(|&l| step(l)).collect();
        // Loss layers report the objective from `backward`, they are always scheduled.
        let backward: Vec<PlanStep> = layer_order
            .iter()
            .rev()
            .filter(|&&l| layer_needs_backward[l] || self.layers[l].layer.kind() == LayerKind::Loss)
            .map(|&l| step(l))
            .collect();
        log::debug!(
            "Net '{}': forward plan {:?}",
            self.name,
            self.describe_plan(&forward, &bound_needs)
        );
        log::debug!(
            "Net '{}': backward plan {:?}",
            self.name,
            self.describe_plan(&backward, &bound_needs)
        );

        let parameters = layer_order
            .iter()
            .flat_map(|&l| self.layers[l].layer.parameters())
            .collect();

        Ok(Schedule {
            input_blobs,
            output_blobs,
            bound_needs,
            layer_needs_backward,
            blob_needs_backward,
            propagate_down,
            forward,
            backward,
            parameters,
        })
    }

    fn describe_plan(&self, plan: &[PlanStep], bound_needs: &[Vec<usize>]) -> Vec<String> {
        plan.iter()
            .map(|s| {
                format!(
                    "{}({:?} -> {:?}, propagate_down={})",
                    self.layers[s.layer].layer.name(),
                    self.blob_names(&bound_needs[s.layer]),
                    self.blob_names(&self.layers[s.layer].provides),
                    s.propagate_down
                )
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
