use super::traits::Sampler;

/// Visits records in storage order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialSampler;

impl SequentialSampler {
    pub fn new() -> Self {
        SequentialSampler
    }
}

impl Sampler for SequentialSampler {
    fn iter(&self, num_records: usize) -> Box<dyn Iterator<Item = usize> + Send + Sync> {
        Box::new(0..num_records)
    }

    fn len(&self, num_records: usize) -> usize {
        num_records
    }
}

#[cfg(test)]
#[path = "sequential_sampler_test.rs"]
mod tests;
