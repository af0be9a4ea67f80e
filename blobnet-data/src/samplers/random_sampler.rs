use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::traits::Sampler;

/// Visits records in a random order: a fresh permutation per epoch, or
/// independent draws when sampling with replacement.
#[derive(Debug)]
pub struct RandomSampler {
    replacement: bool,
    rng: Mutex<StdRng>,
}

impl RandomSampler {
    /// `seed` makes the sequence of epochs reproducible.
    pub fn new(replacement: bool, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RandomSampler {
            replacement,
            rng: Mutex::new(rng),
        }
    }

    pub fn replacement(&self) -> bool {
        self.replacement
    }
}

impl Sampler for RandomSampler {
    fn iter(&self, num_records: usize) -> Box<dyn Iterator<Item = usize> + Send + Sync> {
        if num_records == 0 {
            return Box::new(std::iter::empty());
        }
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("RandomSampler rng mutex was poisoned. Recovering.");
                poisoned.into_inner()
            }
        };
        let indices: Vec<usize> = if self.replacement {
            (0..num_records)
                .map(|_| rng.gen_range(0..num_records))
                .collect()
        } else {
            let mut indices: Vec<usize> = (0..num_records).collect();
            indices.shuffle(&mut *rng);
            indices
        };
        Box::new(indices.into_iter())
    }

    fn len(&self, num_records: usize) -> usize {
        num_records
    }
}

#[cfg(test)]
#[path = "random_sampler_test.rs"]
mod tests;
