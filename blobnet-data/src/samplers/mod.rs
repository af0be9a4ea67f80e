//! Record visiting orders for in-memory data sources.

pub mod random_sampler;
pub mod sequential_sampler;
pub mod traits;

pub use random_sampler::RandomSampler;
pub use sequential_sampler::SequentialSampler;
pub use traits::Sampler;

use serde::{Deserialize, Serialize};

/// Serializable choice of sampler, as stored in a data layer's config.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SamplerConfig {
    #[default]
    Sequential,
    Random {
        #[serde(default)]
        replacement: bool,
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl SamplerConfig {
    pub fn build(&self) -> Box<dyn Sampler> {
        match self {
            SamplerConfig::Sequential => Box::new(SequentialSampler::new()),
            SamplerConfig::Random { replacement, seed } => {
                Box::new(RandomSampler::new(*replacement, *seed))
            }
        }
    }
}
