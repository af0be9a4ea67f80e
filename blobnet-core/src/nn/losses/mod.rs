pub mod squared;

pub use squared::{SquaredLossConfig, SquaredLossLayer};
