//! Optimization loop over a finished [`Net`](crate::net::Net).
//!
//! A [`Solver`] drives `forward_backward`, turns every parameter gradient
//! into the step to subtract, then lets the net apply it. A [`Regularizer`]
//! adds its penalty gradient in place before the step is computed.

pub mod regularizer;
pub mod sgd;

pub use regularizer::{L2Regularizer, Regularizer};
pub use sgd::{SgdConfig, SgdSolver};

use crate::error::BlobNetError;
use crate::net::Net;

/// Trains a net. Returns the loss of the last iteration.
pub trait Solver: std::fmt::Debug {
    fn solve(&mut self, net: &mut Net) -> Result<f64, BlobNetError>;
}
