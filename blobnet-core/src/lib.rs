//! A small neural network execution engine.
//!
//! Layers are wired together through named [`Blob`]s inside a [`Net`], which
//! resolves fan-out, orders the layers and replays forward and backward plans.

pub mod blob;
pub mod buffer;
pub mod error;
pub mod net;
pub mod nn;
pub mod optim;
pub mod tensor;
pub mod types;

pub use blob::Blob;
pub use error::BlobNetError;
pub use net::{BlobNames, LayerRegistry, Net, SaveMode};
pub use nn::{Filler, Layer, LayerKind};
pub use optim::{L2Regularizer, Regularizer, SgdConfig, SgdSolver, Solver};
pub use tensor::{Tensor, TensorRecord};
pub use types::DType;
