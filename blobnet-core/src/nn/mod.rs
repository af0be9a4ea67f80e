// Layer contract, fillers and the shipped layers.

pub mod init;
pub mod layer;
pub mod layers;
pub mod losses;

pub use init::Filler;
pub use layer::{Layer, LayerKind};
pub use layers::{
    FlattenLayer, InnerProductConfig, InnerProductLayer, NdarrayDataLayer, ReluLayer, SplitConfig,
    SplitLayer,
};
pub use losses::{SquaredLossConfig, SquaredLossLayer};
