// Compute, data-source and split layers.

pub mod flatten;
pub mod inner_product;
pub mod ndarray_data;
pub mod relu;
pub mod split;

pub use flatten::{FlattenConfig, FlattenLayer};
pub use inner_product::{InnerProductConfig, InnerProductLayer};
pub use ndarray_data::{NdarrayDataConfig, NdarrayDataLayer};
pub use relu::{ReluConfig, ReluLayer};
pub use split::{SplitConfig, SplitLayer};
