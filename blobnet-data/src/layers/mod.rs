//! Data-source layers backed by this crate's samplers and record store.

pub mod store_data;
pub mod tensor_data;

pub use store_data::{StoreDataConfig, StoreDataLayer};
pub use tensor_data::{TensorDataConfig, TensorDataLayer};
