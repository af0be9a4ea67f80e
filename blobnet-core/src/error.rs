use crate::types::DType;
use thiserror::Error;

/// Custom error type for the blobnet workspace.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum BlobNetError {
    // --- Graph configuration ---
    #[error("A name already exists in the net: {name}")]
    NameCollision { name: String },

    #[error("Blob name '{name}' is already used as a layer name")]
    BlobNameIsLayer { name: String },

    #[error("Blob '{blob}' is already provided by layer '{provider}', cannot be provided by '{layer}'")]
    DuplicateProvider {
        blob: String,
        provider: String,
        layer: String,
    },

    #[error("Cycle detected in the net graph, unscheduled layers: {layers:?}")]
    CycleDetected { layers: Vec<String> },

    #[error("Invalid configuration for layer '{layer}': {reason}")]
    InvalidLayerConfig { layer: String, reason: String },

    #[error("No layer type registered under '{0}'")]
    UnknownLayerType(String),

    #[error("Invalid solver configuration: {reason}")]
    InvalidSolverConfig { reason: String },

    // --- Usage ---
    #[error("Backward called on data-source layer '{layer}'")]
    BackwardOnDataLayer { layer: String },

    #[error("The net must be finished before {operation}")]
    NotFinalized { operation: String },

    #[error("The net has unresolved input blobs {blobs:?}. Did you mean predict()?")]
    UnresolvedInputs { blobs: Vec<String> },

    #[error("Value must be initialized before {operation}")]
    ValueNotInitialized { operation: String },

    #[error("Gradient must be initialized before {operation}")]
    GradientNotInitialized { operation: String },

    #[error("Unknown blob: {0}")]
    UnknownBlob(String),

    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    #[error("Layer '{layer}' expects {expected} {role} blob(s), got {actual}")]
    ArityMismatch {
        layer: String,
        role: String,
        expected: usize,
        actual: usize,
    },

    // --- Tensors ---
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Data type mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    DataTypeMismatch {
        expected: DType,
        actual: DType,
        operation: String,
    },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Failed to acquire {lock_type} lock: {reason}")]
    LockError { lock_type: String, reason: String },

    // --- Record store ---
    #[error("Record count mismatch in '{path}': metadata says {expected}, file holds {actual}")]
    RecordCountMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid record range [{start}, {end}) for a store of {num_records} records")]
    InvalidRange {
        start: usize,
        end: usize,
        num_records: usize,
    },

    #[error("Record index {index} lies outside the open range [{start}, {end})")]
    OutOfRange {
        index: usize,
        start: usize,
        end: usize,
    },

    #[error("Not enough records to read: count {count}, limit {limit}")]
    NotEnoughRecords { count: usize, limit: usize },

    #[error(
        "Record invalid with previous writes: previous {expected_shape:?} {expected_dtype:?}, current {actual_shape:?} {actual_dtype:?}"
    )]
    InconsistentRecord {
        expected_shape: Vec<usize>,
        expected_dtype: DType,
        actual_shape: Vec<usize>,
        actual_dtype: DType,
    },

    #[error("Nothing was written to store '{0}'")]
    EmptyStore(String),

    #[error("I/O error: {0}")]
    Io(String),

    // --- Persistence ---
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for BlobNetError {
    fn from(err: std::io::Error) -> Self {
        BlobNetError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BlobNetError {
    fn from(err: serde_json::Error) -> Self {
        BlobNetError::Serialization(err.to_string())
    }
}
