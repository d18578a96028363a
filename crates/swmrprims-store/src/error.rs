use std::path::PathBuf;

/// Errors that can occur in store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to create the store file.
    #[error("failed to create store {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to open the store file.
    #[error("failed to open store {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The store was opened for SWMR reading before the writer entered SWMR mode.
    #[error("store {path} is not in SWMR write mode")]
    NotSwmr { path: PathBuf },

    /// An I/O error occurred while accessing the store.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a store, or its header is damaged.
    #[error("invalid store format: {0}")]
    InvalidFormat(String),

    /// The requested dataset does not exist in the store.
    #[error("dataset {name:?} not found")]
    DatasetNotFound { name: String },

    /// A dataset was already declared in this store.
    #[error("dataset {name:?} already exists")]
    DatasetExists { name: String },

    /// A frame or chunk index lies beyond the dataset extent.
    #[error("index {index} out of bounds (extent {extent})")]
    OutOfBounds { index: usize, extent: usize },

    /// A buffer does not match the size the dataset layout requires.
    #[error("buffer length mismatch (expected {expected}, got {actual})")]
    LengthMismatch { expected: usize, actual: usize },

    /// The requested dataset layout cannot be stored.
    #[error("invalid dataset layout: {0}")]
    InvalidLayout(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
