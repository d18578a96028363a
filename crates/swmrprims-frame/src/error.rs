use swmrprims_store::StoreError;

/// Errors that can occur when building frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The shape is empty or has a zero-sized axis.
    #[error("invalid frame shape {shape:?}")]
    InvalidShape { shape: Vec<usize> },

    /// The data length does not match the product of the shape.
    #[error("frame data length mismatch (shape requires {expected}, got {actual})")]
    LengthMismatch { expected: usize, actual: usize },

    /// The stored dataset has the wrong number of axes.
    #[error("dataset rank mismatch (expected {expected}, got {actual})")]
    RankMismatch { expected: usize, actual: usize },

    /// The stored dataset holds no frames.
    #[error("dataset {name:?} holds no frames")]
    EmptyDataset { name: String },

    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
