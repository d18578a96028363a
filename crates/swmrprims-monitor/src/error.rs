use swmrprims_frame::FrameError;
use swmrprims_store::StoreError;

/// Errors that can occur while writing or monitoring a dataset.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A frame could not be built or loaded.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The dataset's frame axes differ from the reference frame.
    #[error("dataset frame shape {actual:?} does not match reference shape {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// An operation was called out of order.
    #[error("cannot {operation} in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// No reference frame has been loaded.
    #[error("no reference frame loaded")]
    MissingReference,
}

pub type Result<T> = std::result::Result<T, MonitorError>;
