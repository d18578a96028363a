//! Single-writer/multiple-reader frame streaming over a chunked file store.
//!
//! One writer appends fixed-shape frames to an extensible dataset while any
//! number of readers poll it, read the newest frame and verify it. Visibility
//! rests on two store primitives only: the writer's flush and the reader's
//! refresh. There are no locks.
//!
//! # Crate Structure
//!
//! - [`store`]: file-backed extensible chunked array store
//! - [`frame`]: owned and borrowed `u32` frames, embedded test images
//! - [`monitor`]: writer, polling reader and their reports (behind `monitor` feature)

/// Re-export store types.
pub mod store {
    pub use swmrprims_store::*;
}

/// Re-export frame types.
pub mod frame {
    pub use swmrprims_frame::*;
}

/// Re-export writer and reader types (requires `monitor` feature).
#[cfg(feature = "monitor")]
pub mod monitor {
    pub use swmrprims_monitor::*;
}
