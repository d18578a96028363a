//! Single-writer/multiple-reader frame streaming.
//!
//! [`SwmrWriter`] appends copies of a reference frame to an extensible
//! dataset, publishing them with a flush every `chunk_depth` frames.
//! [`SwmrReader`] polls the same store, reads the newest frame whenever the
//! published count advances and compares it against its own reference.
//!
//! The writer and readers share nothing but the store file:
//!
//! ```text
//! writer: set_extent ─► write ─► flush        (publishes count)
//! reader:            refresh ─► extent ─► read newest ─► compare
//! ```

pub mod clock;
pub mod error;
pub mod poll;
pub mod reader;
pub mod stats;
pub mod writer;

pub use clock::{Clock, ManualClock, Stopwatch, SystemClock};
pub use error::{MonitorError, Result};
pub use poll::{next_action, PollInput, PollState, Step, StopReason};
pub use reader::{MonitorConfig, MonitorObserver, ReadReport, ReaderState, SwmrReader};
pub use stats::{FlushStats, WriteReport};
pub use writer::{
    ReferenceSource, SwmrWriter, WriteOptions, WriterConfig, WriterState, MAX_CHUNK_CACHE_BYTES,
};
