//! File-backed extensible chunked array store.
//!
//! Provides the storage collaborator the SWMR protocol is built on:
//! - One dataset per file, `u32` samples, leading axis unbounded
//! - Frame data staged through a write-back chunk cache
//! - The dataset extent is published only by [`DatasetSink::flush`]
//! - Readers see new frames only after [`DatasetSource::refresh`]
//!
//! There are no locks. A reader never observes an extent before the frame
//! data it covers has reached the file.

pub mod cache;
pub mod error;
pub mod file;
pub mod header;
pub mod traits;

pub use cache::ChunkCache;
pub use error::{Result, StoreError};
pub use file::{DatasetReader, FileDataset, FileStore, StoreOptions};
pub use header::{DatasetLayout, FORMAT_VERSION, MAGIC};
pub use traits::{DatasetSink, DatasetSource};
