//! Fixed-shape `u32` frames for SWMR streaming.
//!
//! A frame is one image-like sample of the growing dataset:
//! - [`Frame`] owns its buffer
//! - [`FrameView`] borrows a caller-owned buffer and shape
//!
//! Both compare equal only when shapes match exactly and every element
//! matches positionally.

pub mod codec;
pub mod error;
pub mod frame;
pub mod testdata;

pub use codec::{decode_samples, encode_samples};
pub use error::{FrameError, Result};
pub use frame::{Frame, FrameView};
