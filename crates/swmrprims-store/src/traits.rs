use crate::error::Result;

/// Writer-side view of an extensible dataset.
///
/// Growing axis is axis 0, one unit per frame. Nothing written through a
/// sink becomes visible to readers until [`DatasetSink::flush`] returns.
pub trait DatasetSink {
    /// Current (possibly unpublished) extent of the growing axis.
    fn extent(&self) -> usize;

    /// Grow or shrink the growing axis to `frames`.
    fn set_extent(&mut self, frames: usize) -> Result<()>;

    /// Write one frame at `index` through the chunk cache.
    fn write_frame(&mut self, index: usize, data: &[u32]) -> Result<()>;

    /// Write raw little-endian chunk bytes at `chunk_index`, bypassing sample
    /// conversion. `raw` holds whole frames, at most one chunk's worth.
    fn write_chunk(&mut self, chunk_index: usize, raw: &[u8]) -> Result<()>;

    /// Write back cached chunks and publish the current extent.
    fn flush(&mut self) -> Result<()>;
}

/// Reader-side view of a dataset.
pub trait DatasetSource {
    /// Re-synchronize the cached extent with the last flushed state.
    fn refresh(&mut self) -> Result<()>;

    /// Current extent as of the last refresh: `[frames, ...frame_shape]`.
    fn extent(&self) -> Vec<usize>;

    /// Read the frame at `index` into `out`.
    fn read_frame(&mut self, index: usize, out: &mut [u32]) -> Result<()>;
}

impl<T: DatasetSource + ?Sized> DatasetSource for Box<T> {
    fn refresh(&mut self) -> Result<()> {
        (**self).refresh()
    }

    fn extent(&self) -> Vec<usize> {
        (**self).extent()
    }

    fn read_frame(&mut self, index: usize, out: &mut [u32]) -> Result<()> {
        (**self).read_frame(index, out)
    }
}
