use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, info, trace, warn};

use crate::cache::{ChunkCache, DirtyRun};
use crate::error::{Result, StoreError};
use crate::header::{
    DatasetLayout, Header, EXTENT_OFFSET, FIXED_HEADER_SIZE, FLAGS_OFFSET, FLAG_SWMR_WRITE,
};
use crate::traits::{DatasetSink, DatasetSource};

/// Default file-space alignment of the frame data region.
pub const DEFAULT_ALIGNMENT: u64 = 4096;

/// Default chunk cache size: 1 MiB.
pub const DEFAULT_CHUNK_CACHE_BYTES: usize = 1024 * 1024;

/// Options applied when creating a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Alignment of the frame data region. Default: 4096.
    pub alignment: u64,
    /// `sync_data` around every extent publication. Default: off, which
    /// still gives cross-process visibility through the page cache.
    pub sync_on_flush: bool,
    /// Chunk cache size for datasets created without an explicit size.
    pub chunk_cache_bytes: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
            sync_on_flush: false,
            chunk_cache_bytes: DEFAULT_CHUNK_CACHE_BYTES,
        }
    }
}

/// Writer-side handle on a store file.
///
/// Creating a store truncates any existing file. The store holds at most one
/// dataset.
pub struct FileStore {
    file: File,
    path: PathBuf,
    options: StoreOptions,
    header: Header,
}

impl FileStore {
    /// Create (or truncate) a store at `path`.
    pub fn create(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| StoreError::Create {
                path: path.clone(),
                source,
            })?;

        let header = Header::empty();
        write_header(&file, &header).map_err(|source| StoreError::Create {
            path: path.clone(),
            source,
        })?;

        info!(?path, alignment = options.alignment, "created store");
        Ok(Self {
            file,
            path,
            options,
            header,
        })
    }

    /// Path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`FileStore::start_swmr_write`] has been called.
    pub fn is_swmr(&self) -> bool {
        self.header.is_swmr()
    }

    /// Declare the store's extensible dataset with the default chunk cache.
    pub fn create_dataset(&mut self, name: &str, layout: DatasetLayout) -> Result<FileDataset> {
        let cache_bytes = self.options.chunk_cache_bytes;
        self.create_dataset_with_cache(name, layout, cache_bytes)
    }

    /// Declare the store's extensible dataset `[unbounded, ...frame_shape]`
    /// with a chunk cache of `chunk_cache_bytes`.
    pub fn create_dataset_with_cache(
        &mut self,
        name: &str,
        layout: DatasetLayout,
        chunk_cache_bytes: usize,
    ) -> Result<FileDataset> {
        if self.header.layout.is_some() {
            return Err(StoreError::DatasetExists {
                name: self.header.name.clone(),
            });
        }

        let mut header = Header::with_dataset(name, layout.clone(), self.options.alignment)?;
        header.flags |= self.header.flags;
        write_header(&self.file, &header)?;
        self.header = header;

        let cache = ChunkCache::new(chunk_cache_bytes, layout.frame_bytes(), layout.chunk_depth);
        debug!(
            name,
            frame_shape = ?layout.frame_shape,
            chunk_depth = layout.chunk_depth,
            cache_chunks = cache.max_chunks(),
            "declared dataset"
        );

        Ok(FileDataset {
            file: self.file.try_clone()?,
            name: name.to_string(),
            data_offset: self.header.data_offset,
            layout,
            extent: 0,
            published: 0,
            cache,
            sync_on_flush: self.options.sync_on_flush,
            closed: false,
        })
    }

    /// Enter SWMR write mode. Readers may open the store from here on.
    pub fn start_swmr_write(&mut self) -> Result<()> {
        self.header.flags |= FLAG_SWMR_WRITE;
        write_at(&self.file, FLAGS_OFFSET, &self.header.flags.to_le_bytes())?;
        self.file.sync_data()?;
        info!(path = ?self.path, "store in SWMR write mode");
        Ok(())
    }

    /// Sync and close the store file.
    pub fn close(self) -> Result<()> {
        self.file.sync_all()?;
        debug!(path = ?self.path, "closed store");
        Ok(())
    }
}

/// Writer handle on the store's dataset.
///
/// Dropping an unclosed handle writes back staged frames but leaves the
/// published extent at the last [`DatasetSink::flush`].
pub struct FileDataset {
    file: File,
    name: String,
    layout: DatasetLayout,
    data_offset: u64,
    extent: usize,
    published: usize,
    cache: ChunkCache,
    sync_on_flush: bool,
    closed: bool,
}

impl FileDataset {
    /// Dataset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dataset layout.
    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Extent readers can currently see.
    pub fn published_extent(&self) -> usize {
        self.published
    }

    /// Flush and release the handle.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.flush()
    }

    fn write_runs(&self, runs: Vec<DirtyRun>) -> Result<()> {
        for run in runs {
            write_at(&self.file, self.data_offset + run.offset as u64, &run.bytes)?;
        }
        Ok(())
    }
}

impl DatasetSink for FileDataset {
    fn extent(&self) -> usize {
        self.extent
    }

    fn set_extent(&mut self, frames: usize) -> Result<()> {
        trace!(from = self.extent, to = frames, "set extent");
        self.extent = frames;
        Ok(())
    }

    fn write_frame(&mut self, index: usize, data: &[u32]) -> Result<()> {
        if data.len() != self.layout.frame_len() {
            return Err(StoreError::LengthMismatch {
                expected: self.layout.frame_len(),
                actual: data.len(),
            });
        }
        if index >= self.extent {
            return Err(StoreError::OutOfBounds {
                index,
                extent: self.extent,
            });
        }

        let mut buf = BytesMut::with_capacity(self.layout.frame_bytes());
        for &sample in data {
            buf.put_u32_le(sample);
        }
        let evicted = self.cache.stage(index, &buf);
        self.write_runs(evicted)
    }

    fn write_chunk(&mut self, chunk_index: usize, raw: &[u8]) -> Result<()> {
        let frame_bytes = self.layout.frame_bytes();
        if raw.is_empty() || raw.len() % frame_bytes != 0 || raw.len() > self.layout.chunk_bytes()
        {
            return Err(StoreError::LengthMismatch {
                expected: self.layout.chunk_bytes(),
                actual: raw.len(),
            });
        }
        let first = chunk_index * self.layout.chunk_depth;
        let last = first + raw.len() / frame_bytes - 1;
        if last >= self.extent {
            return Err(StoreError::OutOfBounds {
                index: last,
                extent: self.extent,
            });
        }

        let evicted = self.cache.stage(first, raw);
        self.write_runs(evicted)
    }

    fn flush(&mut self) -> Result<()> {
        let runs = self.cache.drain();
        self.write_runs(runs)?;
        if self.sync_on_flush {
            self.file.sync_data()?;
        }
        // Publish only after the frame data is in the file.
        write_at(&self.file, EXTENT_OFFSET, &(self.extent as u64).to_le_bytes())?;
        if self.sync_on_flush {
            self.file.sync_data()?;
        }
        self.published = self.extent;
        trace!(extent = self.extent, "flushed dataset");
        Ok(())
    }
}

impl Drop for FileDataset {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let runs = self.cache.drain();
        if let Err(err) = self.write_runs(runs) {
            warn!(name = %self.name, %err, "write-back on drop failed");
        }
        if self.extent != self.published {
            debug!(
                name = %self.name,
                extent = self.extent,
                published = self.published,
                "dropped with unpublished frames"
            );
        }
    }
}

/// Read handle on a store's dataset.
pub struct DatasetReader {
    file: File,
    path: PathBuf,
    name: String,
    layout: DatasetLayout,
    data_offset: u64,
    frames: usize,
    swmr: bool,
    scratch: Vec<u8>,
}

impl DatasetReader {
    /// Open `name` for concurrent reading while a writer appends.
    ///
    /// Fails with [`StoreError::NotSwmr`] unless the writer has entered SWMR
    /// write mode.
    pub fn open_swmr(path: impl AsRef<Path>, name: &str) -> Result<Self> {
        let reader = Self::open(path.as_ref(), name)?;
        if !reader.swmr {
            return Err(StoreError::NotSwmr { path: reader.path });
        }
        debug!(path = ?reader.path, name, frames = reader.frames, "opened store (SWMR read)");
        Ok(reader)
    }

    /// Open `name` read-only, regardless of SWMR state.
    pub fn open_read_only(path: impl AsRef<Path>, name: &str) -> Result<Self> {
        let reader = Self::open(path.as_ref(), name)?;
        debug!(path = ?reader.path, name, frames = reader.frames, "opened store (read-only)");
        Ok(reader)
    }

    fn open(path: &Path, name: &str) -> Result<Self> {
        let file = File::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut fixed = [0u8; FIXED_HEADER_SIZE];
        read_at(&file, 0, &mut fixed).map_err(truncated_header)?;
        let mut raw = fixed.to_vec();
        raw.resize(FIXED_HEADER_SIZE + Header::tail_len(&fixed)?, 0);
        read_at(&file, FIXED_HEADER_SIZE as u64, &mut raw[FIXED_HEADER_SIZE..])
            .map_err(truncated_header)?;
        let header = Header::decode(&raw)?;

        let layout = match header.layout {
            Some(layout) if header.name == name => layout,
            _ => {
                return Err(StoreError::DatasetNotFound {
                    name: name.to_string(),
                })
            }
        };

        Ok(Self {
            file,
            path: path.to_path_buf(),
            name: header.name,
            scratch: vec![0u8; layout.frame_bytes()],
            layout,
            data_offset: header.data_offset,
            frames: header.extent as usize,
            swmr: header.flags & FLAG_SWMR_WRITE != 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Frame count as of the last refresh.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Whether the writer had entered SWMR mode at open or last refresh.
    pub fn is_swmr(&self) -> bool {
        self.swmr
    }
}

impl DatasetSource for DatasetReader {
    fn refresh(&mut self) -> Result<()> {
        let mut buf = [0u8; 12];
        read_at(&self.file, FLAGS_OFFSET, &mut buf)?;
        let mut src = &buf[..];
        let flags = src.get_u32_le();
        let frames = src.get_u64_le() as usize;
        if frames != self.frames {
            trace!(from = self.frames, to = frames, "refreshed extent");
        }
        self.swmr = flags & FLAG_SWMR_WRITE != 0;
        self.frames = frames;
        Ok(())
    }

    fn extent(&self) -> Vec<usize> {
        let mut extent = Vec::with_capacity(self.layout.frame_shape.len() + 1);
        extent.push(self.frames);
        extent.extend_from_slice(&self.layout.frame_shape);
        extent
    }

    fn read_frame(&mut self, index: usize, out: &mut [u32]) -> Result<()> {
        if out.len() != self.layout.frame_len() {
            return Err(StoreError::LengthMismatch {
                expected: self.layout.frame_len(),
                actual: out.len(),
            });
        }
        if index >= self.frames {
            return Err(StoreError::OutOfBounds {
                index,
                extent: self.frames,
            });
        }

        let offset = self.data_offset + (index * self.layout.frame_bytes()) as u64;
        read_at(&self.file, offset, &mut self.scratch)?;
        let mut src = &self.scratch[..];
        for sample in out.iter_mut() {
            *sample = src.get_u32_le();
        }
        Ok(())
    }
}

fn write_header(file: &File, header: &Header) -> std::io::Result<()> {
    let mut buf = BytesMut::new();
    header.encode(&mut buf);
    write_at(file, 0, &buf)
}

fn write_at(mut file: &File, offset: u64, buf: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(buf)
}

fn read_at(mut file: &File, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}

fn truncated_header(err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::UnexpectedEof {
        StoreError::InvalidFormat("truncated header".to_string())
    } else {
        StoreError::Io(err)
    }
}
