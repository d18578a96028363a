use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, StoreError};

/// Magic bytes: "SWMRSTOR".
pub const MAGIC: [u8; 8] = *b"SWMRSTOR";

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the fixed header part, before dims and name.
pub const FIXED_HEADER_SIZE: usize = 48;

/// Byte offset of the flags field.
pub(crate) const FLAGS_OFFSET: u64 = 12;

/// Byte offset of the published extent. 8-byte aligned so a single write
/// replaces it whole.
pub(crate) const EXTENT_OFFSET: u64 = 16;

/// Set once the writer has entered SWMR mode.
pub const FLAG_SWMR_WRITE: u32 = 1;

/// Set once a dataset has been declared.
pub const FLAG_DATASET: u32 = 1 << 1;

/// Size in bytes of one stored sample.
pub const SAMPLE_SIZE: usize = std::mem::size_of::<u32>();

const MAX_RANK: usize = 32;
const MAX_NAME_LEN: usize = 255;

/// Shape of an extensible dataset: fixed frame axes plus chunk depth along
/// the growing (leading) axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    /// Fixed axes, one frame.
    pub frame_shape: Vec<usize>,
    /// Frames per chunk along the growing axis.
    pub chunk_depth: usize,
}

impl DatasetLayout {
    pub fn new(frame_shape: impl Into<Vec<usize>>, chunk_depth: usize) -> Self {
        Self {
            frame_shape: frame_shape.into(),
            chunk_depth,
        }
    }

    /// Check that the layout describes a storable dataset.
    pub fn validate(&self) -> Result<()> {
        if self.frame_shape.is_empty() || self.frame_shape.len() > MAX_RANK {
            return Err(StoreError::InvalidLayout(format!(
                "frame rank must be 1..={MAX_RANK}, got {}",
                self.frame_shape.len()
            )));
        }
        if self.frame_shape.contains(&0) {
            return Err(StoreError::InvalidLayout(format!(
                "zero-sized frame axis in {:?}",
                self.frame_shape
            )));
        }
        if self.chunk_depth == 0 || self.chunk_depth > u32::MAX as usize {
            return Err(StoreError::InvalidLayout(format!(
                "chunk depth must be 1..={}, got {}",
                u32::MAX,
                self.chunk_depth
            )));
        }
        self.frame_shape
            .iter()
            .try_fold(SAMPLE_SIZE, |acc, &dim| acc.checked_mul(dim))
            .and_then(|frame| frame.checked_mul(self.chunk_depth))
            .ok_or_else(|| StoreError::InvalidLayout("chunk size overflows".to_string()))?;
        Ok(())
    }

    /// Samples per frame.
    pub fn frame_len(&self) -> usize {
        self.frame_shape.iter().product()
    }

    /// Bytes per frame.
    pub fn frame_bytes(&self) -> usize {
        self.frame_len() * SAMPLE_SIZE
    }

    /// Bytes per chunk.
    pub fn chunk_bytes(&self) -> usize {
        self.frame_bytes() * self.chunk_depth
    }
}

/// Decoded store header.
///
/// ```text
/// ┌────────────┬─────────┬───────┬────────────┬─────────┬──────┐
/// │ Magic (8B) │ Version │ Flags │ Extent     │ Chunk   │ Rank │
/// │ "SWMRSTOR" │ (4B LE) │ (4B)  │ (8B LE)    │ (4B LE) │ (4B) │
/// ├────────────┴─────────┼───────┴────────────┼─────────┴──────┤
/// │ Data offset (8B LE)  │ Name len (4B LE)   │ Reserved (4B)  │
/// ├──────────────────────┴────────────────────┴────────────────┤
/// │ Dims (Rank × 8B LE) │ Name (Name len bytes, UTF-8)         │
/// └─────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub flags: u32,
    pub extent: u64,
    pub data_offset: u64,
    pub name: String,
    pub layout: Option<DatasetLayout>,
}

impl Header {
    /// Header of a freshly created store with no dataset.
    pub fn empty() -> Self {
        Self {
            flags: 0,
            extent: 0,
            data_offset: 0,
            name: String::new(),
            layout: None,
        }
    }

    /// Header of a store holding one declared dataset. Frame data starts at
    /// the first multiple of `alignment` past the header.
    pub fn with_dataset(name: &str, layout: DatasetLayout, alignment: u64) -> Result<Self> {
        layout.validate()?;
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(StoreError::InvalidLayout(format!(
                "dataset name must be 1..={MAX_NAME_LEN} bytes"
            )));
        }
        let mut header = Self {
            flags: FLAG_DATASET,
            extent: 0,
            data_offset: 0,
            name: name.to_string(),
            layout: Some(layout),
        };
        header.data_offset = align_up(header.encoded_len() as u64, alignment.max(1));
        Ok(header)
    }

    pub fn is_swmr(&self) -> bool {
        self.flags & FLAG_SWMR_WRITE != 0
    }

    pub fn encoded_len(&self) -> usize {
        let rank = self.layout.as_ref().map_or(0, |l| l.frame_shape.len());
        FIXED_HEADER_SIZE + rank * 8 + self.name.len()
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let (chunk_depth, dims): (usize, &[usize]) = match &self.layout {
            Some(layout) => (layout.chunk_depth, &layout.frame_shape),
            None => (0, &[]),
        };
        dst.reserve(self.encoded_len());
        dst.put_slice(&MAGIC);
        dst.put_u32_le(FORMAT_VERSION);
        dst.put_u32_le(self.flags);
        dst.put_u64_le(self.extent);
        dst.put_u32_le(chunk_depth as u32);
        dst.put_u32_le(dims.len() as u32);
        dst.put_u64_le(self.data_offset);
        dst.put_u32_le(self.name.len() as u32);
        dst.put_u32_le(0);
        for &dim in dims {
            dst.put_u64_le(dim as u64);
        }
        dst.put_slice(self.name.as_bytes());
    }

    /// Length of the variable part that follows a fixed header.
    pub fn tail_len(fixed: &[u8]) -> Result<usize> {
        check_fixed(fixed)?;
        let rank = (&fixed[28..32]).get_u32_le() as usize;
        let name_len = (&fixed[40..44]).get_u32_le() as usize;
        if rank > MAX_RANK || name_len > MAX_NAME_LEN {
            return Err(StoreError::InvalidFormat(format!(
                "header out of range (rank {rank}, name length {name_len})"
            )));
        }
        Ok(rank * 8 + name_len)
    }

    pub fn decode(mut src: &[u8]) -> Result<Self> {
        check_fixed(src)?;
        src.advance(MAGIC.len() + 4);
        let flags = src.get_u32_le();
        let extent = src.get_u64_le();
        let chunk_depth = src.get_u32_le() as usize;
        let rank = src.get_u32_le() as usize;
        let data_offset = src.get_u64_le();
        let name_len = src.get_u32_le() as usize;
        src.advance(4);

        if src.remaining() < rank * 8 + name_len {
            return Err(StoreError::InvalidFormat("truncated header".to_string()));
        }
        let frame_shape: Vec<usize> = (0..rank).map(|_| src.get_u64_le() as usize).collect();
        let name = std::str::from_utf8(&src[..name_len])
            .map_err(|_| StoreError::InvalidFormat("dataset name is not UTF-8".to_string()))?
            .to_string();

        let layout = if flags & FLAG_DATASET != 0 {
            let layout = DatasetLayout {
                frame_shape,
                chunk_depth,
            };
            layout
                .validate()
                .map_err(|err| StoreError::InvalidFormat(err.to_string()))?;
            Some(layout)
        } else {
            None
        };

        Ok(Self {
            flags,
            extent,
            data_offset,
            name,
            layout,
        })
    }
}

fn check_fixed(fixed: &[u8]) -> Result<()> {
    if fixed.len() < FIXED_HEADER_SIZE {
        return Err(StoreError::InvalidFormat("truncated header".to_string()));
    }
    if fixed[0..8] != MAGIC {
        return Err(StoreError::InvalidFormat(
            "invalid store magic (expected \"SWMRSTOR\")".to_string(),
        ));
    }
    let version = (&fixed[8..12]).get_u32_le();
    if version != FORMAT_VERSION {
        return Err(StoreError::InvalidFormat(format!(
            "unsupported format version {version}"
        )));
    }
    Ok(())
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}
