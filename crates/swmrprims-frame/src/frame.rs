use std::fmt;
use std::path::Path;

use swmrprims_store::{DatasetReader, DatasetSource};
use tracing::debug;

use crate::codec::decode_samples;
use crate::error::{FrameError, Result};
use crate::testdata::{IMAGE_SHAPE, REFERENCE_IMAGE};

/// An owned fixed-shape frame of `u32` samples.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    shape: Vec<usize>,
    data: Vec<u32>,
}

/// A frame borrowed from a caller-owned buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    shape: &'a [usize],
    data: &'a [u32],
}

fn check_shape(shape: &[usize], len: usize) -> Result<()> {
    if shape.is_empty() || shape.contains(&0) {
        return Err(FrameError::InvalidShape {
            shape: shape.to_vec(),
        });
    }
    let expected = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| FrameError::InvalidShape {
            shape: shape.to_vec(),
        })?;
    if expected != len {
        return Err(FrameError::LengthMismatch {
            expected,
            actual: len,
        });
    }
    Ok(())
}

impl Frame {
    /// Take ownership of `data` as a frame of `shape`.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<u32>) -> Result<Self> {
        let shape = shape.into();
        check_shape(&shape, data.len())?;
        Ok(Self { shape, data })
    }

    /// Copy `data` into a new frame of `shape`.
    pub fn from_slice(shape: impl Into<Vec<usize>>, data: &[u32]) -> Result<Self> {
        Self::new(shape, data.to_vec())
    }

    /// Decode little-endian samples into a new frame of `shape`.
    pub fn from_le_bytes(shape: impl Into<Vec<usize>>, bytes: &[u8]) -> Result<Self> {
        let shape = shape.into();
        let mut data = vec![0u32; bytes.len() / 4];
        decode_samples(bytes, &mut data)?;
        Self::new(shape, data)
    }

    /// The embedded 3×4 reference image.
    pub fn reference() -> Self {
        Self {
            shape: IMAGE_SHAPE.to_vec(),
            data: REFERENCE_IMAGE.to_vec(),
        }
    }

    /// Load the last frame of `dataset` in the store at `path`.
    ///
    /// The store is opened read-only. The dataset must have rank
    /// `image_rank + 1` and hold at least one frame.
    pub fn from_store(path: impl AsRef<Path>, dataset: &str, image_rank: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = DatasetReader::open_read_only(path, dataset)?;

        let extent = reader.extent();
        if extent.len() != image_rank + 1 {
            return Err(FrameError::RankMismatch {
                expected: image_rank + 1,
                actual: extent.len(),
            });
        }
        let frames = extent[0];
        if frames == 0 {
            return Err(FrameError::EmptyDataset {
                name: dataset.to_string(),
            });
        }

        let shape = extent[1..].to_vec();
        let mut data = vec![0u32; shape.iter().product()];
        reader.read_frame(frames - 1, &mut data)?;
        debug!(?path, dataset, ?shape, index = frames - 1, "loaded frame from store");
        Self::new(shape, data)
    }

    /// A zeroed buffer sized to hold one frame of this shape.
    pub fn allocate_buffer(&self) -> Vec<u32> {
        debug_assert!(!self.data.is_empty());
        vec![0u32; self.data.len()]
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the frame data in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len() * std::mem::size_of::<u32>()
    }

    pub fn as_view(&self) -> FrameView<'_> {
        FrameView {
            shape: &self.shape,
            data: &self.data,
        }
    }
}

impl<'a> FrameView<'a> {
    /// Borrow `data` as a frame of `shape`.
    pub fn new(shape: &'a [usize], data: &'a [u32]) -> Result<Self> {
        check_shape(shape, data.len())?;
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    pub fn data(&self) -> &'a [u32] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy into an owned frame.
    pub fn to_owned_frame(&self) -> Frame {
        Frame {
            shape: self.shape.to_vec(),
            data: self.data.to_vec(),
        }
    }
}

impl PartialEq<FrameView<'_>> for Frame {
    fn eq(&self, other: &FrameView<'_>) -> bool {
        self.as_view() == *other
    }
}

impl PartialEq<Frame> for FrameView<'_> {
    fn eq(&self, other: &Frame) -> bool {
        *self == other.as_view()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.as_view(), f)
    }
}

impl fmt::Debug for FrameView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 8;
        let mut s = f.debug_struct("Frame");
        s.field("shape", &self.shape);
        if self.data.len() <= PREVIEW {
            s.field("data", &self.data);
        } else {
            s.field("data", &format_args!("{:?}..", &self.data[..PREVIEW]));
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::SECOND_IMAGE;
    use std::path::PathBuf;
    use swmrprims_store::{DatasetLayout, DatasetSink, FileStore, StoreError, StoreOptions};

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "swmrframe-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    fn write_store(path: &Path, shape: &[usize], frames: &[&[u32]]) {
        let mut store = FileStore::create(path, StoreOptions::default()).unwrap();
        let mut dataset = store
            .create_dataset("data", DatasetLayout::new(shape, 1))
            .unwrap();
        for (i, frame) in frames.iter().enumerate() {
            dataset.set_extent(i + 1).unwrap();
            dataset.write_frame(i, frame).unwrap();
        }
        dataset.close().unwrap();
        store.close().unwrap();
    }

    #[test]
    fn shape_must_match_data() {
        assert!(Frame::new([3, 4], vec![0; 12]).is_ok());
        assert!(matches!(
            Frame::new([3, 4], vec![0; 11]),
            Err(FrameError::LengthMismatch {
                expected: 12,
                actual: 11
            })
        ));
        assert!(matches!(
            Frame::new(Vec::<usize>::new(), vec![]),
            Err(FrameError::InvalidShape { .. })
        ));
        assert!(matches!(
            Frame::new([3, 0], vec![]),
            Err(FrameError::InvalidShape { .. })
        ));
        assert!(FrameView::new(&[2, 2], &[1, 2, 3]).is_err());
    }

    #[test]
    fn equality_is_exact() {
        let a = Frame::reference();
        let b = Frame::from_slice([3, 4], &REFERENCE_IMAGE).unwrap();
        assert_eq!(a, b);

        let mut data = REFERENCE_IMAGE.to_vec();
        data[11] += 1;
        assert_ne!(a, Frame::new([3, 4], data).unwrap());
        assert_ne!(a, Frame::from_slice([3, 4], &SECOND_IMAGE).unwrap());
    }

    #[test]
    fn differing_shapes_are_unequal() {
        let a = Frame::reference();
        let b = Frame::from_slice([4, 3], &REFERENCE_IMAGE).unwrap();
        let c = Frame::from_slice([12], &REFERENCE_IMAGE).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn view_compares_with_owned() {
        let owned = Frame::reference();
        let shape = [3usize, 4];
        let buffer = REFERENCE_IMAGE;
        let view = FrameView::new(&shape, &buffer).unwrap();
        assert!(owned == view);
        assert!(view == owned);
        assert_eq!(view.to_owned_frame(), owned);

        let other = SECOND_IMAGE;
        assert!(FrameView::new(&shape, &other).unwrap() != owned);
    }

    #[test]
    fn from_le_bytes_decodes() {
        let mut bytes = Vec::new();
        for sample in REFERENCE_IMAGE {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        assert_eq!(Frame::from_le_bytes([3, 4], &bytes).unwrap(), Frame::reference());
        assert!(matches!(
            Frame::from_le_bytes([3, 4], &bytes[..47]),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn sizes_and_buffer() {
        let frame = Frame::reference();
        assert_eq!(frame.len(), 12);
        assert_eq!(frame.byte_len(), 48);
        assert_eq!(frame.shape(), &[3, 4]);
        assert_eq!(frame.allocate_buffer(), vec![0u32; 12]);
    }

    #[test]
    fn loads_last_frame_from_store() {
        let dir = unique_temp_dir("last");
        let path = dir.join("ref.dat");
        write_store(&path, &[3, 4], &[&REFERENCE_IMAGE, &SECOND_IMAGE]);

        let frame = Frame::from_store(&path, "data", 2).unwrap();
        assert_eq!(frame, Frame::from_slice([3, 4], &SECOND_IMAGE).unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn store_round_trip_of_reference() {
        let dir = unique_temp_dir("roundtrip");
        let path = dir.join("ref.dat");
        write_store(&path, &[3, 4], &[&REFERENCE_IMAGE]);

        assert_eq!(Frame::from_store(&path, "data", 2).unwrap(), Frame::reference());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_store_errors() {
        let dir = unique_temp_dir("errors");

        let flat = dir.join("flat.dat");
        write_store(&flat, &[12], &[&REFERENCE_IMAGE]);
        assert!(matches!(
            Frame::from_store(&flat, "data", 2),
            Err(FrameError::RankMismatch {
                expected: 3,
                actual: 2
            })
        ));

        let empty = dir.join("empty.dat");
        write_store(&empty, &[3, 4], &[]);
        assert!(matches!(
            Frame::from_store(&empty, "data", 2),
            Err(FrameError::EmptyDataset { .. })
        ));

        assert!(matches!(
            Frame::from_store(dir.join("missing.dat"), "data", 2),
            Err(FrameError::Store(StoreError::Open { .. }))
        ));
        assert!(matches!(
            Frame::from_store(&empty, "other", 2),
            Err(FrameError::Store(StoreError::DatasetNotFound { .. }))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
