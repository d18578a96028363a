use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::BytesMut;
use swmrprims_frame::{encode_samples, Frame};
use swmrprims_store::{DatasetLayout, DatasetSink, FileStore, StoreOptions};
use tracing::{debug, info, info_span, trace, Span};

use crate::clock::{Clock, Stopwatch, SystemClock};
use crate::error::{MonitorError, Result};
use crate::stats::{FlushStats, WriteReport};

/// Upper bound on the chunk cache a write run asks for: 256 MiB.
pub const MAX_CHUNK_CACHE_BYTES: usize = 256 * 1024 * 1024;

/// Rank of the frames the tools write and compare.
pub const IMAGE_RANK: usize = 2;

/// Where a reference frame comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReferenceSource {
    /// The embedded 3×4 test image.
    #[default]
    Embedded,
    /// The last frame of a dataset in another store.
    Store { path: PathBuf, dataset: String },
}

impl ReferenceSource {
    pub fn load(&self) -> Result<Frame> {
        match self {
            ReferenceSource::Embedded => Ok(Frame::reference()),
            ReferenceSource::Store { path, dataset } => {
                Ok(Frame::from_store(path, dataset, IMAGE_RANK)?)
            }
        }
    }
}

/// Writer configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Name of the dataset to create. Default: "data".
    pub dataset: String,
    pub store: StoreOptions,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            dataset: "data".to_string(),
            store: StoreOptions::default(),
        }
    }
}

/// Parameters of one write run.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Frames to append. Default: 2.
    pub iterations: usize,
    /// Frames per chunk, and per flush. Default: 1.
    pub chunk_depth: usize,
    /// Stage frames into whole chunks and write them raw.
    pub direct_chunk_write: bool,
    /// Pause after each frame. Default: 1 s.
    pub period: Duration,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            iterations: 2,
            chunk_depth: 1,
            direct_chunk_write: false,
            period: Duration::from_secs(1),
        }
    }
}

/// Lifecycle of a [`SwmrWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Created,
    FileOpen,
    DatasetCreated,
    SwmrActive,
    Finished,
}

impl WriterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriterState::Created => "created",
            WriterState::FileOpen => "file_open",
            WriterState::DatasetCreated => "dataset_created",
            WriterState::SwmrActive => "swmr_active",
            WriterState::Finished => "finished",
        }
    }
}

/// Appends copies of a reference frame to a new SWMR store.
///
/// ```no_run
/// use swmrprims_monitor::{ReferenceSource, SwmrWriter, WriteOptions, WriterConfig};
///
/// let mut writer = SwmrWriter::new("swmr.dat", WriterConfig::default());
/// writer.create_file()?;
/// writer.load_reference_frame(&ReferenceSource::Embedded)?;
/// let report = writer.write_frames(&WriteOptions::default())?;
/// println!("{} frames at {:.2} MB/s", report.frames, report.throughput_mb_s);
/// # Ok::<(), swmrprims_monitor::MonitorError>(())
/// ```
pub struct SwmrWriter<C: Clock + Clone = SystemClock> {
    path: PathBuf,
    config: WriterConfig,
    clock: C,
    span: Span,
    state: WriterState,
    store: Option<FileStore>,
    reference: Option<Frame>,
    report: Option<WriteReport>,
}

impl SwmrWriter<SystemClock> {
    pub fn new(path: impl AsRef<Path>, config: WriterConfig) -> Self {
        Self::with_clock(path, config, SystemClock)
    }
}

impl<C: Clock + Clone> SwmrWriter<C> {
    /// Create a writer that measures and sleeps with `clock`.
    pub fn with_clock(path: impl AsRef<Path>, config: WriterConfig, clock: C) -> Self {
        let path = path.as_ref().to_path_buf();
        let span = info_span!(
            "swmr_writer",
            path = %path.display(),
            dataset = %config.dataset
        );
        span.in_scope(|| debug!("writer created"));
        Self {
            path,
            config,
            clock,
            span,
            state: WriterState::Created,
            store: None,
            reference: None,
            report: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn reference(&self) -> Option<&Frame> {
        self.reference.as_ref()
    }

    /// Create (or truncate) the store file.
    pub fn create_file(&mut self) -> Result<()> {
        let _enter = self.span.enter();
        if self.state != WriterState::Created {
            return Err(MonitorError::InvalidState {
                operation: "create file",
                state: self.state.as_str(),
            });
        }
        info!("creating store file");
        self.store = Some(FileStore::create(&self.path, self.config.store.clone())?);
        self.state = WriterState::FileOpen;
        Ok(())
    }

    /// Load the frame every iteration will write.
    pub fn load_reference_frame(&mut self, source: &ReferenceSource) -> Result<()> {
        let _enter = self.span.enter();
        if self.state == WriterState::Finished {
            return Err(MonitorError::InvalidState {
                operation: "load reference frame",
                state: self.state.as_str(),
            });
        }
        let frame = source.load()?;
        debug!(?source, shape = ?frame.shape(), "loaded reference frame");
        self.reference = Some(frame);
        Ok(())
    }

    /// Run the write loop and return its report.
    ///
    /// Declares the dataset, enters SWMR mode, then for each iteration extends
    /// the dataset by one frame and writes it. Every `chunk_depth` frames are
    /// flushed together. A trailing partial chunk is flushed after the loop.
    /// The first store error aborts the run.
    pub fn write_frames(&mut self, options: &WriteOptions) -> Result<WriteReport> {
        let span = self.span.clone();
        let _enter = span.enter();

        if self.state != WriterState::FileOpen {
            return Err(MonitorError::InvalidState {
                operation: "write frames",
                state: self.state.as_str(),
            });
        }
        let reference = self.reference.clone().ok_or(MonitorError::MissingReference)?;
        let Some(store) = self.store.as_mut() else {
            return Err(MonitorError::InvalidState {
                operation: "write frames",
                state: self.state.as_str(),
            });
        };

        let layout = DatasetLayout::new(reference.shape(), options.chunk_depth);
        layout.validate()?;
        let depth = options.chunk_depth;
        let chunks = options.iterations.div_ceil(depth).max(1);
        let cache_bytes = chunks
            .saturating_mul(layout.chunk_bytes())
            .min(MAX_CHUNK_CACHE_BYTES);

        debug!(chunk_depth = depth, cache_bytes, "creating dataset");
        let mut dataset =
            store.create_dataset_with_cache(&self.config.dataset, layout, cache_bytes)?;
        self.state = WriterState::DatasetCreated;

        store.start_swmr_write()?;
        self.state = WriterState::SwmrActive;
        info!("writer in SWMR mode, readers can start");

        let mut encoded = BytesMut::new();
        let mut chunk = BytesMut::new();
        if options.direct_chunk_write {
            encode_samples(reference.data(), &mut encoded);
            chunk.reserve(encoded.len() * depth);
        }

        let mut stats = FlushStats::default();
        let run = Stopwatch::new(self.clock.clone());
        let mut since_flush = Stopwatch::new(self.clock.clone());

        debug!(
            iterations = options.iterations,
            direct = options.direct_chunk_write,
            "starting write loop"
        );
        for index in 0..options.iterations {
            dataset.set_extent(index + 1)?;

            let chunk_full = (index + 1) % depth == 0;
            if options.direct_chunk_write {
                chunk.extend_from_slice(&encoded);
                if chunk_full {
                    trace!(chunk = index / depth, "writing chunk");
                    dataset.write_chunk(index / depth, &chunk)?;
                    chunk.clear();
                }
            } else {
                trace!(index, "writing frame");
                dataset.write_frame(index, reference.data())?;
            }

            if chunk_full {
                dataset.flush()?;
                stats.record(since_flush.elapsed());
                since_flush.reset();
                trace!(frames = dataset.published_extent(), "flushed");
            }

            if !options.period.is_zero() {
                self.clock.sleep(options.period);
            }
        }

        if options.iterations % depth != 0 {
            if !chunk.is_empty() {
                dataset.write_chunk(options.iterations / depth, &chunk)?;
            }
            dataset.flush()?;
            stats.record(since_flush.elapsed());
            trace!(frames = dataset.published_extent(), "flushed partial chunk");
        }
        dataset.close()?;
        self.state = WriterState::Finished;

        let report = WriteReport::new(
            &stats,
            options.iterations,
            reference.byte_len(),
            run.elapsed(),
        );
        info!(
            frames = report.frames,
            flushes = report.flushes,
            mean_flush_ms = report.mean_flush_ms,
            throughput_mb_s = report.throughput_mb_s,
            "write run finished"
        );
        self.report = Some(report.clone());
        Ok(report)
    }

    /// Report of the finished write run.
    pub fn report(&self) -> Option<&WriteReport> {
        self.report.as_ref()
    }

    /// Sync and close the store.
    pub fn close(mut self) -> Result<()> {
        if let Some(store) = self.store.take() {
            store.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use swmrprims_store::{DatasetReader, DatasetSource};

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "swmrwriter-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    fn options(iterations: usize, chunk_depth: usize, direct: bool) -> WriteOptions {
        WriteOptions {
            iterations,
            chunk_depth,
            direct_chunk_write: direct,
            period: Duration::from_millis(100),
        }
    }

    fn read_all(path: &Path) -> Vec<Frame> {
        let mut reader = DatasetReader::open_read_only(path, "data").unwrap();
        let extent = reader.extent();
        (0..extent[0])
            .map(|i| {
                let mut out = vec![0u32; 12];
                reader.read_frame(i, &mut out).unwrap();
                Frame::new(&extent[1..], out).unwrap()
            })
            .collect()
    }

    #[test]
    fn writes_every_frame() {
        let dir = unique_temp_dir("every");
        let path = dir.join("swmr.dat");
        let clock = ManualClock::new();

        let mut writer = SwmrWriter::with_clock(&path, WriterConfig::default(), clock.clone());
        writer.create_file().unwrap();
        writer
            .load_reference_frame(&ReferenceSource::Embedded)
            .unwrap();
        let report = writer.write_frames(&options(5, 1, false)).unwrap();

        assert_eq!(writer.state(), WriterState::Finished);
        assert_eq!(report.frames, 5);
        assert_eq!(report.flushes, 5);
        assert_eq!(report.frame_bytes, 48);
        assert_eq!(report.total_bytes, 240);
        assert_eq!(clock.elapsed(), Duration::from_millis(500));
        assert!((report.elapsed_secs - 0.5).abs() < 1e-9);
        // The first flush happens before the first sleep.
        assert!((report.mean_flush_ms - 80.0).abs() < 1e-6);
        assert_eq!(report.min_flush_ms, 0.0);
        assert!((report.max_flush_ms - 100.0).abs() < 1e-6);

        let frames = read_all(&path);
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| *f == Frame::reference()));

        writer.close().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn partial_tail_is_flushed() {
        let dir = unique_temp_dir("tail");
        for direct in [false, true] {
            let path = dir.join(format!("swmr-{direct}.dat"));
            let mut writer =
                SwmrWriter::with_clock(&path, WriterConfig::default(), ManualClock::new());
            writer.create_file().unwrap();
            writer
                .load_reference_frame(&ReferenceSource::Embedded)
                .unwrap();
            let report = writer.write_frames(&options(7, 3, direct)).unwrap();

            assert_eq!(report.flushes, 3, "two full chunks and a tail");
            let frames = read_all(&path);
            assert_eq!(frames.len(), 7);
            assert!(frames.iter().all(|f| *f == Frame::reference()));
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn out_of_order_calls_are_rejected() {
        let dir = unique_temp_dir("order");
        let path = dir.join("swmr.dat");
        let mut writer = SwmrWriter::with_clock(&path, WriterConfig::default(), ManualClock::new());

        assert!(matches!(
            writer.write_frames(&options(1, 1, false)),
            Err(MonitorError::InvalidState { .. })
        ));
        writer.create_file().unwrap();
        assert!(matches!(
            writer.create_file(),
            Err(MonitorError::InvalidState { .. })
        ));
        assert!(matches!(
            writer.write_frames(&options(1, 1, false)),
            Err(MonitorError::MissingReference)
        ));

        writer
            .load_reference_frame(&ReferenceSource::Embedded)
            .unwrap();
        writer.write_frames(&options(1, 1, false)).unwrap();
        assert!(matches!(
            writer.write_frames(&options(1, 1, false)),
            Err(MonitorError::InvalidState {
                state: "finished",
                ..
            })
        ));
        assert!(writer.report().is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn zero_chunk_depth_is_rejected() {
        let dir = unique_temp_dir("depth");
        let mut writer = SwmrWriter::with_clock(
            dir.join("swmr.dat"),
            WriterConfig::default(),
            ManualClock::new(),
        );
        writer.create_file().unwrap();
        writer
            .load_reference_frame(&ReferenceSource::Embedded)
            .unwrap();
        assert!(matches!(
            writer.write_frames(&options(4, 0, false)),
            Err(MonitorError::Store(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reference_from_store() {
        let dir = unique_temp_dir("refstore");
        let source_path = dir.join("source.dat");
        let mut first = SwmrWriter::with_clock(&source_path, WriterConfig::default(), ManualClock::new());
        first.create_file().unwrap();
        first
            .load_reference_frame(&ReferenceSource::Embedded)
            .unwrap();
        first.write_frames(&options(2, 1, false)).unwrap();
        first.close().unwrap();

        let mut second =
            SwmrWriter::with_clock(dir.join("copy.dat"), WriterConfig::default(), ManualClock::new());
        second
            .load_reference_frame(&ReferenceSource::Store {
                path: source_path,
                dataset: "data".to_string(),
            })
            .unwrap();
        assert_eq!(second.reference(), Some(&Frame::reference()));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
