use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use swmrprims_frame::{Frame, FrameView};
use swmrprims_store::{DatasetReader, DatasetSource};
use tracing::{debug, info, info_span, trace, warn, Span};

use crate::clock::{Clock, Stopwatch, SystemClock};
use crate::error::{MonitorError, Result};
use crate::poll::{next_action, PollInput, PollState, Step, StopReason};
use crate::writer::ReferenceSource;

/// Monitor loop parameters.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Give up after this long without a new frame. Zero waits forever.
    /// Default: 2 s.
    pub timeout: Duration,
    /// Sleep between polls. Default: 200 ms.
    pub poll_interval: Duration,
    /// Stop once this many frames have been published and checked.
    pub expected_frames: Option<usize>,
    /// Checked between polls; set it to stop the loop.
    pub interrupt: Option<Arc<AtomicBool>>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(200),
            expected_frames: None,
            interrupt: None,
        }
    }
}

/// Receives monitor progress.
pub trait MonitorObserver {
    /// A newly published frame was read and checked. `frames` is the
    /// published count it was read at.
    fn on_frame(&mut self, _frames: usize, _passed: bool, _expected: Option<usize>) {}

    fn on_stop(&mut self, _reason: StopReason) {}
}

impl MonitorObserver for () {}

/// Outcome of a monitor run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadReport {
    /// Frames read and compared.
    pub checks: usize,
    /// Highest published frame count seen.
    pub frames_observed: usize,
    /// Comparisons that did not match the reference.
    pub failures: usize,
    pub stop_reason: Option<StopReason>,
}

/// Lifecycle of a [`SwmrReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    FileOpen,
    Monitoring,
    Stopped(StopReason),
}

impl ReaderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderState::FileOpen => "file_open",
            ReaderState::Monitoring => "monitoring",
            ReaderState::Stopped(_) => "stopped",
        }
    }
}

/// Polls a growing dataset and checks each newly published frame against a
/// reference frame.
///
/// Only the newest frame at each poll is read. Frames published between two
/// polls are skipped, and each frame is checked at most once.
pub struct SwmrReader<S: DatasetSource = DatasetReader, C: Clock + Clone = SystemClock> {
    source: S,
    clock: C,
    span: Span,
    state: ReaderState,
    reference: Option<Frame>,
    scratch: Vec<u32>,
    latest: usize,
    last_seen: usize,
    results: Vec<bool>,
}

impl SwmrReader<DatasetReader, SystemClock> {
    /// Open `dataset` in the store at `path` for SWMR reading.
    ///
    /// Fails unless the writer has already entered SWMR mode.
    pub fn open_file(path: impl AsRef<Path>, dataset: &str) -> Result<Self> {
        let path = path.as_ref();
        let span = info_span!("swmr_reader", path = %path.display(), dataset);
        let source = span.in_scope(|| {
            info!("opening store");
            DatasetReader::open_swmr(path, dataset)
        })?;
        Ok(Self::with_span(source, SystemClock, span))
    }
}

impl<S: DatasetSource, C: Clock + Clone> SwmrReader<S, C> {
    /// Monitor an already opened source.
    pub fn from_source(source: S, clock: C) -> Self {
        Self::with_span(source, clock, info_span!("swmr_reader"))
    }

    fn with_span(source: S, clock: C, span: Span) -> Self {
        Self {
            source,
            clock,
            span,
            state: ReaderState::FileOpen,
            reference: None,
            scratch: Vec::new(),
            latest: 0,
            last_seen: 0,
            results: Vec::new(),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn reference(&self) -> Option<&Frame> {
        self.reference.as_ref()
    }

    /// Check results in the order frames were read.
    pub fn results(&self) -> &[bool] {
        &self.results
    }

    /// Frame count at the last read.
    pub fn last_seen(&self) -> usize {
        self.last_seen
    }

    /// Load the frame every read is compared against.
    pub fn load_reference_frame(&mut self, source: &ReferenceSource) -> Result<()> {
        let _enter = self.span.enter();
        let frame = source.load()?;
        debug!(?source, shape = ?frame.shape(), "loaded reference frame");
        self.scratch = frame.allocate_buffer();
        self.reference = Some(frame);
        Ok(())
    }

    /// Refresh the source and return the published frame count.
    ///
    /// The dataset's frame axes must equal the reference shape.
    pub fn latest_frame_count(&mut self) -> Result<usize> {
        let reference = self.reference.as_ref().ok_or(MonitorError::MissingReference)?;
        self.source.refresh()?;
        let extent = self.source.extent();
        let (frames, shape) = extent
            .split_first()
            .ok_or_else(|| MonitorError::ShapeMismatch {
                expected: reference.shape().to_vec(),
                actual: Vec::new(),
            })?;
        if shape != reference.shape() {
            return Err(MonitorError::ShapeMismatch {
                expected: reference.shape().to_vec(),
                actual: shape.to_vec(),
            });
        }
        self.latest = *frames;
        Ok(self.latest)
    }

    /// Read the newest frame, as of the last [`Self::latest_frame_count`],
    /// into the scratch buffer.
    pub fn read_latest_frame(&mut self) -> Result<()> {
        if self.reference.is_none() {
            return Err(MonitorError::MissingReference);
        }
        if self.latest == 0 {
            return Err(MonitorError::InvalidState {
                operation: "read latest frame",
                state: "empty dataset",
            });
        }
        trace!(index = self.latest - 1, "reading frame");
        self.source.read_frame(self.latest - 1, &mut self.scratch)?;
        self.last_seen = self.latest;
        Ok(())
    }

    /// Compare the scratch buffer with the reference and record the result.
    ///
    /// A mismatch is logged and recorded, never returned as an error.
    pub fn check_frame(&mut self) -> Result<bool> {
        let reference = self.reference.as_ref().ok_or(MonitorError::MissingReference)?;
        let view = FrameView::new(reference.shape(), &self.scratch)?;
        let passed = view == *reference;
        if !passed {
            warn!(frame = self.last_seen, "frame does not match reference");
        }
        self.results.push(passed);
        Ok(passed)
    }

    /// Poll until the expected count is reached, the timeout expires or the
    /// interrupt flag is set.
    pub fn monitor(&mut self, config: &MonitorConfig) -> Result<StopReason> {
        self.monitor_with(config, &mut ())
    }

    /// As [`Self::monitor`], reporting each check to `observer`.
    pub fn monitor_with(
        &mut self,
        config: &MonitorConfig,
        observer: &mut impl MonitorObserver,
    ) -> Result<StopReason> {
        let span = self.span.clone();
        let _enter = span.enter();

        if self.reference.is_none() {
            return Err(MonitorError::MissingReference);
        }
        if self.state != ReaderState::FileOpen {
            return Err(MonitorError::InvalidState {
                operation: "monitor",
                state: self.state.as_str(),
            });
        }
        self.state = ReaderState::Monitoring;
        info!(
            timeout_ms = config.timeout.as_millis() as u64,
            poll_ms = config.poll_interval.as_millis() as u64,
            expected = ?config.expected_frames,
            "starting monitor"
        );

        let mut idle = Stopwatch::new(self.clock.clone());
        let mut state = PollState::WaitingForData;
        let reason = loop {
            let interrupted = config
                .interrupt
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::SeqCst));
            let latest = match state {
                PollState::WaitingForData if !interrupted => self.latest_frame_count()?,
                _ => self.last_seen,
            };

            let input = PollInput {
                latest,
                last_seen: self.last_seen,
                expected: config.expected_frames,
                idle: idle.elapsed(),
                timeout: config.timeout,
                interrupted,
            };
            let (next, step) = next_action(state, &input);
            if let Step::Stop(reason) = step {
                break reason;
            }

            match (state, next) {
                (PollState::WaitingForData, PollState::Checking) => {
                    self.read_latest_frame()?;
                    let passed = self.check_frame()?;
                    trace!(frames = self.last_seen, passed, "checked frame");
                    observer.on_frame(self.last_seen, passed, config.expected_frames);
                    idle.reset();
                }
                (PollState::WaitingForData, PollState::WaitingForData) => {
                    self.clock.sleep(config.poll_interval);
                }
                _ => {}
            }
            state = next;
        };

        self.state = ReaderState::Stopped(reason);
        observer.on_stop(reason);
        info!(%reason, checks = self.results.len(), "monitor stopped");
        Ok(reason)
    }

    /// Summarize the run. `failures` is the health signal.
    pub fn report(&self) -> ReadReport {
        let failures = self.results.iter().filter(|passed| !**passed).count();
        let stop_reason = match self.state {
            ReaderState::Stopped(reason) => Some(reason),
            _ => None,
        };
        let report = ReadReport {
            checks: self.results.len(),
            frames_observed: self.last_seen,
            failures,
            stop_reason,
        };
        let _enter = self.span.enter();
        if failures > 0 {
            warn!(
                checks = report.checks,
                frames = report.frames_observed,
                failures,
                "frames failed verification"
            );
        } else {
            info!(
                checks = report.checks,
                frames = report.frames_observed,
                "all checked frames matched"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use swmrprims_frame::testdata::{REFERENCE_IMAGE, SECOND_IMAGE};
    use swmrprims_store::{Result as StoreResult, StoreError};

    /// Publishes one more frame on every refresh, up to `frames`.
    struct GrowingSource {
        shape: Vec<usize>,
        frames: usize,
        published: usize,
        corrupt: Vec<usize>,
        reads: Vec<usize>,
    }

    impl GrowingSource {
        fn new(frames: usize) -> Self {
            Self {
                shape: vec![3, 4],
                frames,
                published: 0,
                corrupt: Vec::new(),
                reads: Vec::new(),
            }
        }
    }

    impl DatasetSource for GrowingSource {
        fn refresh(&mut self) -> StoreResult<()> {
            self.published = (self.published + 1).min(self.frames);
            Ok(())
        }

        fn extent(&self) -> Vec<usize> {
            let mut extent = vec![self.published];
            extent.extend_from_slice(&self.shape);
            extent
        }

        fn read_frame(&mut self, index: usize, out: &mut [u32]) -> StoreResult<()> {
            if index >= self.published {
                return Err(StoreError::OutOfBounds {
                    index,
                    extent: self.published,
                });
            }
            self.reads.push(index);
            if self.corrupt.contains(&index) {
                out.copy_from_slice(&SECOND_IMAGE);
            } else {
                out.copy_from_slice(&REFERENCE_IMAGE);
            }
            Ok(())
        }
    }

    /// Never publishes anything.
    struct StalledSource;

    impl DatasetSource for StalledSource {
        fn refresh(&mut self) -> StoreResult<()> {
            Ok(())
        }

        fn extent(&self) -> Vec<usize> {
            vec![0, 3, 4]
        }

        fn read_frame(&mut self, index: usize, _out: &mut [u32]) -> StoreResult<()> {
            Err(StoreError::OutOfBounds { index, extent: 0 })
        }
    }

    fn reader<S: DatasetSource>(source: S, clock: &ManualClock) -> SwmrReader<S, ManualClock> {
        let mut reader = SwmrReader::from_source(source, clock.clone());
        reader
            .load_reference_frame(&ReferenceSource::Embedded)
            .unwrap();
        reader
    }

    #[derive(Default)]
    struct Recorder {
        frames: Vec<(usize, bool)>,
        stop: Option<StopReason>,
    }

    impl MonitorObserver for Recorder {
        fn on_frame(&mut self, frames: usize, passed: bool, _expected: Option<usize>) {
            self.frames.push((frames, passed));
        }

        fn on_stop(&mut self, reason: StopReason) {
            self.stop = Some(reason);
        }
    }

    #[test]
    fn stops_exactly_at_expected_count() {
        let clock = ManualClock::new();
        let mut reader = reader(GrowingSource::new(10), &clock);
        let config = MonitorConfig {
            expected_frames: Some(10),
            ..MonitorConfig::default()
        };

        assert_eq!(
            reader.monitor(&config).unwrap(),
            StopReason::ExpectedCountReached
        );
        assert_eq!(reader.results().len(), 10);

        let report = reader.report();
        assert_eq!(report.checks, 10);
        assert_eq!(report.frames_observed, 10);
        assert_eq!(report.failures, 0);
        assert_eq!(report.stop_reason, Some(StopReason::ExpectedCountReached));
        assert_eq!(reader.source.reads, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn timeout_with_no_data() {
        let clock = ManualClock::new();
        let mut reader = reader(StalledSource, &clock);
        let config = MonitorConfig {
            timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
            ..MonitorConfig::default()
        };

        assert_eq!(reader.monitor(&config).unwrap(), StopReason::TimedOut);
        assert_eq!(reader.report().checks, 0);
        let waited = clock.elapsed();
        assert!(waited >= Duration::from_millis(500), "{waited:?}");
        assert!(waited <= Duration::from_millis(600), "{waited:?}");
    }

    #[test]
    fn timeout_after_writer_stops() {
        let clock = ManualClock::new();
        let mut reader = reader(GrowingSource::new(3), &clock);
        let config = MonitorConfig {
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(250),
            ..MonitorConfig::default()
        };

        assert_eq!(reader.monitor(&config).unwrap(), StopReason::TimedOut);
        let report = reader.report();
        assert_eq!(report.checks, 3);
        assert_eq!(report.frames_observed, 3);
        assert_eq!(report.stop_reason, Some(StopReason::TimedOut));
    }

    #[test]
    fn mismatch_is_recorded_not_fatal() {
        let clock = ManualClock::new();
        let mut source = GrowingSource::new(5);
        source.corrupt = vec![2];
        let mut reader = reader(source, &clock);
        let mut recorder = Recorder::default();
        let config = MonitorConfig {
            expected_frames: Some(5),
            ..MonitorConfig::default()
        };

        reader.monitor_with(&config, &mut recorder).unwrap();
        assert_eq!(reader.results(), &[true, true, false, true, true]);
        assert_eq!(reader.report().failures, 1);
        assert_eq!(recorder.frames[2], (3, false));
        assert_eq!(recorder.stop, Some(StopReason::ExpectedCountReached));
    }

    #[test]
    fn interrupt_stops_before_polling() {
        let clock = ManualClock::new();
        let mut reader = reader(GrowingSource::new(5), &clock);
        let flag = Arc::new(AtomicBool::new(true));
        let config = MonitorConfig {
            interrupt: Some(flag),
            ..MonitorConfig::default()
        };

        assert_eq!(reader.monitor(&config).unwrap(), StopReason::Interrupted);
        assert_eq!(reader.report().checks, 0);
    }

    #[test]
    fn zero_expected_frames_stops_on_empty_dataset() {
        let clock = ManualClock::new();
        let mut reader = reader(StalledSource, &clock);
        let config = MonitorConfig {
            timeout: Duration::ZERO,
            expected_frames: Some(0),
            ..MonitorConfig::default()
        };

        assert_eq!(
            reader.monitor(&config).unwrap(),
            StopReason::ExpectedCountReached
        );
        assert_eq!(reader.report().checks, 0);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn shape_mismatch_is_fatal() {
        let clock = ManualClock::new();
        let mut source = GrowingSource::new(1);
        source.shape = vec![4, 3];
        let mut reader = reader(source, &clock);

        assert!(matches!(
            reader.monitor(&MonitorConfig::default()),
            Err(MonitorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn requires_reference_frame() {
        let mut reader = SwmrReader::from_source(StalledSource, ManualClock::new());
        assert!(matches!(
            reader.latest_frame_count(),
            Err(MonitorError::MissingReference)
        ));
        assert!(matches!(
            reader.monitor(&MonitorConfig::default()),
            Err(MonitorError::MissingReference)
        ));
    }

    #[test]
    fn monitor_runs_once() {
        let clock = ManualClock::new();
        let mut reader = reader(GrowingSource::new(1), &clock);
        let config = MonitorConfig {
            expected_frames: Some(1),
            ..MonitorConfig::default()
        };
        reader.monitor(&config).unwrap();
        assert!(matches!(
            reader.monitor(&config),
            Err(MonitorError::InvalidState { .. })
        ));
    }

    #[test]
    fn read_before_any_frame_is_rejected() {
        let clock = ManualClock::new();
        let mut reader = reader(StalledSource, &clock);
        assert_eq!(reader.latest_frame_count().unwrap(), 0);
        assert!(matches!(
            reader.read_latest_frame(),
            Err(MonitorError::InvalidState { .. })
        ));
    }
}
