use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic time and sleeps.
pub trait Clock {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration);

    fn elapsed_since(&self, mark: Instant) -> Duration {
        self.now().saturating_duration_since(mark)
    }
}

/// Wall clock backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock that only moves when slept on or advanced.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move time forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Virtual time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Measures time since the last reset.
#[derive(Debug, Clone)]
pub struct Stopwatch<C: Clock = SystemClock> {
    clock: C,
    start: Instant,
}

impl<C: Clock> Stopwatch<C> {
    /// Start a stopwatch now.
    pub fn new(clock: C) -> Self {
        let start = clock.now();
        Self { clock, start }
    }

    pub fn reset(&mut self) {
        self.start = self.clock.now();
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed_since(self.start)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_on_sleep() {
        let clock = ManualClock::new();
        let mark = clock.now();
        assert_eq!(clock.elapsed_since(mark), Duration::ZERO);

        clock.sleep(Duration::from_millis(250));
        assert_eq!(clock.elapsed_since(mark), Duration::from_millis(250));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        other.advance(Duration::from_secs(3));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn stopwatch_resets() {
        let clock = ManualClock::new();
        let mut watch = Stopwatch::new(clock.clone());
        clock.advance(Duration::from_millis(1500));
        assert_eq!(watch.elapsed_secs(), 1.5);

        watch.reset();
        assert_eq!(watch.elapsed(), Duration::ZERO);
        clock.advance(Duration::from_millis(10));
        assert_eq!(watch.elapsed(), Duration::from_millis(10));
    }

    #[test]
    fn system_stopwatch_is_monotonic() {
        let watch = Stopwatch::new(SystemClock);
        let first = watch.elapsed();
        SystemClock.sleep(Duration::from_millis(2));
        assert!(watch.elapsed() >= first + Duration::from_millis(2));
    }
}
