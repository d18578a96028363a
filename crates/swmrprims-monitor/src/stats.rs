use std::time::Duration;

use serde::Serialize;

/// Elapsed times between consecutive flushes of a write run.
#[derive(Debug, Clone, Default)]
pub struct FlushStats {
    intervals: Vec<Duration>,
}

impl FlushStats {
    pub fn record(&mut self, interval: Duration) {
        self.intervals.push(interval);
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    fn millis(&self) -> impl Iterator<Item = f64> + '_ {
        self.intervals.iter().map(|d| d.as_secs_f64() * 1e3)
    }

    /// Mean interval in milliseconds.
    pub fn mean_ms(&self) -> f64 {
        if self.intervals.is_empty() {
            return 0.0;
        }
        self.millis().sum::<f64>() / self.intervals.len() as f64
    }

    /// Population standard deviation in milliseconds.
    pub fn std_dev_ms(&self) -> f64 {
        if self.intervals.is_empty() {
            return 0.0;
        }
        let mean = self.mean_ms();
        let variance =
            self.millis().map(|ms| (ms - mean).powi(2)).sum::<f64>() / self.intervals.len() as f64;
        variance.sqrt()
    }

    pub fn min_ms(&self) -> f64 {
        self.millis().reduce(f64::min).unwrap_or(0.0)
    }

    pub fn max_ms(&self) -> f64 {
        self.millis().reduce(f64::max).unwrap_or(0.0)
    }
}

/// Summary of a completed write run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteReport {
    pub frames: usize,
    pub frame_bytes: usize,
    pub total_bytes: usize,
    pub flushes: usize,
    pub elapsed_secs: f64,
    pub mean_flush_ms: f64,
    pub std_flush_ms: f64,
    pub min_flush_ms: f64,
    pub max_flush_ms: f64,
    /// Throughput in MB/s (10^6 bytes).
    pub throughput_mb_s: f64,
}

impl WriteReport {
    pub fn new(stats: &FlushStats, frames: usize, frame_bytes: usize, elapsed: Duration) -> Self {
        let total_bytes = frames * frame_bytes;
        let elapsed_secs = elapsed.as_secs_f64();
        let throughput_mb_s = if elapsed_secs > 0.0 {
            total_bytes as f64 / 1e6 / elapsed_secs
        } else {
            0.0
        };
        Self {
            frames,
            frame_bytes,
            total_bytes,
            flushes: stats.len(),
            elapsed_secs,
            mean_flush_ms: stats.mean_ms(),
            std_flush_ms: stats.std_dev_ms(),
            min_flush_ms: stats.min_ms(),
            max_flush_ms: stats.max_ms(),
            throughput_mb_s,
        }
    }
}
