use std::io::{self, Write};

use swmrprims_monitor::{MonitorObserver, StopReason};

const DEFAULT_COLUMNS: usize = 80;

/// Text progress bar for a monitor run with a known frame count.
pub struct ProgressBar<W: Write> {
    out: W,
    columns: usize,
    drawn: bool,
}

impl ProgressBar<io::Stderr> {
    /// A bar on stderr, as wide as `$COLUMNS` (default 80).
    pub fn stderr() -> Self {
        let columns = std::env::var("COLUMNS")
            .ok()
            .and_then(|c| c.parse().ok())
            .unwrap_or(DEFAULT_COLUMNS);
        Self::new(io::stderr(), columns)
    }
}

impl<W: Write> ProgressBar<W> {
    pub fn new(out: W, columns: usize) -> Self {
        Self {
            out,
            columns,
            drawn: false,
        }
    }
}

/// Render the bar for `done` of `total`, or `None` when this step is skipped.
/// About one step per percent is drawn, plus the last one.
fn render(done: usize, total: usize, columns: usize) -> Option<String> {
    if total == 0 {
        return None;
    }
    if done != total && done % (total / 100 + 1) != 0 {
        return None;
    }
    let ratio = (done as f64 / total as f64).min(1.0);
    let width = columns.saturating_sub(7).max(10);
    let filled = ((ratio * width as f64) as usize).min(width);
    Some(format!(
        "{:>3}% [{}{}]",
        (ratio * 100.0) as usize,
        "=".repeat(filled),
        " ".repeat(width - filled)
    ))
}

impl<W: Write> MonitorObserver for ProgressBar<W> {
    fn on_frame(&mut self, frames: usize, _passed: bool, expected: Option<usize>) {
        let Some(total) = expected else {
            return;
        };
        if let Some(line) = render(frames, total, self.columns) {
            let _ = write!(self.out, "\r{line}");
            let _ = self.out.flush();
            self.drawn = true;
        }
    }

    fn on_stop(&mut self, _reason: StopReason) {
        if self.drawn {
            let _ = writeln!(self.out);
        }
    }
}
