//! Monitor loop state machine.
//!
//! [`next_action`] decides, without doing any I/O, whether the monitor should
//! check the newest frame, keep waiting or stop.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Where the monitor loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No unchecked frame is known. The loop polls the frame count.
    WaitingForData,
    /// The newest frame has just been read and checked.
    Checking,
}

/// Why the monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ExpectedCountReached,
    TimedOut,
    Interrupted,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::ExpectedCountReached => "expected_count_reached",
            StopReason::TimedOut => "timed_out",
            StopReason::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one loop decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Stop(StopReason),
}

/// Everything [`next_action`] looks at.
#[derive(Debug, Clone, Copy)]
pub struct PollInput {
    /// Published frame count just observed.
    pub latest: usize,
    /// Frame count at the last check.
    pub last_seen: usize,
    pub expected: Option<usize>,
    /// Time since the last new frame (or since monitoring started).
    pub idle: Duration,
    /// Zero disables the timeout.
    pub timeout: Duration,
    pub interrupted: bool,
}

/// Decide the next state of the monitor loop.
///
/// From `WaitingForData`, the loop stops at once if `last_seen` already
/// reaches the expected count. A count above `last_seen` moves to `Checking`;
/// otherwise the loop times out once `idle` exceeds a non-zero `timeout`, or
/// keeps waiting. From `Checking`, the loop stops once `last_seen` reaches the
/// expected count and goes back to waiting otherwise.
pub fn next_action(state: PollState, input: &PollInput) -> (PollState, Step) {
    if input.interrupted {
        return (state, Step::Stop(StopReason::Interrupted));
    }
    match state {
        PollState::WaitingForData => {
            if input.expected.is_some_and(|expected| input.last_seen >= expected) {
                (state, Step::Stop(StopReason::ExpectedCountReached))
            } else if input.latest > input.last_seen {
                (PollState::Checking, Step::Continue)
            } else if !input.timeout.is_zero() && input.idle > input.timeout {
                (state, Step::Stop(StopReason::TimedOut))
            } else {
                (state, Step::Continue)
            }
        }
        PollState::Checking => match input.expected {
            Some(expected) if input.last_seen >= expected => {
                (state, Step::Stop(StopReason::ExpectedCountReached))
            }
            _ => (PollState::WaitingForData, Step::Continue),
        },
    }
}
