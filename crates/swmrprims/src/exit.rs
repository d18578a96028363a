use std::fmt;
use std::io;

use swmrprims_frame::FrameError;
use swmrprims_monitor::MonitorError;
use swmrprims_store::StoreError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const STORE_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Exit code for a monitor run: the failure count, clamped to 1..=255.
pub fn failures_code(failures: usize) -> i32 {
    if failures == 0 {
        SUCCESS
    } else {
        failures.min(255) as i32
    }
}

fn io_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => STORE_ERROR,
    }
}

pub fn store_error(context: &str, err: StoreError) -> CliError {
    let code = match &err {
        StoreError::Create { source, .. }
        | StoreError::Open { source, .. }
        | StoreError::Io(source) => io_code(source.kind()),
        StoreError::OutOfBounds { .. } | StoreError::LengthMismatch { .. } => INTERNAL,
        _ => STORE_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Store(err) => store_error(context, err),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn monitor_error(context: &str, err: MonitorError) -> CliError {
    match err {
        MonitorError::Store(err) => store_error(context, err),
        MonitorError::Frame(err) => frame_error(context, err),
        MonitorError::ShapeMismatch { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
