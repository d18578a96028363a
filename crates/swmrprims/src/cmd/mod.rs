use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use swmrprims_monitor::ReferenceSource;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod read;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a store and append reference frames to it in SWMR mode.
    #[command(visible_alias = "w")]
    Write(WriteArgs),
    /// Monitor a store and verify each newly published frame.
    #[command(visible_alias = "r")]
    Read(ReadArgs),
    /// Print the layout of a stored dataset.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Write(args) => write::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Reference frame selection shared by `write` and `read`.
#[derive(Args, Debug, Default)]
pub struct ReferenceArgs {
    /// Store holding the reference frame (default: embedded test image).
    #[arg(short = 'f', long, value_name = "FILE")]
    pub testdatafile: Option<PathBuf>,
    /// Dataset in the reference store [default: data].
    #[arg(short = 'd', long, value_name = "NAME", requires = "testdatafile")]
    pub testdataset: Option<String>,
}

impl ReferenceArgs {
    pub fn source(&self) -> ReferenceSource {
        match &self.testdatafile {
            Some(path) => ReferenceSource::Store {
                path: path.clone(),
                dataset: self
                    .testdataset
                    .clone()
                    .unwrap_or_else(|| "data".to_string()),
            },
            None => ReferenceSource::Embedded,
        }
    }
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Store file to create (truncated if it exists).
    #[arg(default_value = "swmr.dat")]
    pub datafile: PathBuf,
    /// Name of the dataset to write.
    #[arg(short = 's', long, default_value = "data")]
    pub dataset: String,
    #[command(flatten)]
    pub reference: ReferenceArgs,
    /// Number of frames to write.
    #[arg(short = 'n', long, default_value_t = 2)]
    pub niter: usize,
    /// Frames per chunk; one flush per chunk.
    #[arg(short = 'c', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub chunk: u32,
    /// Pause after each frame (e.g. 1s, 500ms, 0.2). 0 disables pacing.
    #[arg(short = 'p', long, default_value = "1s")]
    pub period: String,
    /// Write whole chunks of raw frame bytes.
    #[arg(long)]
    pub direct: bool,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Store file to monitor.
    #[arg(default_value = "swmr.dat")]
    pub datafile: PathBuf,
    /// Name of the dataset to monitor.
    #[arg(short = 's', long, default_value = "data")]
    pub dataset: String,
    #[command(flatten)]
    pub reference: ReferenceArgs,
    /// Number of frames to expect (default: unknown).
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub nframes: Option<u64>,
    /// Give up after this long without new data (e.g. 2s, 500ms). 0 waits forever.
    #[arg(short = 't', long, default_value = "2s")]
    pub timeout: String,
    /// Poll interval (e.g. 200ms, 0.5s).
    #[arg(short = 'p', long, default_value = "200ms")]
    pub polltime: String,
    /// Draw a progress bar on stderr (requires --nframes).
    #[arg(long)]
    pub progress: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Store file to inspect.
    #[arg(default_value = "swmr.dat")]
    pub datafile: PathBuf,
    /// Name of the dataset.
    #[arg(short = 's', long, default_value = "data")]
    pub dataset: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s`, `0.5s` or bare seconds (`2`, `0.5`).
pub fn parse_duration(input: &str, allow_zero: bool) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, nanos_per_unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, 1e6)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, 1e9)
    } else {
        (input, 1e9)
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    let nanos = (value * nanos_per_unit).round();
    if !nanos.is_finite() || nanos < 0.0 || nanos > u64::MAX as f64 {
        return Err(CliError::new(
            USAGE,
            format!("invalid duration value: {input}"),
        ));
    }
    let duration = Duration::from_nanos(nanos as u64);

    if duration.is_zero() && !allow_zero {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(duration)
}
