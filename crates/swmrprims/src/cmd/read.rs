use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use swmrprims_monitor::{MonitorConfig, SwmrReader};

use crate::cmd::{parse_duration, ReadArgs};
use crate::exit::{failures_code, monitor_error, CliError, CliResult, INTERNAL};
use crate::output::{print_read_report, OutputFormat};
use crate::progress::ProgressBar;

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout, true)?;
    let poll_interval = parse_duration(&args.polltime, false)?;

    let mut reader = SwmrReader::open_file(&args.datafile, &args.dataset)
        .map_err(|err| monitor_error("open store failed", err))?;
    reader
        .load_reference_frame(&args.reference.source())
        .map_err(|err| monitor_error("load reference frame failed", err))?;

    let interrupt = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(interrupt.clone())?;

    let expected_frames = args
        .nframes
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX));
    let config = MonitorConfig {
        timeout,
        poll_interval,
        expected_frames,
        interrupt: Some(interrupt),
    };

    let monitored = if args.progress && expected_frames.is_some() {
        reader.monitor_with(&config, &mut ProgressBar::stderr())
    } else {
        reader.monitor(&config)
    };
    monitored.map_err(|err| monitor_error("monitor failed", err))?;

    let report = reader.report();
    print_read_report(&args.datafile, &args.dataset, &report, format);
    Ok(failures_code(report.failures))
}

fn install_ctrlc_handler(interrupt: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        interrupt.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
