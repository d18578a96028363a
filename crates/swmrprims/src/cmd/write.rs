use swmrprims_monitor::{SwmrWriter, WriteOptions, WriterConfig};
use tracing::info;

use crate::cmd::{parse_duration, WriteArgs};
use crate::exit::{monitor_error, CliResult, SUCCESS};
use crate::output::{print_write_report, OutputFormat};

pub fn run(args: WriteArgs, format: OutputFormat) -> CliResult<i32> {
    let period = parse_duration(&args.period, true)?;
    let options = WriteOptions {
        iterations: args.niter,
        chunk_depth: args.chunk as usize,
        direct_chunk_write: args.direct,
        period,
    };

    let config = WriterConfig {
        dataset: args.dataset.clone(),
        ..WriterConfig::default()
    };
    let mut writer = SwmrWriter::new(&args.datafile, config);
    writer
        .create_file()
        .map_err(|err| monitor_error("create store failed", err))?;
    writer
        .load_reference_frame(&args.reference.source())
        .map_err(|err| monitor_error("load reference frame failed", err))?;

    info!(
        iterations = options.iterations,
        chunk = options.chunk_depth,
        period_ms = period.as_millis() as u64,
        "writing frames"
    );
    let report = writer
        .write_frames(&options)
        .map_err(|err| monitor_error("write failed", err))?;
    writer
        .close()
        .map_err(|err| monitor_error("close store failed", err))?;

    print_write_report(&args.datafile, &args.dataset, &report, format);
    Ok(SUCCESS)
}
