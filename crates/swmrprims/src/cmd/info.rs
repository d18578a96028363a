use swmrprims_store::{DatasetReader, FORMAT_VERSION};

use crate::cmd::InfoArgs;
use crate::exit::{store_error, CliResult, SUCCESS};
use crate::output::{print_dataset_info, DatasetInfo, OutputFormat};

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let reader = DatasetReader::open_read_only(&args.datafile, &args.dataset)
        .map_err(|err| store_error("open store failed", err))?;

    let layout = reader.layout();
    let info = DatasetInfo {
        datafile: args.datafile.display().to_string(),
        dataset: reader.name().to_string(),
        format_version: FORMAT_VERSION,
        frames: reader.frames(),
        frame_shape: layout.frame_shape.clone(),
        chunk_depth: layout.chunk_depth,
        frame_bytes: layout.frame_bytes(),
        swmr: reader.is_swmr(),
    };

    print_dataset_info(&info, format);
    Ok(SUCCESS)
}
