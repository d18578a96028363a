use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("swmrprims {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: swmrprims");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("store_format: {}", swmrprims_store::FORMAT_VERSION);
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("SWMRPRIMS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("features: monitor={}, cli=true", cfg!(feature = "monitor"));

    Ok(SUCCESS)
}
