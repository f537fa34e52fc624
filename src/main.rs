use std::process::ExitCode;

use clap::Parser;

use retouch::cli::{self, CliArgs};
use retouch::{log_info, logger};

fn main() -> ExitCode {
    logger::init();
    let args = CliArgs::parse();
    if args.verbose
        && let Some(path) = logger::log_path()
    {
        println!("Log: {}", path.display());
    }
    log_info!("CLI mode: {} input pattern(s), {} edit(s)", args.input.len(), args.edit.len());
    cli::run(args)
}
