use std::process::ExitCode;

use clap::Parser;

use cartoonify::{cli, logger};

fn main() -> ExitCode {
    // File logger first, so filter warnings (mask fallbacks, skipped clone
    // placements) from the very first input are captured.
    logger::init();

    let args = cli::CliArgs::parse();
    cli::run(args)
}
