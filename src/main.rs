//! Provides the main entry point to the program.
use asc_calib::cli::run_cli;
use asc_calib::log::is_logger_initialised;
use human_panic::setup_panic;
use std::process::ExitCode;

fn main() -> ExitCode {
    setup_panic!();

    let Err(err) = run_cli() else {
        return ExitCode::SUCCESS;
    };

    // Once the logger is up, errors go through it so they also land in the log files
    if is_logger_initialised() {
        ::log::error!("{err:?}");
    } else {
        eprintln!("Error: {err:?}");
    }

    ExitCode::FAILURE
}
