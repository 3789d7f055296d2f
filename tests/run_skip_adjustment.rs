//! Integration tests for the `run` command with the adjustment step switched off.
#![cfg(unix)]
use asc_calib::adjust::ADJUSTED_FILE_NAME;
use asc_calib::cli::{RunOpts, handle_run_command};
use asc_calib::settings::Settings;
use tempfile::tempdir;

mod common;
use common::write_fake_study;

/// Survey shares are left alone when the adjustment step is skipped
#[test]
fn test_handle_run_command_skip_adjustment() {
    unsafe { std::env::set_var("ASC_CALIB_LOG_LEVEL", "off") };

    let dir = tempdir().unwrap();
    let study_path = write_fake_study(dir.path());

    let output_dir = dir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        iterations: Some(1),
        skip_adjustment: true,
        ..Default::default()
    };
    handle_run_command(&study_path, &opts, Some(Settings::default())).unwrap();

    assert!(!dir.path().join(ADJUSTED_FILE_NAME).exists());
    assert!(output_dir.join("best_asc.csv").is_file());
}
