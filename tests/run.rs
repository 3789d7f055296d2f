//! Integration tests for the `run` command.
#![cfg(unix)]
use asc_calib::adjust::ADJUSTED_FILE_NAME;
use asc_calib::cli::{RunOpts, handle_run_command};
use asc_calib::settings::Settings;
use std::fs;
use tempfile::tempdir;

mod common;
use common::write_fake_study;

/// Run a whole study against a fake simulation
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("ASC_CALIB_LOG_LEVEL", "off") };

    let dir = tempdir().unwrap();
    let study_path = write_fake_study(dir.path());

    // Save results to non-existent directory to check that directory creation works
    let output_dir = dir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        iterations: Some(3),
        ..Default::default()
    };
    handle_run_command(&study_path, &opts, Some(Settings::default())).unwrap();

    // The survey shares next to the study file are adjusted first
    let adjusted = fs::read_to_string(dir.path().join(ADJUSTED_FILE_NAME)).unwrap();
    assert!(adjusted.starts_with("dist_group,mode,share\n"));

    assert!(output_dir.join("metadata.toml").is_file());
    assert!(output_dir.join("runs/fake-003").is_dir());
    assert!(!output_dir.join("runs/fake-004").exists());

    // Header plus one row per mode for each trial
    let calibration = fs::read_to_string(output_dir.join("calibration.csv")).unwrap();
    assert_eq!(calibration.lines().count(), 1 + 3 * 3);

    let best = fs::read_to_string(output_dir.join("best_asc.csv")).unwrap();
    assert!(best.starts_with("mode,asc\nwalk,"));

    // Second time will fail because the output folder is not empty
    assert!(handle_run_command(&study_path, &opts, Some(Settings::default())).is_err());
}
