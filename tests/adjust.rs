//! Integration tests for the `adjust` command.
use asc_calib::adjust::{ADJUSTED_FILE_NAME, SIM_FILE_NAME, SURVEY_FILE_NAME};
use asc_calib::cli::handle_adjust_command;
use asc_calib::settings::Settings;
use std::fs;
use tempfile::tempdir;

/// Check that the adjusted survey shares are written next to the inputs
#[test]
fn test_handle_adjust_command() {
    unsafe { std::env::set_var("ASC_CALIB_LOG_LEVEL", "off") };

    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join(SURVEY_FILE_NAME),
        "mode;dist_group;share\nwalk;0 - 1000;0.3\ncar;0 - 1000;0.1\ncar;1000 - 5000;0.6\n",
    )
    .unwrap();
    fs::write(
        dir.path().join(SIM_FILE_NAME),
        "mode,dist_group,share\nwalk,0 - 1000,0.1\ncar,0 - 1000,0.1\ncar,1000 - 5000,0.8\n",
    )
    .unwrap();

    handle_adjust_command(Some(dir.path()), Some(Settings::default())).unwrap();

    let contents = fs::read_to_string(dir.path().join(ADJUSTED_FILE_NAME)).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("dist_group,mode,share"));
    assert_eq!(lines.count(), 3);
}
