//! Integration tests for the `validate` command.
use asc_calib::cli::handle_validate_command;
use asc_calib::log::is_logger_initialised;
use asc_calib::settings::Settings;
use std::fs;
use tempfile::tempdir;

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("ASC_CALIB_LOG_LEVEL", "off") };

    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("region.wkt"),
        "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))",
    )
    .unwrap();
    let study_path = dir.path().join("study.toml");
    fs::write(
        &study_path,
        r#"
name = "validate"
jar = "scenario.jar"
config = "config.xml"

[region]
file = "region.wkt"
"#,
    )
    .unwrap();

    assert!(!is_logger_initialised());

    handle_validate_command(&study_path, Some(Settings::default())).unwrap();

    assert!(is_logger_initialised());
}
