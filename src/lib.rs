//! Common functionality for asc-calib.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod adjust;
pub mod cli;
pub mod filter;
pub mod id;
pub mod input;
pub mod log;
pub mod mode;
pub mod output;
pub mod region;
pub mod scheduler;
pub mod settings;
pub mod simulation;
pub mod study;
pub mod table;

#[cfg(test)]
mod fixture;

/// Get the path to the configuration directory for asc-calib.
///
/// Falls back to the current directory if the platform has no notion of a config directory.
pub fn get_config_dir() -> PathBuf {
    let Some(mut dir) = dirs::config_dir() else {
        return PathBuf::from(".");
    };

    dir.push("asc-calib");
    dir
}
