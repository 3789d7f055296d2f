//! The module responsible for writing output data to disk.
use crate::mode::{Mode, ModeShareMap};
use crate::study::Trial;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which study-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "asc_calib_results";

/// The output file name for per-trial calibration results
const CALIBRATION_FILE_NAME: &str = "calibration.csv";

/// The output file name for the constants of the best trial
const BEST_ASC_FILE_NAME: &str = "best_asc.csv";

/// Get the default output folder for the named study
pub fn get_output_dir(study_name: &str) -> Result<PathBuf> {
    ensure!(
        !study_name.is_empty() && !study_name.contains(['/', '\\']),
        "Invalid study name for output folder: '{study_name}'"
    );

    Ok([OUTPUT_DIRECTORY_ROOT, study_name].iter().collect())
}

/// Create a new output directory for a study.
///
/// If the folder already exists and is not empty, it is only replaced if `allow_overwrite` is set.
///
/// # Returns
///
/// True if an existing folder was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command line option."
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row in the calibration results CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CalibrationRow {
    trial: u32,
    run_id: String,
    mode: Mode,
    asc: f64,
    share: f64,
    target: f64,
    error: f64,
}

/// Represents a row in the best constants CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct BestAscRow {
    mode: Mode,
    asc: f64,
}

/// An object for writing calibration results to file
pub struct CalibrationWriter {
    output_path: PathBuf,
    writer: csv::Writer<File>,
}

impl CalibrationWriter {
    /// Open the calibration results file in the given folder
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    pub fn create(output_path: &Path) -> Result<Self> {
        let file_path = output_path.join(CALIBRATION_FILE_NAME);
        let writer = csv::Writer::from_path(&file_path)
            .with_context(|| format!("Failed to create {}", file_path.display()))?;

        Ok(Self {
            output_path: output_path.to_path_buf(),
            writer,
        })
    }

    /// Write one row per mode for a completed trial
    pub fn write_trial(&mut self, trial: &Trial, target: &ModeShareMap) -> Result<()> {
        for (mode, target) in target {
            let row = CalibrationRow {
                trial: trial.number,
                run_id: trial.run.run_id.clone(),
                mode: mode.clone(),
                asc: trial.asc.get(mode).copied().unwrap_or(0.0),
                share: trial.shares.get(mode).copied().unwrap_or(0.0),
                target: *target,
                error: trial.evaluation.errors.get(mode).copied().unwrap_or(0.0),
            };
            self.writer.serialize(row)?;
        }

        Ok(())
    }

    /// Write the constants of the best trial to their own file
    pub fn write_best(&self, trial: &Trial) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.output_path.join(BEST_ASC_FILE_NAME))?;
        for (mode, asc) in &trial.asc {
            writer.serialize(BestAscRow {
                mode: mode.clone(),
                asc: *asc,
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Flush the underlying stream
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;

        Ok(())
    }
}
