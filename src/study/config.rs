//! Defines the `StudyConfig` struct, which represents the contents of a study file.
use crate::input::{check_proportion, input_err_msg, read_toml};
use crate::mode::{AscMap, Mode, ModeShareMap, lausitz};
use crate::region::DEFAULT_CRS;
use crate::scheduler::{ChainConfig, LearningRateConfig};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use log::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// How far the target shares may sum from 1 before a warning is raised
const TARGET_SUM_TOLERANCE: f64 = 1e-3;

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_iterations, u32, 10);
define_param_default!(default_java_executable, PathBuf, PathBuf::from("java"));
define_param_default!(default_subpopulation, String, "person".into());
define_param_default!(default_crs, String, DEFAULT_CRS.into());
define_param_default!(default_fixed_mode, String, lausitz::FIXED_MODE.into());
define_param_default!(
    default_modes,
    Vec<String>,
    lausitz::MODES.map(String::from).to_vec()
);
define_param_default!(
    default_initial_asc,
    IndexMap<String, f64>,
    lausitz::INITIAL_ASC
        .into_iter()
        .map(|(mode, asc)| (mode.to_string(), asc))
        .collect()
);
define_param_default!(
    default_target,
    IndexMap<String, f64>,
    lausitz::TARGET
        .into_iter()
        .map(|(mode, share)| (mode.to_string(), share))
        .collect()
);

/// The region used to filter the simulated population
#[derive(Debug, Deserialize, PartialEq)]
struct RegionConfig {
    file: PathBuf,
    #[serde(default = "default_crs")]
    crs: String,
}

/// The raw contents of a study file, before validation
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct StudyFile {
    name: String,
    jar: PathBuf,
    config: PathBuf,
    #[serde(default = "default_modes")]
    modes: Vec<String>,
    #[serde(default = "default_fixed_mode")]
    fixed_mode: String,
    #[serde(default = "default_initial_asc")]
    initial_asc: IndexMap<String, f64>,
    #[serde(default = "default_target")]
    target: IndexMap<String, f64>,
    #[serde(default)]
    args: String,
    #[serde(default)]
    jvm_args: String,
    #[serde(default = "default_java_executable")]
    java_executable: PathBuf,
    #[serde(default = "default_subpopulation")]
    subpopulation: String,
    #[serde(default = "default_iterations")]
    iterations: u32,
    region: Option<RegionConfig>,
    survey_dir: Option<PathBuf>,
    #[serde(default)]
    learning_rate: LearningRateConfig,
    #[serde(default)]
    chain_runs: ChainConfig,
}

/// The location and CRS of the study region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSource {
    /// Path to the region geometry file
    pub file: PathBuf,
    /// The CRS the geometries are declared to be in
    pub crs: String,
}

/// A validated calibration study configuration.
///
/// Relative paths in the study file are resolved against the folder containing it.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyConfig {
    /// The study name, used to derive run IDs and the output folder
    pub name: String,
    /// Path to the runnable simulation jar
    pub jar: PathBuf,
    /// Path to the simulation config file
    pub config: PathBuf,
    /// The modes being calibrated
    pub modes: Vec<Mode>,
    /// The reference mode, whose constant is kept fixed
    pub fixed_mode: Mode,
    /// Starting values for the constants
    pub initial_asc: AscMap,
    /// Observed mode shares
    pub target: ModeShareMap,
    /// Extra arguments passed to the simulation
    pub args: Vec<String>,
    /// Arguments passed to the JVM
    pub jvm_args: Vec<String>,
    /// The `java` executable
    pub java_executable: PathBuf,
    /// The subpopulation whose scoring parameters are calibrated
    pub subpopulation: String,
    /// The number of trials to run
    pub iterations: u32,
    /// The region used to filter persons (if any)
    pub region: Option<RegionSource>,
    /// The folder which may contain survey and simulated mode shares to adjust
    pub survey_dir: PathBuf,
    /// The learning rate schedule
    pub learning_rate: LearningRateConfig,
    /// The run chaining schedule
    pub chain_runs: ChainConfig,
}

/// Resolve `path` against `base_dir` unless it is absolute
fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Split a string of command-line arguments on whitespace
fn split_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(String::from).collect()
}

/// Check that the modes are non-empty and unique, and that the fixed mode is among them
pub fn check_modes(modes: &[Mode], fixed_mode: &Mode) -> Result<()> {
    ensure!(!modes.is_empty(), "No modes provided");

    let unique: IndexSet<&Mode> = modes.iter().collect();
    ensure!(unique.len() == modes.len(), "Modes must be unique");

    ensure!(
        modes.contains(fixed_mode),
        "Fixed mode {fixed_mode} is not one of the calibrated modes"
    );

    Ok(())
}

/// Check that there is a valid target share for each mode and for no other modes
pub fn check_target(modes: &[Mode], target: &ModeShareMap) -> Result<()> {
    for (mode, share) in target {
        ensure!(
            modes.contains(mode),
            "Target given for mode {mode}, which is not calibrated"
        );
        ensure!(
            check_proportion(*share),
            "Target share for mode {mode} must be between 0 and 1"
        );
    }

    for mode in modes {
        ensure!(target.contains_key(mode), "Missing target for mode {mode}");
    }

    let total: f64 = target.values().sum();
    if (total - 1.0).abs() > TARGET_SUM_TOLERANCE {
        warn!("Target shares sum to {total}, not 1");
    }

    Ok(())
}

/// Check that initial constants are only given for calibrated modes
pub fn check_initial_asc(modes: &[Mode], initial_asc: &AscMap) -> Result<()> {
    for (mode, asc) in initial_asc {
        ensure!(
            modes.contains(mode),
            "Initial constant given for mode {mode}, which is not calibrated"
        );
        ensure!(
            asc.is_finite(),
            "Initial constant for mode {mode} must be a finite number"
        );
    }

    Ok(())
}

impl StudyConfig {
    /// Read a study file.
    ///
    /// # Arguments
    ///
    /// * `file_path` - Path to the study TOML file
    ///
    /// # Returns
    ///
    /// The validated study configuration or an error if the file is invalid
    pub fn from_path(file_path: &Path) -> Result<StudyConfig> {
        let file: StudyFile = read_toml(file_path)?;
        let base_dir = file_path.parent().unwrap_or(Path::new(""));

        Self::from_file(file, base_dir).with_context(|| input_err_msg(file_path))
    }

    /// Convert the raw file contents into a validated config
    fn from_file(file: StudyFile, base_dir: &Path) -> Result<StudyConfig> {
        ensure!(!file.name.trim().is_empty(), "Study name cannot be empty");
        ensure!(file.iterations > 0, "iterations cannot be zero");

        let to_mode_map = |map: IndexMap<String, f64>| -> IndexMap<Mode, f64> {
            map.into_iter()
                .map(|(mode, value)| (Mode::from(mode), value))
                .collect()
        };

        let config = StudyConfig {
            name: file.name,
            jar: resolve_path(base_dir, &file.jar),
            config: resolve_path(base_dir, &file.config),
            modes: file.modes.into_iter().map(Mode::from).collect(),
            fixed_mode: file.fixed_mode.into(),
            initial_asc: to_mode_map(file.initial_asc),
            target: to_mode_map(file.target),
            args: split_args(&file.args),
            jvm_args: split_args(&file.jvm_args),
            java_executable: file.java_executable,
            subpopulation: file.subpopulation,
            iterations: file.iterations,
            region: file.region.map(|region| RegionSource {
                file: resolve_path(base_dir, &region.file),
                crs: region.crs,
            }),
            survey_dir: resolve_path(base_dir, &file.survey_dir.unwrap_or_default()),
            learning_rate: file.learning_rate,
            chain_runs: file.chain_runs,
        };
        config.validate()?;

        Ok(config)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_modes(&self.modes, &self.fixed_mode)?;
        check_target(&self.modes, &self.target)?;
        check_initial_asc(&self.modes, &self.initial_asc)?;

        // Check the scheduler can be built
        self.learning_rate.build()?;

        Ok(())
    }
}
