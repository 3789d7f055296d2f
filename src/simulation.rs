//! Running the transport simulation for a single calibration trial.
//!
//! The simulation itself is an external program. [`JavaRunner`] launches a MATSim application jar
//! and blocks until it has finished.
use crate::mode::AscMap;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::{debug, info};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// The file name stem of the persons output file
const PERSONS_OUTPUT: &str = "output_persons";

/// The file name stem of the trips output file
const TRIPS_OUTPUT: &str = "output_trips";

/// The file name of the plans output file, used as input when chaining runs
const PLANS_OUTPUT: &str = "output_plans.xml.gz";

/// The parameters for a single simulation run
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest<'a> {
    /// A unique identifier for the run
    pub run_id: &'a str,
    /// The folder the simulation should write its output to
    pub output_dir: &'a Path,
    /// The alternative-specific constant for every mode
    pub asc: &'a AscMap,
    /// Plans to start from instead of the ones in the simulation config
    pub input_plans: Option<&'a Path>,
}

/// The location of a finished run's output
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// The run identifier
    pub run_id: String,
    /// The folder containing the run's output files
    pub output_dir: PathBuf,
}

impl RunOutput {
    /// Find an output file, which may or may not be compressed or prefixed with the run ID
    fn find_file(&self, stem: &str) -> Result<PathBuf> {
        let candidates = [
            format!("{}.{stem}.csv.gz", self.run_id),
            format!("{}.{stem}.csv", self.run_id),
            format!("{stem}.csv.gz"),
            format!("{stem}.csv"),
        ];

        candidates
            .iter()
            .map(|name| self.output_dir.join(name))
            .find(|path| path.is_file())
            .with_context(|| {
                format!(
                    "Could not find {stem} file for run {} in {}",
                    self.run_id,
                    self.output_dir.display()
                )
            })
    }

    /// The persons file written by the simulation
    pub fn persons_file(&self) -> Result<PathBuf> {
        self.find_file(PERSONS_OUTPUT)
    }

    /// The trips file written by the simulation
    pub fn trips_file(&self) -> Result<PathBuf> {
        self.find_file(TRIPS_OUTPUT)
    }

    /// The final plans written by the simulation
    pub fn plans_file(&self) -> PathBuf {
        self.output_dir.join(format!("{}.{PLANS_OUTPUT}", self.run_id))
    }
}

/// Something which can run the simulation with a given set of constants
pub trait SimulationRunner {
    /// Run the simulation to completion
    fn run(&mut self, request: &RunRequest) -> Result<RunOutput>;
}

/// Runs a MATSim application jar with `java`
#[derive(Debug, Clone, PartialEq)]
pub struct JavaRunner {
    /// The `java` executable
    pub java: PathBuf,
    /// The application jar
    pub jar: PathBuf,
    /// The simulation config file
    pub config: PathBuf,
    /// Arguments passed to the JVM
    pub jvm_args: Vec<String>,
    /// Extra arguments passed to the application
    pub args: Vec<String>,
    /// The subpopulation whose scoring parameters are calibrated
    pub subpopulation: String,
}

impl JavaRunner {
    /// Build the command for a run
    pub fn command(&self, request: &RunRequest) -> Command {
        let mut command = Command::new(&self.java);
        command
            .args(&self.jvm_args)
            .arg("-jar")
            .arg(&self.jar)
            .arg("run")
            .arg("--config")
            .arg(&self.config)
            .arg("--output")
            .arg(request.output_dir)
            .arg("--runId")
            .arg(request.run_id);

        for (mode, asc) in request.asc {
            command.arg(format!(
                "--config:scoring.scoringParameters[subpopulation={}].modeParams[mode={mode}].constant={asc}",
                self.subpopulation
            ));
        }

        if let Some(plans) = request.input_plans {
            let mut arg = OsString::from("--config:plans.inputPlansFile=");
            arg.push(plans);
            command.arg(arg);
        }

        command.args(&self.args);
        command
    }
}

impl SimulationRunner for JavaRunner {
    fn run(&mut self, request: &RunRequest) -> Result<RunOutput> {
        fs::create_dir_all(request.output_dir).with_context(|| {
            format!(
                "Failed to create run directory: {}",
                request.output_dir.display()
            )
        })?;

        let mut command = self.command(request);
        debug!(
            "Running: {} {}",
            command.get_program().to_string_lossy(),
            command
                .get_args()
                .map(|arg| arg.to_string_lossy())
                .join(" ")
        );
        info!("Starting simulation run {}", request.run_id);

        let status = command
            .status()
            .with_context(|| format!("Failed to launch {}", self.java.display()))?;
        ensure!(
            status.success(),
            "Simulation run {} failed ({status})",
            request.run_id
        );

        Ok(RunOutput {
            run_id: request.run_id.to_string(),
            output_dir: request.output_dir.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::mode_map;
    use tempfile::tempdir;

    fn runner() -> JavaRunner {
        JavaRunner {
            java: "java".into(),
            jar: "scenario.jar".into(),
            config: "config.xml".into(),
            jvm_args: vec!["-Xmx4G".into()],
            args: vec!["--10pct".into()],
            subpopulation: "person".into(),
        }
    }

    #[test]
    fn test_java_runner_command() {
        let asc = mode_map([("walk", 0.0), ("car", 0.5)]);
        let plans = PathBuf::from("prev/plans.xml.gz");
        let request = RunRequest {
            run_id: "calib-001",
            output_dir: Path::new("out/calib-001"),
            asc: &asc,
            input_plans: Some(&plans),
        };

        let command = runner().command(&request);
        assert_eq!(command.get_program(), "java");
        let args = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect_vec();
        assert_eq!(
            args,
            [
                "-Xmx4G",
                "-jar",
                "scenario.jar",
                "run",
                "--config",
                "config.xml",
                "--output",
                "out/calib-001",
                "--runId",
                "calib-001",
                "--config:scoring.scoringParameters[subpopulation=person].modeParams[mode=walk].constant=0",
                "--config:scoring.scoringParameters[subpopulation=person].modeParams[mode=car].constant=0.5",
                "--config:plans.inputPlansFile=prev/plans.xml.gz",
                "--10pct",
            ]
        );
    }

    #[test]
    fn test_java_runner_command_no_plans() {
        let asc = AscMap::new();
        let request = RunRequest {
            run_id: "r",
            output_dir: Path::new("out"),
            asc: &asc,
            input_plans: None,
        };

        let command = runner().command(&request);
        assert!(
            !command
                .get_args()
                .any(|arg| arg.to_string_lossy().contains("inputPlansFile"))
        );
    }

    #[test]
    fn test_run_output_find_file() {
        let dir = tempdir().unwrap();
        let output = RunOutput {
            run_id: "run1".into(),
            output_dir: dir.path().to_path_buf(),
        };
        assert!(output.trips_file().is_err());

        fs::write(dir.path().join("output_trips.csv"), "").unwrap();
        assert_eq!(
            output.trips_file().unwrap(),
            dir.path().join("output_trips.csv")
        );

        // Prefixed, compressed output is preferred
        fs::write(dir.path().join("run1.output_trips.csv.gz"), "").unwrap();
        assert_eq!(
            output.trips_file().unwrap(),
            dir.path().join("run1.output_trips.csv.gz")
        );

        assert_eq!(
            output.plans_file(),
            dir.path().join("run1.output_plans.xml.gz")
        );
    }
}
