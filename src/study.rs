//! Calibration studies, which repeatedly run the simulation and adjust the alternative-specific
//! constants until simulated mode shares match the targets.
use crate::filter::{MAIN_MODE_COLUMN, filter_modes, filter_persons};
use crate::mode::{AscMap, Mode, ModeShareMap};
use crate::output::CalibrationWriter;
use crate::region::Region;
use crate::scheduler::{ChainScheduler, LearningRateScheduler};
use crate::simulation::{JavaRunner, RunOutput, RunRequest, SimulationRunner};
use crate::table::Table;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::info;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub mod config;
use config::{StudyConfig, check_initial_asc, check_modes, check_target};

/// The column identifying the person in both the persons and trips tables
pub const PERSON_COLUMN: &str = "person";

/// The name of the subfolder of the study output folder containing simulation runs
const RUNS_DIRECTORY: &str = "runs";

/// Shares are clamped to this value when taking logarithms
const MIN_SHARE: f64 = 1e-6;

/// A transformation applied to a table of simulation output
pub type TableTransform = Box<dyn Fn(Table) -> Result<Table>>;

/// Everything needed to create a mode share study
pub struct StudyParams {
    /// The study name, used to derive run IDs
    pub name: String,
    /// The modes being calibrated
    pub modes: Vec<Mode>,
    /// The reference mode, whose constant is kept fixed
    pub fixed_mode: Mode,
    /// Observed mode shares
    pub target: ModeShareMap,
    /// Starting values for the constants. Modes not included start at zero.
    pub initial_asc: AscMap,
    /// Applied to the persons output of each run
    pub transform_persons: TableTransform,
    /// Applied to the trips output of each run
    pub transform_trips: TableTransform,
    /// The learning rate schedule
    pub lr: Box<dyn LearningRateScheduler>,
    /// Decides when runs continue from the previous run's plans
    pub chain_runs: Box<dyn ChainScheduler>,
}

/// The outcome of evaluating a set of simulated mode shares against the targets
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// The mean absolute error over all modes
    pub loss: f64,
    /// The signed error (simulated minus target) for each mode
    pub errors: ModeShareMap,
}

/// Scores simulated mode shares against the target shares
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    target: ModeShareMap,
}

impl Objective {
    /// Create a new objective for the given targets
    pub fn new(target: ModeShareMap) -> Self {
        Self { target }
    }

    /// The target mode shares
    pub fn target(&self) -> &ModeShareMap {
        &self.target
    }

    /// Evaluate simulated shares. Modes missing from `shares` count as having a share of zero.
    pub fn evaluate(&self, shares: &ModeShareMap) -> Evaluation {
        let errors: ModeShareMap = self
            .target
            .iter()
            .map(|(mode, target)| {
                let share = shares.get(mode).copied().unwrap_or(0.0);
                (mode.clone(), share - target)
            })
            .collect();
        let loss = errors.values().map(|error| error.abs()).sum::<f64>() / errors.len() as f64;

        Evaluation { loss, errors }
    }
}

/// The record of a completed trial
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// The trial number (starting at 1)
    pub number: u32,
    /// The output of the simulation run
    pub run: RunOutput,
    /// The constants the simulation was run with
    pub asc: AscMap,
    /// The resulting mode shares
    pub shares: ModeShareMap,
    /// How close the shares were to the targets
    pub evaluation: Evaluation,
}

/// Calculate mode shares from simulated trips.
///
/// Only trips made by `persons` and with one of `modes` as their main mode are counted.
pub fn calc_mode_share(persons: &Table, trips: &Table, modes: &[Mode]) -> Result<ModeShareMap> {
    let person_ids: HashSet<&str> = persons.column(PERSON_COLUMN)?.collect();
    let person_idx = trips.column_index(PERSON_COLUMN)?;
    let mode_idx = trips.column_index(MAIN_MODE_COLUMN)?;

    let mut counts: IndexMap<Mode, u64> = modes.iter().map(|mode| (mode.clone(), 0)).collect();
    for row in trips.rows() {
        if !person_ids.contains(&row[person_idx]) {
            continue;
        }

        if let Some(count) = counts.get_mut(&row[mode_idx]) {
            *count += 1;
        }
    }

    let total: u64 = counts.values().sum();
    ensure!(total > 0, "No trips found for the calibrated modes");

    Ok(counts
        .into_iter()
        .map(|(mode, count)| (mode, count as f64 / total as f64))
        .collect())
}

/// Calculate the constants for the next trial.
///
/// This is the standard correction for multinomial logit models, relative to the fixed mode and
/// scaled by the learning rate. The fixed mode's constant is left unchanged.
pub fn update_asc(
    asc: &AscMap,
    shares: &ModeShareMap,
    target: &ModeShareMap,
    fixed_mode: &Mode,
    lr: f64,
) -> AscMap {
    let log_ratio = |mode: &Mode| {
        let target = target.get(mode).copied().unwrap_or(0.0).max(MIN_SHARE);
        let share = shares.get(mode).copied().unwrap_or(0.0).max(MIN_SHARE);
        (target / share).ln()
    };
    let fixed_ratio = log_ratio(fixed_mode);

    asc.iter()
        .map(|(mode, value)| {
            if mode == fixed_mode {
                (mode.clone(), *value)
            } else {
                (mode.clone(), value + lr * (log_ratio(mode) - fixed_ratio))
            }
        })
        .collect()
}

/// A mode share calibration study
pub struct Study {
    params: StudyParams,
    runner: Box<dyn SimulationRunner>,
    runs_dir: PathBuf,
    writer: CalibrationWriter,
    trials: Vec<Trial>,
}

/// Create a mode share study.
///
/// # Arguments
///
/// * `params` - The study parameters
/// * `runner` - Runs the simulation for each trial
/// * `output_dir` - Folder for simulation runs and calibration results
///
/// # Returns
///
/// The study along with the objective it should be optimised against
pub fn create_mode_share_study(
    params: StudyParams,
    runner: Box<dyn SimulationRunner>,
    output_dir: &Path,
) -> Result<(Study, Objective)> {
    check_modes(&params.modes, &params.fixed_mode)?;
    check_target(&params.modes, &params.target)?;
    check_initial_asc(&params.modes, &params.initial_asc)?;

    let writer = CalibrationWriter::create(output_dir)?;
    let objective = Objective::new(params.target.clone());
    let study = Study {
        params,
        runner,
        runs_dir: output_dir.join(RUNS_DIRECTORY),
        writer,
        trials: Vec::new(),
    };

    Ok((study, objective))
}

/// Create a study which runs MATSim with `java`, as described by a study file.
///
/// Persons are filtered to the study region (if one is given) and freight trips are removed.
pub fn create_java_study(config: &StudyConfig, output_dir: &Path) -> Result<(Study, Objective)> {
    let region = config
        .region
        .as_ref()
        .map(|source| Region::from_path(&source.file, &source.crs))
        .transpose()
        .context("Failed to load study region.")?;

    let transform_persons: TableTransform = match region {
        Some(region) => Box::new(move |persons| filter_persons(persons, &region)),
        None => Box::new(Ok::<Table, anyhow::Error>),
    };

    let runner = JavaRunner {
        java: config.java_executable.clone(),
        jar: config.jar.clone(),
        config: config.config.clone(),
        jvm_args: config.jvm_args.clone(),
        args: config.args.clone(),
        subpopulation: config.subpopulation.clone(),
    };

    let params = StudyParams {
        name: config.name.clone(),
        modes: config.modes.clone(),
        fixed_mode: config.fixed_mode.clone(),
        target: config.target.clone(),
        initial_asc: config.initial_asc.clone(),
        transform_persons,
        transform_trips: Box::new(filter_modes),
        lr: config.learning_rate.build()?,
        chain_runs: config.chain_runs.build(),
    };

    create_mode_share_study(params, Box::new(runner), output_dir)
}

impl Study {
    /// The trials completed so far
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// The completed trial with the lowest loss
    pub fn best_trial(&self) -> Option<&Trial> {
        self.trials
            .iter()
            .min_by(|a, b| a.evaluation.loss.total_cmp(&b.evaluation.loss))
    }

    /// The constants for the next trial
    fn next_asc(&self) -> Result<AscMap> {
        let Some(last) = self.trials.last() else {
            // Every mode gets a constant, starting from zero if no initial value was given
            return Ok(self
                .params
                .modes
                .iter()
                .map(|mode| {
                    let asc = self.params.initial_asc.get(mode).copied().unwrap_or(0.0);
                    (mode.clone(), asc)
                })
                .collect());
        };

        // The update after the first trial is the first update
        let n = u32::try_from(self.trials.len())?;
        Ok(update_asc(
            &last.asc,
            &last.shares,
            &self.params.target,
            &self.params.fixed_mode,
            self.params.lr.learning_rate(n),
        ))
    }

    /// Run a single trial
    fn run_trial(&mut self, objective: &Objective) -> Result<()> {
        let completed = u32::try_from(self.trials.len())?;
        let number = completed + 1;
        let run_id = format!("{}-{number:03}", self.params.name);
        let asc = self.next_asc()?;

        let input_plans = self
            .trials
            .last()
            .filter(|_| self.params.chain_runs.chain(completed))
            .map(|last| last.run.plans_file());
        if let Some(plans) = &input_plans {
            info!("Chaining run {run_id} from {}", plans.display());
        }

        let output_dir = self.runs_dir.join(&run_id);
        let request = RunRequest {
            run_id: &run_id,
            output_dir: &output_dir,
            asc: &asc,
            input_plans: input_plans.as_deref(),
        };
        let run = self.runner.run(&request)?;

        let persons = Table::from_path(&run.persons_file()?)?;
        let trips = Table::from_path(&run.trips_file()?)?;
        let persons = (self.params.transform_persons)(persons)
            .with_context(|| format!("Failed to filter persons of run {run_id}"))?;
        let trips = (self.params.transform_trips)(trips)
            .with_context(|| format!("Failed to filter trips of run {run_id}"))?;

        let shares = calc_mode_share(&persons, &trips, &self.params.modes)
            .with_context(|| format!("Failed to calculate mode shares of run {run_id}"))?;
        let evaluation = objective.evaluate(&shares);

        let trial = Trial {
            number,
            run,
            asc,
            shares,
            evaluation,
        };
        self.writer.write_trial(&trial, objective.target())?;
        self.writer.flush()?;
        info!(
            "Trial {number} ({run_id}) finished with loss {:.6}",
            trial.evaluation.loss
        );

        self.trials.push(trial);

        Ok(())
    }

    /// Run `n_trials` trials against `objective`.
    ///
    /// # Returns
    ///
    /// The best trial so far
    pub fn optimize(&mut self, objective: &Objective, n_trials: u32) -> Result<&Trial> {
        ensure!(n_trials > 0, "Number of trials cannot be zero");

        for _ in 0..n_trials {
            self.run_trial(objective)?;
        }

        let best = self.best_trial().context("No trials have been run")?;
        info!(
            "Best trial: {} with loss {:.6}",
            best.number, best.evaluation.loss
        );
        self.writer.write_best(best)?;

        Ok(best)
    }
}
