//! The command line interface for running calibration studies.
use crate::adjust::run_adjustment;
use crate::log;
use crate::output::metadata::write_metadata;
use crate::output::{create_output_directory, get_output_dir};
use crate::region::Region;
use crate::settings::Settings;
use crate::study::config::StudyConfig;
use crate::study::create_java_study;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::env;
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for mode share calibration.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Number of trials to run, overriding the value in the study file
    #[arg(short = 'n', long)]
    pub iterations: Option<u32>,
    /// Don't adjust the survey mode shares before calibrating
    #[arg(long)]
    pub skip_adjustment: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a calibration study.
    Run {
        /// Path to the study file.
        study_file: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Rescale survey mode shares to the simulated distance distribution.
    Adjust {
        /// Folder containing mid.csv and sim.csv. Defaults to the current directory.
        dir: Option<PathBuf>,
    },
    /// Manage example studies.
    Example {
        /// The available subcommands for managing example studies.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Validate a study file.
    Validate {
        /// Path to the study file.
        study_file: PathBuf,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { study_file, opts } => handle_run_command(&study_file, &opts, None),
            Self::Adjust { dir } => handle_adjust_command(dir.as_deref(), None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Validate { study_file } => handle_validate_command(&study_file, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start the calibration tool
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ asc-calib --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Use the supplied settings or load them from the settings file
fn settings_or_load(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Handle the `run` command.
pub fn handle_run_command(
    study_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = settings_or_load(settings)?;

    // Errors in the study file should be reported before anything is written to disk
    let config = StudyConfig::from_path(study_path).context("Failed to load study.")?;
    let iterations = opts.iterations.unwrap_or(config.iterations);

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(&config.name)?;
        &pathbuf
    };

    let overwrite = create_output_directory(output_path, opts.overwrite || settings.overwrite)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger
    log::init(&settings.log_level, Some(output_path)).context("Failed to initialise logging.")?;
    info!("Loaded study from {}", study_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    write_metadata(output_path, study_path, iterations).context("Failed to save metadata.")?;

    if !opts.skip_adjustment {
        run_adjustment(&config.survey_dir).context("Failed to adjust survey mode shares.")?;
    }

    let (mut study, objective) =
        create_java_study(&config, output_path).context("Failed to create study.")?;
    let best = study.optimize(&objective, iterations)?;
    info!(
        "Calibration complete! Best run: {} (loss {:.6})",
        best.run.run_id, best.evaluation.loss
    );

    Ok(())
}

/// Handle the `adjust` command.
pub fn handle_adjust_command(dir: Option<&Path>, settings: Option<Settings>) -> Result<()> {
    let settings = settings_or_load(settings)?;
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir()?,
    };

    if run_adjustment(&dir)?.is_none() {
        warn!(
            "Nothing to adjust: {} does not contain both survey and simulated mode shares",
            dir.display()
        );
    }

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(study_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = settings_or_load(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    let config = StudyConfig::from_path(study_path).context("Failed to validate study.")?;
    if let Some(source) = &config.region {
        let region = Region::from_path(&source.file, &source.crs)
            .context("Failed to load study region.")?;
        info!(
            "Loaded region with {} polygon(s) from {}",
            region.geometry().0.len(),
            source.file.display()
        );
    }

    if !config.jar.is_file() {
        warn!("Simulation jar not found: {}", config.jar.display());
    }
    if !config.config.is_file() {
        warn!("Simulation config not found: {}", config.config.display());
    }

    info!("Study validation successful!");

    Ok(())
}
