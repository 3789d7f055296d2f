//! Adjustment of survey mode shares to the trip distance distribution of the simulation.
//!
//! Survey mode shares are reported per distance group. Before calibrating, the share of trips in
//! each distance group is taken from the simulation, while the survey's split between modes within
//! each group is kept.
use crate::table::Table;
use anyhow::{Context, Result};
use csv::StringRecord;
use indexmap::IndexMap;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// The file name of the survey mode shares
pub const SURVEY_FILE_NAME: &str = "mid.csv";

/// The file name of the simulated mode shares
pub const SIM_FILE_NAME: &str = "sim.csv";

/// The file name for the adjusted survey mode shares
pub const ADJUSTED_FILE_NAME: &str = "mid_adj.csv";

const MODE_COLUMN: &str = "mode";
const DIST_GROUP_COLUMN: &str = "dist_group";
const SHARE_COLUMN: &str = "share";

/// Mode shares keyed by distance group and then by mode
type GroupedShares = IndexMap<String, IndexMap<String, f64>>;

/// Read the `mode`, `dist_group` and `share` columns of a table into a nested map.
///
/// Duplicate (group, mode) rows are summed.
fn grouped_shares(table: &Table) -> Result<GroupedShares> {
    let mode_idx = table.column_index(MODE_COLUMN)?;
    let group_idx = table.column_index(DIST_GROUP_COLUMN)?;
    let share_idx = table.column_index(SHARE_COLUMN)?;

    let mut map = GroupedShares::new();
    for row in table.rows() {
        let share: f64 = row[share_idx]
            .trim()
            .parse()
            .with_context(|| format!("Invalid share: '{}'", &row[share_idx]))?;
        *map.entry(row[group_idx].to_string())
            .or_default()
            .entry(row[mode_idx].to_string())
            .or_default() += share;
    }

    Ok(map)
}

/// Adjust survey mode shares so that the share of each distance group matches the simulation.
///
/// Within each distance group the survey's proportions between modes are preserved, but they are
/// rescaled so that the group total equals the simulated group total. Groups with a zero survey
/// total, or that are missing from the simulation, are left unchanged.
///
/// # Arguments
///
/// * `sim` - Simulated mode shares with `mode`, `dist_group` and `share` columns
/// * `survey` - Survey mode shares with the same columns
///
/// # Returns
///
/// The total absolute difference between adjusted and simulated shares, along with the adjusted
/// table (`dist_group`, `mode` and `share` columns, in survey order).
pub fn calc_adjusted_mode_share(sim: &Table, survey: &Table) -> Result<(f64, Table)> {
    let sim_shares = grouped_shares(sim).context("Invalid simulated mode shares")?;
    let survey_shares = grouped_shares(survey).context("Invalid survey mode shares")?;

    let mut error = 0.0;
    let mut rows = Vec::new();
    for (group, modes) in &survey_shares {
        let survey_total: f64 = modes.values().sum();
        let sim_modes = sim_shares.get(group);
        let scale = match sim_modes {
            Some(sim_modes) if survey_total > 0.0 => {
                sim_modes.values().sum::<f64>() / survey_total
            }
            _ => 1.0,
        };

        for (mode, share) in modes {
            let adjusted = share * scale;
            let simulated = sim_modes
                .and_then(|sim_modes| sim_modes.get(mode))
                .copied()
                .unwrap_or(0.0);
            error += (adjusted - simulated).abs();
            rows.push(StringRecord::from(vec![
                group.clone(),
                mode.clone(),
                adjusted.to_string(),
            ]));
        }
    }

    let table = Table::new(
        StringRecord::from(vec![DIST_GROUP_COLUMN, MODE_COLUMN, SHARE_COLUMN]),
        rows,
    )?;

    Ok((error, table))
}

/// Run the optional adjustment step in `dir`.
///
/// If both the survey and simulated mode share files are present, the adjusted survey shares are
/// written to [`ADJUSTED_FILE_NAME`]. Otherwise nothing happens.
///
/// # Returns
///
/// The path to the adjusted file, if it was written.
pub fn run_adjustment(dir: &Path) -> Result<Option<PathBuf>> {
    let survey_path = dir.join(SURVEY_FILE_NAME);
    let sim_path = dir.join(SIM_FILE_NAME);
    if !survey_path.is_file() || !sim_path.is_file() {
        debug!(
            "Skipping mode share adjustment: {SURVEY_FILE_NAME} and {SIM_FILE_NAME} not found in {}",
            dir.display()
        );
        return Ok(None);
    }

    let survey = Table::from_path(&survey_path)?;
    let sim = Table::from_path(&sim_path)?;
    let (error, adjusted) = calc_adjusted_mode_share(&sim, &survey)?;

    println!("{}", survey.group_sums(MODE_COLUMN)?);
    println!("Adjusted");
    println!("{}", adjusted.group_sums(MODE_COLUMN)?);

    let adjusted_path = dir.join(ADJUSTED_FILE_NAME);
    adjusted.write_csv(&adjusted_path)?;
    info!(
        "Wrote adjusted mode shares to {} (difference to simulation: {error:.6})",
        adjusted_path.display()
    );

    Ok(Some(adjusted_path))
}
