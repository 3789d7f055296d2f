//! Filters applied to the simulated population and trips before mode shares are computed.
use crate::mode::{FREIGHT_MODE, PT_MODE, PT_SUBMODE_PREFIX};
use crate::region::Region;
use crate::table::Table;
use anyhow::{Context, Result};
use log::{debug, info};

/// The column holding the x coordinate of a person's home
pub const HOME_X_COLUMN: &str = "home_x";

/// The column holding the y coordinate of a person's home
pub const HOME_Y_COLUMN: &str = "home_y";

/// The column holding the main mode of a trip
pub const MAIN_MODE_COLUMN: &str = "main_mode";

/// Parse a coordinate value from a person record.
///
/// An empty value means the person has no home location (e.g. freight agents), giving `None`.
fn parse_coordinate(value: &str, column: &str) -> Result<Option<f64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let coordinate = value
        .parse()
        .with_context(|| format!("Invalid value for {column}: '{value}'"))?;

    Ok(Some(coordinate))
}

/// Keep only persons whose home location lies within `region`.
///
/// Coordinates are taken to be in the same CRS as the region. Points on the region's boundary are
/// kept. Persons without a home location are dropped.
pub fn filter_persons(mut persons: Table, region: &Region) -> Result<Table> {
    let x_idx = persons.column_index(HOME_X_COLUMN)?;
    let y_idx = persons.column_index(HOME_Y_COLUMN)?;

    let mut homeless = 0;
    persons.try_retain(|row| {
        let x = parse_coordinate(&row[x_idx], HOME_X_COLUMN)?;
        let y = parse_coordinate(&row[y_idx], HOME_Y_COLUMN)?;
        match (x, y) {
            (Some(x), Some(y)) => Ok(region.intersects(x, y)),
            _ => {
                homeless += 1;
                Ok(false)
            }
        }
    })?;

    if homeless > 0 {
        debug!("Dropped {homeless} persons without a home location");
    }
    info!("Filtered {} persons", persons.len());

    Ok(persons)
}

/// Remove freight trips and merge public transport sub-modes into a single `pt` mode
pub fn filter_modes(mut trips: Table) -> Result<Table> {
    let mode_idx = trips.column_index(MAIN_MODE_COLUMN)?;
    trips.retain(|row| &row[mode_idx] != FREIGHT_MODE);
    trips.map_column(MAIN_MODE_COLUMN, |mode| {
        mode.starts_with(PT_SUBMODE_PREFIX).then(|| PT_MODE.to_string())
    })?;

    Ok(trips)
}
