//! Distance command - great-circle distance between two points.

use geovisit::geo::Coordinate;

use crate::error::CliError;

pub fn run(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<f64, CliError> {
    let from = Coordinate::new(lat1, lon1).map_err(|e| CliError::Input(e.to_string()))?;
    let to = Coordinate::new(lat2, lon2).map_err(|e| CliError::Input(e.to_string()))?;
    Ok(from.distance_to(&to))
}
