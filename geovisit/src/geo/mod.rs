//! Great-circle geometry on a spherical Earth.
//!
//! Provides the haversine distance used by zone containment and by the
//! significance filter, plus validation of raw latitude/longitude input.

use thiserror::Error;

/// Mean Earth radius in meters used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;
/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;
/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;
/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Errors produced when validating geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordError {
    #[error("invalid latitude: {0} (expected -90..=90)")]
    InvalidLatitude(f64),

    #[error("invalid longitude: {0} (expected -180..=180)")]
    InvalidLongitude(f64),
}

/// A validated point on the Earth's surface, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate after checking both components are finite and in range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordError> {
        validate(latitude, longitude)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Distance in meters to another coordinate.
    #[inline]
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_meters(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Checks that a latitude/longitude pair is finite and within range.
///
/// NaN fails the range check, so non-finite input is rejected here too.
pub fn validate(latitude: f64, longitude: f64) -> Result<(), CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&latitude) {
        return Err(CoordError::InvalidLatitude(latitude));
    }
    if !(MIN_LON..=MAX_LON).contains(&longitude) {
        return Err(CoordError::InvalidLongitude(longitude));
    }
    Ok(())
}

/// Great-circle distance between two points in meters.
///
/// Inputs are in degrees. The result is always `>= 0` and is exactly `0.0`
/// for identical inputs.
#[inline]
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1.0 for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Arithmetic mean of a set of coordinates.
///
/// Returns `None` for an empty iterator. Used as the cluster centroid; over
/// the sub-kilometre spans the filter works with, the planar mean is what
/// callers expect to see on a map.
pub fn centroid<I>(points: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut count = 0usize;
    let (mut sum_lat, mut sum_lon) = (0.0, 0.0);
    for (lat, lon) in points {
        sum_lat += lat;
        sum_lon += lon;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let n = count as f64;
    Some((sum_lat / n, sum_lon / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(distance_meters(55.7558, 37.6173, 55.7558, 37.6173), 0.0);
        assert_eq!(distance_meters(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_known_distance_london_paris() {
        // London -> Paris is roughly 343.5 km on a spherical Earth
        let d = distance_meters(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((d - 343_500.0).abs() < 1_500.0, "got {}", d);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = distance_meters(0.0, 0.0, 1.0, 0.0);
        let expected = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn test_antipodal_points_do_not_produce_nan() {
        let d = distance_meters(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        assert!((d - EARTH_RADIUS_METERS * std::f64::consts::PI).abs() < 1.0);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(matches!(
            validate(90.5, 0.0),
            Err(CoordError::InvalidLatitude(_))
        ));
        assert!(matches!(
            validate(0.0, -180.01),
            Err(CoordError::InvalidLongitude(_))
        ));
        assert!(matches!(
            validate(f64::NAN, 0.0),
            Err(CoordError::InvalidLatitude(_))
        ));
        assert!(validate(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_coordinate_new_and_display() {
        let c = Coordinate::new(12.5, -45.25).unwrap();
        assert_eq!(c.to_string(), "(12.500000, -45.250000)");
        assert!(Coordinate::new(100.0, 0.0).is_err());
    }

    #[test]
    fn test_centroid() {
        assert_eq!(centroid(Vec::<(f64, f64)>::new()), None);
        let c = centroid(vec![(1.0, 2.0), (3.0, 4.0)]).unwrap();
        assert_eq!(c, (2.0, 3.0));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_distance_is_symmetric_and_non_negative(
                lat1 in -90.0..90.0_f64,
                lon1 in -180.0..180.0_f64,
                lat2 in -90.0..90.0_f64,
                lon2 in -180.0..180.0_f64,
            ) {
                let ab = distance_meters(lat1, lon1, lat2, lon2);
                let ba = distance_meters(lat2, lon2, lat1, lon1);
                prop_assert!(ab >= 0.0);
                prop_assert!((ab - ba).abs() < 1e-6);
                // Never further than half the circumference
                prop_assert!(ab <= EARTH_RADIUS_METERS * std::f64::consts::PI + 1e-6);
            }

            #[test]
            fn test_distance_to_self_is_zero_everywhere(
                lat in -90.0..90.0_f64,
                lon in -180.0..180.0_f64,
            ) {
                prop_assert!(distance_meters(lat, lon, lat, lon) < 1e-9);
            }
        }
    }
}
