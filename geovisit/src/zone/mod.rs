//! Circular zones (checkpoints) and the containment test.
//!
//! A zone is a center plus a radius in meters. A coordinate is inside when
//! its great-circle distance to the center is at most the radius; the
//! boundary counts as inside.

mod catalog;

pub use catalog::{ZoneCatalog, ZoneCatalogConfig};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{self, CoordError, Coordinate};
use crate::model::ZoneId;

/// Reasons a zone definition is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZoneError {
    #[error("zone name must not be empty")]
    EmptyName,

    #[error("zone radius must be a positive number of meters, got {0}")]
    InvalidRadius(f64),

    #[error("zone center is invalid: {0}")]
    InvalidCenter(#[from] CoordError),
}

/// A zone definition that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewZone {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

impl NewZone {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64, radius_meters: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            radius_meters,
        }
    }

    /// Checks the domain rules a zone must satisfy before it is stored.
    pub fn validate(&self) -> Result<(), ZoneError> {
        if self.name.trim().is_empty() {
            return Err(ZoneError::EmptyName);
        }
        if !(self.radius_meters.is_finite() && self.radius_meters > 0.0) {
            return Err(ZoneError::InvalidRadius(self.radius_meters));
        }
        geo::validate(self.latitude, self.longitude)?;
        Ok(())
    }
}

/// A stored zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

impl Zone {
    /// Validates a definition and attaches its identifier.
    pub fn from_new(id: ZoneId, new: NewZone) -> Result<Self, ZoneError> {
        new.validate()?;
        Ok(Self {
            id,
            name: new.name,
            latitude: new.latitude,
            longitude: new.longitude,
            radius_meters: new.radius_meters,
        })
    }

    pub fn center(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Distance in meters from the zone center to a point.
    #[inline]
    pub fn distance_from_center(&self, latitude: f64, longitude: f64) -> f64 {
        geo::distance_meters(latitude, longitude, self.latitude, self.longitude)
    }

    /// Whether the point lies inside the zone (boundary inclusive).
    #[inline]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        is_inside(latitude, longitude, self)
    }
}

/// True iff the point's distance to the zone center is `<= radius_meters`.
#[inline]
pub fn is_inside(latitude: f64, longitude: f64, zone: &Zone) -> bool {
    zone.distance_from_center(latitude, longitude) <= zone.radius_meters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(radius: f64) -> Zone {
        Zone::from_new(ZoneId(1), NewZone::new("School", 0.0, 0.0, radius)).unwrap()
    }

    #[test]
    fn test_center_is_inside() {
        assert!(zone(1.0).contains(0.0, 0.0));
    }

    #[test]
    fn test_point_outside_radius() {
        // ~1.1 km north of the center
        assert!(!zone(100.0).contains(0.01, 0.0));
        assert!(zone(2_000.0).contains(0.01, 0.0));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let mut z = zone(100.0);
        let d = z.distance_from_center(0.0005, 0.0005);
        z.radius_meters = d;
        assert!(is_inside(0.0005, 0.0005, &z));
        z.radius_meters = d - 1e-6;
        assert!(!is_inside(0.0005, 0.0005, &z));
    }

    #[test]
    fn test_validation_rules() {
        assert_eq!(
            NewZone::new("  ", 0.0, 0.0, 10.0).validate(),
            Err(ZoneError::EmptyName)
        );
        assert_eq!(
            NewZone::new("a", 0.0, 0.0, 0.0).validate(),
            Err(ZoneError::InvalidRadius(0.0))
        );
        assert!(matches!(
            NewZone::new("a", 0.0, 0.0, -5.0).validate(),
            Err(ZoneError::InvalidRadius(_))
        ));
        assert!(matches!(
            NewZone::new("a", 0.0, 0.0, f64::INFINITY).validate(),
            Err(ZoneError::InvalidRadius(_))
        ));
        assert!(matches!(
            NewZone::new("a", 0.0, 200.0, 5.0).validate(),
            Err(ZoneError::InvalidCenter(CoordError::InvalidLongitude(_)))
        ));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_containment_matches_distance(
                lat in -89.0..89.0_f64,
                lon in -179.0..179.0_f64,
                center_lat in -89.0..89.0_f64,
                center_lon in -179.0..179.0_f64,
                radius in 0.001..5_000_000.0_f64,
            ) {
                let z = Zone::from_new(
                    ZoneId(1),
                    NewZone::new("z", center_lat, center_lon, radius),
                ).unwrap();
                let distance = geo::distance_meters(lat, lon, center_lat, center_lon);
                prop_assert_eq!(is_inside(lat, lon, &z), distance <= radius);
            }

            #[test]
            fn test_point_on_boundary_is_inside(
                lat in -89.0..89.0_f64,
                lon in -179.0..179.0_f64,
                center_lat in -89.0..89.0_f64,
                center_lon in -179.0..179.0_f64,
            ) {
                let distance = geo::distance_meters(lat, lon, center_lat, center_lon);
                prop_assume!(distance > 0.0);
                let z = Zone::from_new(
                    ZoneId(1),
                    NewZone::new("z", center_lat, center_lon, distance),
                ).unwrap();
                prop_assert!(is_inside(lat, lon, &z));
            }
        }
    }
}
