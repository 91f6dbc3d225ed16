//! Significance filter: reduces raw position trails to representative stops.
//!
//! # Design
//!
//! Trails are grouped per entity and sorted by observation time. Each trail
//! goes through two tiers:
//!
//! 1. **Clustering**: consecutive points join the current cluster while they
//!    are within `cluster_radius_m` of its running centroid and no more than
//!    `max_gap` after its last point. A cluster with at least `min_points`
//!    members spanning at least `min_dwell` becomes one output point at its
//!    centroid, stamped with its last point's time.
//! 2. **Thinning**: an entity with no accepted cluster keeps its first point,
//!    then every point that moved `min_move_distance_m` or waited `min_move_gap`
//!    since the last kept one, up to `max_points`. The final point is added
//!    when the cap allows and it is at least `tail_min_distance_m` away.
//!    Trails of three points or fewer are returned as they are.
//!
//! The two tiers select points differently, so output spacing is not uniform.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;

use crate::geo;
use crate::model::{EntityId, Position};

/// Default maximum distance from the cluster centroid (meters).
pub const DEFAULT_CLUSTER_RADIUS_M: f64 = 100.0;
/// Default maximum gap between consecutive cluster points.
pub const DEFAULT_MAX_GAP: Duration = Duration::from_secs(3600);
/// Default minimum number of points in an accepted cluster.
pub const DEFAULT_MIN_POINTS: usize = 3;
/// Default minimum time span of an accepted cluster.
pub const DEFAULT_MIN_DWELL: Duration = Duration::from_secs(15 * 60);
/// Default distance that makes a point significant when thinning (meters).
pub const DEFAULT_MIN_MOVE_DISTANCE_M: f64 = 500.0;
/// Default time that makes a point significant when thinning.
pub const DEFAULT_MIN_MOVE_GAP: Duration = Duration::from_secs(10 * 60);
/// Default cap on thinned points per entity.
pub const DEFAULT_MAX_POINTS: usize = 10;
/// Default minimum distance for appending the trail's last point (meters).
pub const DEFAULT_TAIL_MIN_DISTANCE_M: f64 = 100.0;

/// Trails this short skip thinning entirely.
const SHORT_TRAIL_LEN: usize = 3;

/// Tuning for [`filter_significant`].
#[derive(Debug, Clone, PartialEq)]
pub struct SignificanceConfig {
    pub cluster_radius_m: f64,
    pub max_gap: Duration,
    pub min_points: usize,
    pub min_dwell: Duration,
    pub min_move_distance_m: f64,
    pub min_move_gap: Duration,
    pub max_points: usize,
    pub tail_min_distance_m: f64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            cluster_radius_m: DEFAULT_CLUSTER_RADIUS_M,
            max_gap: DEFAULT_MAX_GAP,
            min_points: DEFAULT_MIN_POINTS,
            min_dwell: DEFAULT_MIN_DWELL,
            min_move_distance_m: DEFAULT_MIN_MOVE_DISTANCE_M,
            min_move_gap: DEFAULT_MIN_MOVE_GAP,
            max_points: DEFAULT_MAX_POINTS,
            tail_min_distance_m: DEFAULT_TAIL_MIN_DISTANCE_M,
        }
    }
}

impl SignificanceConfig {
    pub fn with_cluster_radius(mut self, meters: f64) -> Self {
        self.cluster_radius_m = meters;
        self
    }

    pub fn with_max_gap(mut self, gap: Duration) -> Self {
        self.max_gap = gap;
        self
    }

    pub fn with_min_points(mut self, points: usize) -> Self {
        self.min_points = points;
        self
    }

    pub fn with_min_dwell(mut self, dwell: Duration) -> Self {
        self.min_dwell = dwell;
        self
    }

    pub fn with_min_move_distance(mut self, meters: f64) -> Self {
        self.min_move_distance_m = meters;
        self
    }

    pub fn with_min_move_gap(mut self, gap: Duration) -> Self {
        self.min_move_gap = gap;
        self
    }

    pub fn with_max_points(mut self, points: usize) -> Self {
        self.max_points = points.max(1);
        self
    }

    pub fn with_tail_min_distance(mut self, meters: f64) -> Self {
        self.tail_min_distance_m = meters;
        self
    }
}

/// Filters a mixed-entity position list down to significant points.
///
/// Output is grouped by entity in ascending id order; within an entity it
/// follows observation time. A non-empty trail never yields an empty result.
pub fn filter_significant(positions: &[Position], config: &SignificanceConfig) -> Vec<Position> {
    let mut trails: BTreeMap<EntityId, Vec<&Position>> = BTreeMap::new();
    for position in positions {
        trails.entry(position.entity_id).or_default().push(position);
    }

    let mut output = Vec::new();
    for (entity_id, mut trail) in trails {
        trail.sort_by_key(|p| p.observed_at);

        let clusters = cluster_trail(&trail, config);
        if clusters.is_empty() {
            let thinned = thin_trail(&trail, config);
            debug!(
                entity_id = %entity_id,
                input = trail.len(),
                kept = thinned.len(),
                "No dwell clusters, using representative points"
            );
            output.extend(thinned);
        } else {
            output.extend(clusters);
        }
    }
    output
}

/// Running cluster state; the centroid is kept as coordinate sums.
struct Cluster<'a> {
    members: Vec<&'a Position>,
    sum_lat: f64,
    sum_lon: f64,
}

impl<'a> Cluster<'a> {
    fn start(first: &'a Position) -> Self {
        Self {
            members: vec![first],
            sum_lat: first.latitude,
            sum_lon: first.longitude,
        }
    }

    fn centroid(&self) -> (f64, f64) {
        let n = self.members.len() as f64;
        (self.sum_lat / n, self.sum_lon / n)
    }

    fn first(&self) -> &'a Position {
        self.members[0]
    }

    fn last(&self) -> &'a Position {
        self.members[self.members.len() - 1]
    }

    fn accepts(&self, candidate: &Position, config: &SignificanceConfig) -> bool {
        let (lat, lon) = self.centroid();
        let distance = geo::distance_meters(candidate.latitude, candidate.longitude, lat, lon);
        let gap = candidate.observed_at - self.last().observed_at;
        distance <= config.cluster_radius_m && gap.num_milliseconds() <= millis(config.max_gap)
    }

    fn push(&mut self, position: &'a Position) {
        self.sum_lat += position.latitude;
        self.sum_lon += position.longitude;
        self.members.push(position);
    }

    /// The representative point, if the cluster qualifies as a stop.
    fn representative(&self, config: &SignificanceConfig) -> Option<Position> {
        if self.members.len() < config.min_points {
            return None;
        }
        let span = self.last().observed_at - self.first().observed_at;
        if span.num_milliseconds() < millis(config.min_dwell) {
            return None;
        }
        let (latitude, longitude) = geo::centroid(
            self.members.iter().map(|p| (p.latitude, p.longitude)),
        )?;
        Some(Position {
            entity_id: self.first().entity_id,
            latitude,
            longitude,
            observed_at: self.last().observed_at,
        })
    }
}

/// Clustering pass over one time-sorted trail.
fn cluster_trail(trail: &[&Position], config: &SignificanceConfig) -> Vec<Position> {
    let Some((first, rest)) = trail.split_first() else {
        return Vec::new();
    };

    let mut accepted = Vec::new();
    let mut current = Cluster::start(first);
    for position in rest {
        if current.accepts(position, config) {
            current.push(position);
        } else {
            accepted.extend(current.representative(config));
            current = Cluster::start(position);
        }
    }
    accepted.extend(current.representative(config));
    accepted
}

/// Thinning pass over one time-sorted trail.
fn thin_trail(trail: &[&Position], config: &SignificanceConfig) -> Vec<Position> {
    if trail.len() <= SHORT_TRAIL_LEN {
        return trail.iter().map(|p| (*p).clone()).collect();
    }

    let mut kept: Vec<usize> = vec![0];
    for (index, position) in trail.iter().enumerate().skip(1) {
        let last = trail[kept[kept.len() - 1]];
        let moved = position.distance_to(last) >= config.min_move_distance_m;
        let waited = (position.observed_at - last.observed_at).num_milliseconds()
            >= millis(config.min_move_gap);
        if moved || waited {
            kept.push(index);
            if kept.len() >= config.max_points {
                break;
            }
        }
    }

    let tail = trail.len() - 1;
    let last_kept = kept[kept.len() - 1];
    if kept.len() < config.max_points
        && last_kept != tail
        && trail[tail].distance_to(trail[last_kept]) >= config.tail_min_distance_m
    {
        kept.push(tail);
    }

    kept.into_iter().map(|i| trail[i].clone()).collect()
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    /// Roughly 1 m of latitude in degrees.
    const METER: f64 = 1.0 / 111_195.0;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn at(entity: u64, lat: f64, lon: f64, minutes: i64) -> Position {
        Position::new(EntityId(entity), lat, lon, t0() + ChronoDuration::minutes(minutes)).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert!(filter_significant(&[], &SignificanceConfig::default()).is_empty());
    }

    #[test]
    fn test_dwell_cluster_becomes_its_centroid() {
        // Five points within 50 m over 20 minutes
        let trail: Vec<_> = (0..5)
            .map(|i| at(1, 10.0 + i as f64 * 10.0 * METER, 20.0, i * 5))
            .collect();
        let result = filter_significant(&trail, &SignificanceConfig::default());

        assert_eq!(result.len(), 1);
        let mean_lat = trail.iter().map(|p| p.latitude).sum::<f64>() / 5.0;
        assert!((result[0].latitude - mean_lat).abs() < 1e-12);
        assert!((result[0].longitude - 20.0).abs() < 1e-12);
        assert_eq!(result[0].observed_at, trail[4].observed_at);
    }

    #[test]
    fn test_short_dwell_is_not_a_stop() {
        // Three close points over 10 minutes fail min_dwell, trail is short
        let trail = vec![at(1, 0.0, 0.0, 0), at(1, 0.0, 0.0, 5), at(1, 0.0, 0.0, 10)];
        let result = filter_significant(&trail, &SignificanceConfig::default());
        assert_eq!(result, trail);
    }

    #[test]
    fn test_gap_splits_cluster() {
        // Same spot, but a two-hour hole in the middle
        let trail = vec![
            at(1, 0.0, 0.0, 0),
            at(1, 0.0, 0.0, 10),
            at(1, 0.0, 0.0, 20),
            at(1, 0.0, 0.0, 140),
            at(1, 0.0, 0.0, 150),
            at(1, 0.0, 0.0, 160),
        ];
        let result = filter_significant(&trail, &SignificanceConfig::default());
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].observed_at, trail[2].observed_at);
        assert_eq!(result[1].observed_at, trail[5].observed_at);
    }

    #[test]
    fn test_scattered_trail_falls_back_to_thinning() {
        // Four points more than 1 km apart, one minute apart
        let trail: Vec<_> = (0..4).map(|i| at(1, i as f64 * 0.02, 0.0, i)).collect();
        let result = filter_significant(&trail, &SignificanceConfig::default());
        assert!(!result.is_empty());
        assert_eq!(result, trail);
    }

    #[test]
    fn test_thinning_skips_small_moves_and_adds_tail() {
        let trail = vec![
            at(1, 0.0, 0.0, 0),
            at(1, 50.0 * METER, 0.0, 1),
            at(1, 600.0 * METER, 0.0, 2),
            at(1, 650.0 * METER, 0.0, 3),
            at(1, 800.0 * METER, 0.0, 4),
        ];
        let result = filter_significant(&trail, &SignificanceConfig::default());
        assert_eq!(result, vec![trail[0].clone(), trail[2].clone(), trail[4].clone()]);
    }

    #[test]
    fn test_thinning_keeps_points_after_long_wait() {
        let trail = vec![
            at(1, 0.0, 0.0, 0),
            at(1, 0.0, 0.0, 2),
            at(1, 0.0, 0.0, 12),
            at(1, 0.0, 0.0, 13),
        ];
        let result = filter_significant(&trail, &SignificanceConfig::default());
        // Tail is too close to the last kept point to be appended
        assert_eq!(result, vec![trail[0].clone(), trail[2].clone()]);
    }

    #[test]
    fn test_thinning_respects_cap() {
        let trail: Vec<_> = (0..30).map(|i| at(1, i as f64 * 0.01, 0.0, i)).collect();
        let config = SignificanceConfig::default().with_max_points(5);
        let result = filter_significant(&trail, &config);
        assert_eq!(result.len(), 5);
        assert_eq!(result[4], trail[4]);
    }

    #[test]
    fn test_entities_are_never_mixed() {
        let mut trail: Vec<_> = (0..5).map(|i| at(2, 0.0, 0.0, i * 5)).collect();
        trail.extend((0..5).map(|i| at(1, 0.0, 0.0, i * 5)));
        let result = filter_significant(&trail, &SignificanceConfig::default());
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].entity_id, EntityId(1));
        assert_eq!(result[1].entity_id, EntityId(2));
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut trail: Vec<_> = (0..12)
            .map(|i| at(1, (i / 4) as f64 * 0.05, 0.0, i * 6))
            .collect();
        let expected = filter_significant(&trail, &SignificanceConfig::default());

        let mut rng = StdRng::seed_from_u64(7);
        trail.shuffle(&mut rng);
        assert_eq!(filter_significant(&trail, &SignificanceConfig::default()), expected);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_non_empty_trail_never_vanishes(
                points in prop::collection::vec(
                    (1..4u64, -1.0..1.0_f64, -1.0..1.0_f64, 0..600i64),
                    1..60,
                )
            ) {
                let trail: Vec<_> = points
                    .iter()
                    .map(|(entity, lat, lon, minute)| at(*entity, *lat, *lon, *minute))
                    .collect();
                let result = filter_significant(&trail, &SignificanceConfig::default());

                for entity in 1..4u64 {
                    let input = trail.iter().filter(|p| p.entity_id == EntityId(entity)).count();
                    let output = result.iter().filter(|p| p.entity_id == EntityId(entity)).count();
                    if input > 0 {
                        prop_assert!(output > 0);
                    }
                    prop_assert!(output <= input);
                }
            }
        }
    }
}
