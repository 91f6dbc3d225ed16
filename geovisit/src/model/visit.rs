//! Visit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, VisitId, ZoneId};

/// The (entity, zone) pair a visit belongs to.
///
/// At most one active visit may exist per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisitKey {
    pub entity_id: EntityId,
    pub zone_id: ZoneId,
}

impl VisitKey {
    pub fn new(entity_id: EntityId, zone_id: ZoneId) -> Self {
        Self { entity_id, zone_id }
    }
}

impl std::fmt::Display for VisitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity {} @ zone {}", self.entity_id, self.zone_id)
    }
}

/// A visit that has not been persisted yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewVisit {
    pub entity_id: EntityId,
    pub zone_id: ZoneId,
    pub start_at: DateTime<Utc>,
}

impl NewVisit {
    pub fn key(&self) -> VisitKey {
        VisitKey::new(self.entity_id, self.zone_id)
    }
}

/// An interval during which an entity was inside a zone.
///
/// `end_at == None` marks the visit as active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub entity_id: EntityId,
    pub zone_id: ZoneId,
    pub start_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
    /// Whole seconds between `start_at` and `end_at`; zero while active.
    #[serde(default)]
    pub duration_seconds: i64,
}

impl Visit {
    /// Builds the stored form of a new visit.
    pub fn open(id: VisitId, new: NewVisit) -> Self {
        Self {
            id,
            entity_id: new.entity_id,
            zone_id: new.zone_id,
            start_at: new.start_at,
            end_at: None,
            duration_seconds: 0,
        }
    }

    pub fn key(&self) -> VisitKey {
        VisitKey::new(self.entity_id, self.zone_id)
    }

    pub fn is_active(&self) -> bool {
        self.end_at.is_none()
    }

    /// Returns a closed copy of this visit ending at `at`.
    ///
    /// An end time earlier than `start_at` (out-of-order delivery) is clamped
    /// to `start_at`, so the duration is never negative.
    pub fn closed_at(&self, at: DateTime<Utc>) -> Self {
        let end_at = at.max(self.start_at);
        Self {
            end_at: Some(end_at),
            duration_seconds: (end_at - self.start_at).num_seconds().max(0),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_visit(start_at: DateTime<Utc>) -> Visit {
        Visit::open(
            VisitId(1),
            NewVisit {
                entity_id: EntityId(10),
                zone_id: ZoneId(20),
                start_at,
            },
        )
    }

    #[test]
    fn test_open_visit_is_active() {
        let visit = new_visit(Utc::now());
        assert!(visit.is_active());
        assert_eq!(visit.duration_seconds, 0);
        assert_eq!(visit.key(), VisitKey::new(EntityId(10), ZoneId(20)));
    }

    #[test]
    fn test_close_truncates_to_whole_seconds() {
        let start = Utc::now();
        let end = start + Duration::milliseconds(1_999);
        let closed = new_visit(start).closed_at(end);
        assert!(!closed.is_active());
        assert_eq!(closed.end_at, Some(end));
        assert_eq!(closed.duration_seconds, 1);
    }

    #[test]
    fn test_close_before_start_clamps_to_zero() {
        let start = Utc::now();
        let closed = new_visit(start).closed_at(start - Duration::minutes(5));
        assert_eq!(closed.end_at, Some(start));
        assert_eq!(closed.duration_seconds, 0);
    }

    #[test]
    fn test_serialize_active_visit_omits_end() {
        let json = serde_json::to_value(new_visit(Utc::now())).unwrap();
        assert!(json.get("end_at").is_none());
        assert_eq!(json["duration_seconds"], 0);
    }
}
