//! Location-update events carried by the transport.
//!
//! The wire encoding is a flat JSON object:
//!
//! ```json
//! {"entity_id": 7, "zone_id": 3, "latitude": 55.75, "longitude": 37.61,
//!  "occurred_at": "2024-05-01T10:15:00Z"}
//! ```
//!
//! `user_id` and `checkpoint_id` are accepted as aliases so payloads from
//! older producers still decode.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::{EntityId, Position, ZoneId};
use crate::geo::{self, CoordError};

/// Reasons a payload cannot be turned into a [`LocationEvent`].
///
/// Both are terminal: redelivering the same bytes cannot fix them.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not a valid location event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event coordinates out of range: {0}")]
    Coordinates(#[from] CoordError),
}

/// A single location update for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    #[serde(alias = "user_id")]
    pub entity_id: EntityId,

    /// Informational only; every zone is evaluated regardless.
    #[serde(
        default,
        alias = "checkpoint_id",
        deserialize_with = "zero_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub zone_id: Option<ZoneId>,

    pub latitude: f64,
    pub longitude: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl LocationEvent {
    /// Creates an event for a position report.
    pub fn new(
        entity_id: EntityId,
        latitude: f64,
        longitude: f64,
        occurred_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            entity_id,
            zone_id: None,
            latitude,
            longitude,
            occurred_at,
        }
    }

    /// Builds the event announcing a stored position.
    pub fn from_position(position: &Position) -> Self {
        Self::new(
            position.entity_id,
            position.latitude,
            position.longitude,
            Some(position.observed_at),
        )
    }

    /// Decodes and validates a transport payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let event: LocationEvent = serde_json::from_slice(payload)?;
        geo::validate(event.latitude, event.longitude)?;
        Ok(event)
    }

    /// Encodes the event as its JSON wire form.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// The time to record for this observation; see [`trusted_time`].
    pub fn observation_time(&self, now: DateTime<Utc>, max_skew: Duration) -> DateTime<Utc> {
        trusted_time(self.occurred_at, now, max_skew)
    }
}

/// Picks the time to record for a producer-supplied timestamp.
///
/// `claimed` is used when it is set, after the Unix epoch (zero-valued
/// producer timestamps count as unset) and no later than `now + max_skew`.
/// Falls back to `now` otherwise. A skew that reaches past the last
/// representable instant puts no upper bound on `claimed`.
pub fn trusted_time(
    claimed: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_skew: Duration,
) -> DateTime<Utc> {
    match claimed {
        Some(at)
            if at.timestamp() > 0
                && now
                    .checked_add_signed(max_skew)
                    .map_or(true, |limit| at <= limit) =>
        {
            at
        }
        _ => now,
    }
}

fn zero_as_none<'de, D>(deserializer: D) -> Result<Option<ZoneId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<u64>::deserialize(deserializer)?;
    Ok(raw.filter(|id| *id != 0).map(ZoneId))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_full_payload() {
        let payload = br#"{"entity_id":7,"zone_id":3,"latitude":55.75,"longitude":37.61,"occurred_at":"2024-05-01T10:15:00Z"}"#;
        let event = LocationEvent::decode(payload).unwrap();
        assert_eq!(event.entity_id, EntityId(7));
        assert_eq!(event.zone_id, Some(ZoneId(3)));
        assert_eq!(
            event.occurred_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_legacy_field_names() {
        let payload = br#"{"user_id":1,"checkpoint_id":0,"latitude":1.0,"longitude":2.0,"occurred_at":"2024-05-01T13:15:00+03:00"}"#;
        let event = LocationEvent::decode(payload).unwrap();
        assert_eq!(event.entity_id, EntityId(1));
        assert_eq!(event.zone_id, None, "zero zone id means unset");
        assert_eq!(
            event.occurred_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_minimal_payload() {
        let event = LocationEvent::decode(br#"{"entity_id":1,"latitude":0,"longitude":0}"#).unwrap();
        assert_eq!(event.zone_id, None);
        assert_eq!(event.occurred_at, None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            LocationEvent::decode(b"not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            LocationEvent::decode(br#"{"latitude":1.0,"longitude":2.0}"#),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_decode_rejects_out_of_range_coordinates() {
        let err = LocationEvent::decode(br#"{"entity_id":1,"latitude":95.0,"longitude":0}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Coordinates(_)));
    }

    #[test]
    fn test_encode_decode_preserves_event() {
        let event = LocationEvent::new(EntityId(9), 1.5, -2.5, Some(Utc::now()));
        let decoded = LocationEvent::decode(&event.encode().unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_observation_time_trust_rules() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let skew = Duration::minutes(5);
        let mut event = LocationEvent::new(EntityId(1), 0.0, 0.0, None);

        assert_eq!(event.observation_time(now, skew), now);

        let earlier = now - Duration::minutes(20);
        event.occurred_at = Some(earlier);
        assert_eq!(event.observation_time(now, skew), earlier);

        // Slightly ahead of the local clock is tolerated
        let ahead = now + Duration::minutes(2);
        event.occurred_at = Some(ahead);
        assert_eq!(event.observation_time(now, skew), ahead);

        // Far future and zero-valued timestamps are not trusted
        event.occurred_at = Some(now + Duration::hours(3));
        assert_eq!(event.observation_time(now, skew), now);

        event.occurred_at = Some(Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(event.observation_time(now, skew), now);
    }

    #[test]
    fn test_oversized_skew_does_not_overflow() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let skew = Duration::seconds(10_000_000_000_000);
        let ahead = now + Duration::days(30);

        assert_eq!(trusted_time(Some(ahead), now, skew), ahead);
        assert_eq!(trusted_time(None, now, skew), now);
    }
}
