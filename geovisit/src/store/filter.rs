//! Closed set of visit query filters.

use thiserror::Error;

use crate::model::{EntityId, Visit, VisitId, ZoneId};

/// Errors from building a [`VisitFilter`] out of raw query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unknown filter field '{0}'")]
    UnknownField(String),

    #[error("filter field '{field}' expects a numeric id, got '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

/// Optional equality filters over visits.
///
/// Only these three fields exist; anything else is rejected before a store
/// query is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitFilter {
    pub id: Option<VisitId>,
    pub entity_id: Option<EntityId>,
    pub zone_id: Option<ZoneId>,
}

impl VisitFilter {
    /// A filter that matches every visit.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: VisitId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_entity(mut self, entity_id: EntityId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_zone(mut self, zone_id: ZoneId) -> Self {
        self.zone_id = Some(zone_id);
        self
    }

    /// Parses `key=value` query parameters.
    ///
    /// Accepts `id`, `entity_id` (or `user_id`) and `zone_id` (or
    /// `checkpoint_id`). Empty values are ignored.
    pub fn from_query_pairs<'a, I>(pairs: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filter = Self::default();
        for (key, value) in pairs {
            if value.trim().is_empty() {
                continue;
            }
            match key {
                "id" => filter.id = Some(parse_id(value, "id")?),
                "entity_id" | "user_id" => filter.entity_id = Some(parse_id(value, "entity_id")?),
                "zone_id" | "checkpoint_id" => filter.zone_id = Some(parse_id(value, "zone_id")?),
                other => return Err(FilterError::UnknownField(other.to_string())),
            }
        }
        Ok(filter)
    }

    /// Whether a visit satisfies every set field.
    pub fn matches(&self, visit: &Visit) -> bool {
        self.id.map_or(true, |id| visit.id == id)
            && self.entity_id.map_or(true, |e| visit.entity_id == e)
            && self.zone_id.map_or(true, |z| visit.zone_id == z)
    }
}

fn parse_id<T: From<u64>>(value: &str, field: &'static str) -> Result<T, FilterError> {
    value
        .trim()
        .parse::<u64>()
        .map(T::from)
        .map_err(|_| FilterError::InvalidValue {
            field,
            value: value.to_string(),
        })
}
