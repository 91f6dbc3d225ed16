//! GeoVisit - geofence visit tracking
//!
//! Consumes location events from a message transport, tests each position
//! against circular zones, and keeps a per-(entity, zone) visit lifecycle:
//! a visit opens when an entity is first seen inside a zone and closes, with
//! its duration, when the entity is next seen outside. A query service over
//! the same stores answers zone, visit, and significant-position requests.

pub mod app;
pub mod cache;
pub mod config;
pub mod geo;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod observer;
pub mod processor;
pub mod service;
pub mod significance;
pub mod store;
pub mod telemetry;
pub mod transport;
pub mod visit;
pub mod zone;

pub use app::{AppConfig, AppError, GeoVisitApp};
pub use model::{EntityId, LocationEvent, Position, Visit, VisitKey, ZoneId};
pub use service::{QueryError, TrackingService};
pub use zone::{NewZone, Zone};
