//! Core data types shared by the visit pipeline and the read path.
//!
//! - [`Position`]: one recorded location report (immutable once stored)
//! - [`Visit`]: a bounded interval of an entity inside a zone
//! - [`LocationEvent`]: the wire payload carried by the transport
//! - [`TimeRange`]: an inclusive query window

mod event;
mod ids;
mod position;
mod visit;

pub use event::{trusted_time, DecodeError, LocationEvent};
pub use ids::{EntityId, VisitId, ZoneId};
pub use position::{Position, TimeRange, TimeRangeError};
pub use visit::{NewVisit, Visit, VisitKey};
