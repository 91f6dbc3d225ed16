//! Per-(entity, zone) visit state machine.
//!
//! # State Machine
//!
//! ```text
//! NoVisit --[observed inside]--> Active     create visit, start_at = t
//! Active  --[observed inside]--> Active     no-op
//! Active  --[observed outside]--> NoVisit   end_at = t, duration = end - start
//! NoVisit --[observed outside]--> NoVisit   no-op
//! ```
//!
//! The current state is derived from the store (the visit with a null
//! `end_at`), never kept in memory, so redelivered observations are no-ops.
//!
//! [`decide`] holds the pure transition rules; [`VisitTracker`] performs the
//! store reads and writes around them.

mod state;
mod tracker;

pub use state::{decide, Step, Transition, VisitState};
pub use tracker::VisitTracker;
