//! Pure transition rules of the visit state machine.

use crate::model::Visit;

/// Derived state of one (entity, zone) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum VisitState {
    /// No active visit exists for the pair.
    NoVisit,
    /// The pair has this active visit.
    Active(Visit),
}

impl VisitState {
    pub fn is_active(&self) -> bool {
        matches!(self, VisitState::Active(_))
    }
}

impl From<Option<Visit>> for VisitState {
    fn from(active: Option<Visit>) -> Self {
        match active {
            Some(visit) => VisitState::Active(visit),
            None => VisitState::NoVisit,
        }
    }
}

/// What a single observation requires the store to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Create a new active visit.
    Open,
    /// Close this active visit.
    Close(Visit),
    /// Nothing to write.
    Stay,
}

/// Decides the step for an observation given the current state.
///
/// ```text
/// NoVisit --inside-->  Active   (Open)
/// Active  --inside-->  Active   (Stay)
/// Active  --outside--> NoVisit  (Close)
/// NoVisit --outside--> NoVisit  (Stay)
/// ```
pub fn decide(state: &VisitState, inside: bool) -> Step {
    match (state, inside) {
        (VisitState::NoVisit, true) => Step::Open,
        (VisitState::Active(visit), false) => Step::Close(visit.clone()),
        (VisitState::Active(_), true) | (VisitState::NoVisit, false) => Step::Stay,
    }
}

/// Outcome of applying one observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Opened(Visit),
    Closed(Visit),
    Unchanged,
}

impl Transition {
    /// The visit written by this transition, if any.
    pub fn visit(&self) -> Option<&Visit> {
        match self {
            Transition::Opened(v) | Transition::Closed(v) => Some(v),
            Transition::Unchanged => None,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, Transition::Unchanged)
    }

    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Transition::Opened(_) => "opened",
            Transition::Closed(_) => "closed",
            Transition::Unchanged => "unchanged",
        }
    }
}
