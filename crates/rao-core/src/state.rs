//! Optimization states: instants, contingencies and timestamps.
//!
//! A [`State`] is the time/topology coordinate everything else is keyed by:
//! an [`Instant`] (preventive < outage < auto < curative-k), an optional
//! contingency and, for multi-timestep studies, an optional wall-clock
//! timestamp. States are immutable and created during scenario setup.

use crate::id::ContingencyId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock timestamp of a multi-timestep study period.
pub type Timestamp = DateTime<Utc>;

/// Kind of optimization instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstantKind {
    /// Before any contingency.
    Preventive,
    /// Right after a contingency, before any action.
    Outage,
    /// After automatic actions have fired.
    Auto,
    /// After curative remedial actions (possibly several batches).
    Curative,
}

/// An instant in the optimization chronology.
///
/// Instants are totally ordered by their `order` field; the kind is carried
/// for reachability rules (e.g. "relative to previous instant" ranges only
/// make sense past the preventive instant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instant {
    /// Kind of this instant.
    pub kind: InstantKind,
    /// Position in the chronology, ascending.
    pub order: u32,
}

impl Instant {
    /// The preventive instant (order 0).
    pub fn preventive() -> Self {
        Instant { kind: InstantKind::Preventive, order: 0 }
    }

    /// The outage instant (order 1).
    pub fn outage() -> Self {
        Instant { kind: InstantKind::Outage, order: 1 }
    }

    /// The auto instant (order 2).
    pub fn auto() -> Self {
        Instant { kind: InstantKind::Auto, order: 2 }
    }

    /// A curative instant; `batch` distinguishes successive curative
    /// batches (first batch is 0, at order 3).
    pub fn curative(batch: u32) -> Self {
        Instant { kind: InstantKind::Curative, order: 3 + batch }
    }

    /// Whether this is the preventive instant.
    pub fn is_preventive(&self) -> bool {
        self.kind == InstantKind::Preventive
    }
}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order.cmp(&other.order).then(self.kind.cmp(&other.kind))
    }
}

/// An optimization state: (instant, optional contingency, optional
/// timestamp).
///
/// Two states belong to the same scenario branch when their contingencies
/// are compatible: identical, or one of them preventive (no contingency).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct State {
    /// Instant of this state.
    pub instant: Instant,
    /// Contingency, absent for pre-contingency states.
    pub contingency: Option<ContingencyId>,
    /// Study-period timestamp, for multi-timestep optimizations.
    pub timestamp: Option<Timestamp>,
}

impl State {
    /// Preventive state without contingency or timestamp.
    pub fn preventive() -> Self {
        State { instant: Instant::preventive(), contingency: None, timestamp: None }
    }

    /// State at the given instant after the given contingency.
    pub fn post_contingency(instant: Instant, contingency: impl Into<ContingencyId>) -> Self {
        State { instant, contingency: Some(contingency.into()), timestamp: None }
    }

    /// Copy of this state tagged with a study-period timestamp.
    pub fn at_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Whether `earlier` can precede `self` on the same scenario branch:
    /// same timestamp, instant not after ours, and a compatible contingency
    /// (identical or absent on the earlier state).
    pub fn follows(&self, earlier: &State) -> bool {
        if self.timestamp != earlier.timestamp {
            return false;
        }
        if earlier.instant > self.instant {
            return false;
        }
        match (&earlier.contingency, &self.contingency) {
            (None, _) => true,
            (Some(a), Some(b)) => a == b,
            (Some(_), None) => false,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.contingency {
            Some(c) => write!(f, "{:?}({})-{}", self.instant.kind, self.instant.order, c),
            None => write!(f, "{:?}({})", self.instant.kind, self.instant.order),
        }
    }
}
