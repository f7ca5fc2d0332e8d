//! Core domain model for remedial-action optimization.
//!
//! This crate carries the immutable catalog and snapshot types shared by the
//! optimization engine:
//!
//! - identifiers and states ([`id`], [`state`])
//! - monitored flow elements ([`cnec`])
//! - remedial actions with their admissible ranges ([`range_action`])
//! - generator physical constraints ([`generator`])
//! - read-only per-iteration snapshots ([`results`])
//! - the shared error type ([`error`])
//!
//! ## Design
//!
//! Everything here is plain data. The engine (in `rao-linopt`) reads these
//! types but never mutates them; per-iteration values travel in snapshot
//! structs rebuilt by the orchestrator. Remedial-action subtypes are a
//! tagged enum, so algorithms branching on the subtype are exhaustive
//! matches rather than type-checking cascades.

pub mod cnec;
pub mod error;
pub mod generator;
pub mod id;
pub mod range_action;
pub mod results;
pub mod state;

pub use cnec::{FlowBound, FlowCnec, Side, Unit};
pub use error::{RaoError, RaoResult};
pub use generator::GeneratorConstraints;
pub use id::{
    ActionId, CnecId, ContingencyId, GeneratorId, GroupId, NetworkElementId, TsoId,
};
pub use range_action::{
    HvdcData, InjectionData, PstData, RangeAction, RangeActionKind, RangeType, StandardRange,
    TapRange,
};
pub use results::{
    ActivationSnapshot, ComputationStatus, SensitivitySnapshot, SetpointSnapshot,
};
pub use state::{Instant, InstantKind, State, Timestamp};
