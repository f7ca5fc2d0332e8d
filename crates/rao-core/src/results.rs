//! Read-only snapshots consumed by the fillers.
//!
//! Three snapshot families cross the engine boundary:
//! - [`SensitivitySnapshot`]: flows, flow-to-setpoint sensitivities, zonal
//!   PTDF sums, commercial flows and per-state computation status, refreshed
//!   by the orchestrator before every sensitivity iteration;
//! - [`SetpointSnapshot`]: the pre-perimeter setpoints/taps (and initial
//!   generator powers), fixed for the whole optimization;
//! - [`ActivationSnapshot`]: the setpoints/taps of the latest solve, per
//!   action and state, falling back to the pre-perimeter position before
//!   the first solve.
//!
//! Fillers only ever read these; nothing here is mutated by the engine.

use crate::cnec::{FlowCnec, Side};
use crate::id::{ActionId, CnecId, GeneratorId};
use crate::state::State;
use hashbrown::HashMap;

/// Outcome of the external sensitivity computation for one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputationStatus {
    /// Usable results.
    #[default]
    Ok,
    /// Computation diverged or failed; elements of this state must be
    /// excluded from the current iteration rather than crash the fill.
    Failure,
}

/// Flows, sensitivities and PTDF data for one iteration.
#[derive(Debug, Clone, Default)]
pub struct SensitivitySnapshot {
    flows: HashMap<(CnecId, Side), f64>,
    sensitivities: HashMap<(ActionId, CnecId, Side), f64>,
    ptdf_sums: HashMap<(CnecId, Side), f64>,
    commercial_flows: HashMap<(CnecId, Side), f64>,
    state_status: HashMap<State, ComputationStatus>,
}

impl SensitivitySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference flow of a monitored side (MW). NaN when unknown.
    pub fn flow(&self, cnec: &CnecId, side: Side) -> f64 {
        self.flows.get(&(cnec.clone(), side)).copied().unwrap_or(f64::NAN)
    }

    /// Flow-to-setpoint sensitivity (MW per setpoint unit). Zero when the
    /// pair was not computed.
    pub fn sensitivity(&self, action: &ActionId, cnec: &CnecId, side: Side) -> f64 {
        self.sensitivities
            .get(&(action.clone(), cnec.clone(), side))
            .copied()
            .unwrap_or(0.0)
    }

    /// Absolute zonal PTDF sum of a monitored side. NaN when unknown.
    pub fn ptdf_zonal_sum(&self, cnec: &CnecId, side: Side) -> f64 {
        self.ptdf_sums.get(&(cnec.clone(), side)).copied().unwrap_or(f64::NAN)
    }

    /// Commercial flow of a monitored side (MW). NaN when unknown.
    pub fn commercial_flow(&self, cnec: &CnecId, side: Side) -> f64 {
        self.commercial_flows.get(&(cnec.clone(), side)).copied().unwrap_or(f64::NAN)
    }

    /// Loop flow of a monitored side: physical flow minus commercial flow.
    pub fn loop_flow(&self, cnec: &CnecId, side: Side) -> f64 {
        self.flow(cnec, side) - self.commercial_flow(cnec, side)
    }

    /// Computation status of a state (defaults to [`ComputationStatus::Ok`]
    /// when the state was never flagged).
    pub fn status(&self, state: &State) -> ComputationStatus {
        self.state_status.get(state).copied().unwrap_or_default()
    }

    /// Whether a monitored side carries usable data this iteration.
    pub fn is_valid(&self, cnec: &FlowCnec, side: Side) -> bool {
        self.status(&cnec.state) == ComputationStatus::Ok
            && self.flow(&cnec.id, side).is_finite()
    }

    pub fn set_flow(&mut self, cnec: impl Into<CnecId>, side: Side, value: f64) {
        self.flows.insert((cnec.into(), side), value);
    }

    pub fn set_sensitivity(
        &mut self,
        action: impl Into<ActionId>,
        cnec: impl Into<CnecId>,
        side: Side,
        value: f64,
    ) {
        self.sensitivities.insert((action.into(), cnec.into(), side), value);
    }

    pub fn set_ptdf_zonal_sum(&mut self, cnec: impl Into<CnecId>, side: Side, value: f64) {
        self.ptdf_sums.insert((cnec.into(), side), value);
    }

    pub fn set_commercial_flow(&mut self, cnec: impl Into<CnecId>, side: Side, value: f64) {
        self.commercial_flows.insert((cnec.into(), side), value);
    }

    pub fn set_status(&mut self, state: State, status: ComputationStatus) {
        self.state_status.insert(state, status);
    }
}

/// Pre-perimeter positions: where every control sits before this
/// optimization starts.
#[derive(Debug, Clone, Default)]
pub struct SetpointSnapshot {
    setpoints: HashMap<ActionId, f64>,
    taps: HashMap<ActionId, i32>,
    generator_powers: HashMap<GeneratorId, f64>,
}

impl SetpointSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-perimeter setpoint of an action (angle for PSTs, MW otherwise).
    pub fn setpoint(&self, action: &ActionId) -> Option<f64> {
        self.setpoints.get(action).copied()
    }

    /// Pre-perimeter tap of a PST action.
    pub fn tap(&self, action: &ActionId) -> Option<i32> {
        self.taps.get(action).copied()
    }

    /// Initial power of a generator (MW).
    pub fn generator_power(&self, generator: &GeneratorId) -> Option<f64> {
        self.generator_powers.get(generator).copied()
    }

    pub fn set_setpoint(&mut self, action: impl Into<ActionId>, value: f64) {
        self.setpoints.insert(action.into(), value);
    }

    pub fn set_tap(&mut self, action: impl Into<ActionId>, tap: i32) {
        self.taps.insert(action.into(), tap);
    }

    pub fn set_generator_power(&mut self, generator: impl Into<GeneratorId>, value: f64) {
        self.generator_powers.insert(generator.into(), value);
    }
}

/// Optimized positions after the latest solve, per action and state.
///
/// Before the first solve this simply mirrors the pre-perimeter snapshot.
#[derive(Debug, Clone, Default)]
pub struct ActivationSnapshot {
    setpoints: HashMap<(ActionId, State), f64>,
    taps: HashMap<(ActionId, State), i32>,
    fallback: SetpointSnapshot,
}

impl ActivationSnapshot {
    /// Activation snapshot equal to the pre-perimeter positions.
    pub fn from_pre_perimeter(pre_perimeter: &SetpointSnapshot) -> Self {
        ActivationSnapshot {
            setpoints: HashMap::new(),
            taps: HashMap::new(),
            fallback: pre_perimeter.clone(),
        }
    }

    /// Current setpoint of an action on a state.
    pub fn setpoint(&self, action: &ActionId, state: &State) -> Option<f64> {
        self.setpoints
            .get(&(action.clone(), state.clone()))
            .copied()
            .or_else(|| self.fallback.setpoint(action))
    }

    /// Current tap of a PST action on a state.
    pub fn tap(&self, action: &ActionId, state: &State) -> Option<i32> {
        self.taps
            .get(&(action.clone(), state.clone()))
            .copied()
            .or_else(|| self.fallback.tap(action))
    }

    pub fn set_setpoint(&mut self, action: impl Into<ActionId>, state: State, value: f64) {
        self.setpoints.insert((action.into(), state), value);
    }

    pub fn set_tap(&mut self, action: impl Into<ActionId>, state: State, tap: i32) {
        self.taps.insert((action.into(), state), tap);
    }
}
