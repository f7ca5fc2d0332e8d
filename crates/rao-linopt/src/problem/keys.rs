//! Composite semantic keys of the model registry.
//!
//! Every variable and constraint of the shared model is identified by a
//! typed key carrying the full semantic coordinate (kind, action/element,
//! state, side, direction). A key is registered at most once per model
//! instance; fillers look keys up before creating them.

use chrono::SecondsFormat;
use rao_core::{ActionId, CnecId, GeneratorId, GroupId, Side, State, Timestamp, TsoId};

/// Direction of a setpoint or tap variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariationDirection {
    Upward,
    Downward,
}

impl std::fmt::Display for VariationDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariationDirection::Upward => write!(f, "upward"),
            VariationDirection::Downward => write!(f, "downward"),
        }
    }
}

/// Which threshold a margin constraint guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarginBound {
    /// Margin against the lower flow bound.
    BelowThreshold,
    /// Margin against the upper flow bound.
    AboveThreshold,
}

/// Which side of a two-sided soft constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundDirection {
    Lower,
    Upper,
}

/// Sign tag for absolute-value-defining constraint pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Positive,
    Negative,
}

/// Commitment state of a dispatchable generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitmentState {
    Off,
    On,
    RampUp,
    RampDown,
}

impl std::fmt::Display for CommitmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitmentState::Off => write!(f, "off"),
            CommitmentState::On => write!(f, "on"),
            CommitmentState::RampUp => write!(f, "ramp_up"),
            CommitmentState::RampDown => write!(f, "ramp_down"),
        }
    }
}

/// Balancing decomposition of the ON commitment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnMode {
    Up,
    Down,
    Flat,
}

impl std::fmt::Display for OnMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OnMode::Up => write!(f, "up"),
            OnMode::Down => write!(f, "down"),
            OnMode::Flat => write!(f, "flat"),
        }
    }
}

/// Semantic key of a model variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariableId {
    /// Flow of a monitored side (MW), free.
    Flow { cnec: CnecId, side: Side },
    /// Setpoint of an action on a state (angle for PSTs, MW otherwise).
    SetPoint { action: ActionId, state: State },
    /// Non-negative setpoint variation in one direction.
    SetPointVariation { action: ActionId, state: State, direction: VariationDirection },
    /// Non-negative absolute setpoint variation from the reference position.
    AbsoluteVariation { action: ActionId, state: State },
    /// Virtual shared setpoint of an alignment group.
    GroupSetPoint { group: GroupId, state: State },
    /// Non-negative integer tap variation in one direction.
    TapVariation { action: ActionId, state: State, direction: VariationDirection },
    /// Binary authorizing tap movement in one direction.
    TapVariationBinary { action: ActionId, state: State, direction: VariationDirection },
    /// Integer tap position.
    Tap { action: ActionId, state: State },
    /// Virtual shared tap of an alignment group.
    GroupTap { group: GroupId, state: State },
    /// Shared minimum margin over all optimized elements (MW).
    MinimumMargin,
    /// Shared minimum relative (PTDF-scaled) margin.
    MinimumRelativeMargin,
    /// Binary selecting the relative-margin regime (1 when the network is
    /// secure).
    MarginSignBinary,
    /// Non-negative MNEC bound violation (MW).
    MnecViolation { cnec: CnecId, side: Side },
    /// Non-negative loop-flow bound violation (MW).
    LoopflowViolation { cnec: CnecId, side: Side },
    /// Binary set when an element's margin enters the objective; 0 leaves
    /// it at its pre-perimeter margin.
    OptimizeCnecBinary { cnec: CnecId, side: Side },
    /// Binary set when an action moved away from its reference position.
    RangeActionUsed { action: ActionId, state: State },
    /// Binary set when any action of an operator is used.
    TsoRangeActionUsed { tso: TsoId, state: State },
    /// Non-negative integer distance between the current tap and the
    /// initial-network tap.
    TapDistanceFromInitial { action: ActionId, state: State },
    /// Generator active power (MW).
    GeneratorPower { generator: GeneratorId, timestamp: Timestamp },
    /// Binary commitment state indicator.
    GeneratorState { generator: GeneratorId, timestamp: Timestamp, state: CommitmentState },
    /// Binary ON-mode indicator (balancing decomposition).
    GeneratorOnMode { generator: GeneratorId, timestamp: Timestamp, mode: OnMode },
    /// Binary state transition indicator between consecutive timestamps.
    GeneratorTransition {
        generator: GeneratorId,
        timestamp: Timestamp,
        from: CommitmentState,
        to: CommitmentState,
    },
}

/// Semantic key of a model constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintId {
    /// Linearized flow balance of a monitored side.
    Flow { cnec: CnecId, side: Side },
    /// `S - up + down = reference` linking setpoint and variations.
    SetPointVariation { action: ActionId, state: State },
    /// One of the two `AV ≥ ±(S - reference)` constraints.
    AbsoluteVariation { action: ActionId, state: State, direction: VariationDirection },
    /// Setpoint delta bounds against the previous-instant occurrence.
    RelativeSetPoint { action: ActionId, state: State },
    /// Trust-region window around the previous optimum.
    RangeShrinking { action: ActionId, state: State },
    /// Zero-sum balance of injection variations on a state.
    InjectionBalance { state: State },
    /// Two-slope tap-to-angle conversion.
    TapToAngleConversion { action: ActionId, state: State },
    /// At most one tap direction active.
    UpOrDownVariation { action: ActionId, state: State },
    /// Tap variation infeasible unless its direction binary is set.
    TapVariationAuthorization { action: ActionId, state: State, direction: VariationDirection },
    /// `T - ΔT⁺ + ΔT⁻ = currentTap` tying the integer tap variable.
    TapValue { action: ActionId, state: State },
    /// Relative tap bounds against the preventive occurrence.
    RelativeTap { action: ActionId, state: State },
    /// Ganged tap equals the group's virtual tap.
    GroupTapEquality { action: ActionId, state: State },
    /// Ganged setpoint equals the group's virtual setpoint.
    GroupSetPointEquality { action: ActionId, state: State },
    /// Setpoint delta bounds against the previous study period.
    TimestepSetPoint { action: ActionId, state: State },
    /// Tap-variation delta bounds against the previous study period.
    TimestepTap { action: ActionId, state: State },
    /// Minimum margin below the given threshold of a side.
    MinimumMargin { cnec: CnecId, side: Side, bound: MarginBound },
    /// Relative-margin variant of the margin constraint.
    MinimumRelativeMargin { cnec: CnecId, side: Side, bound: MarginBound },
    /// Big-M cap forcing the absolute margin to zero in the secure regime.
    MarginSignDefinition,
    /// Big-M cap forcing the relative margin to zero in the insecure regime.
    RelativeMarginSetToZero,
    /// Soft MNEC flow bound with violation variable.
    MnecFlow { cnec: CnecId, side: Side, bound: BoundDirection },
    /// Soft loop-flow bound with violation variable.
    MaxLoopFlow { cnec: CnecId, side: Side, bound: BoundDirection },
    /// Big-M constraint forcing the optimize-element binary to 1 when the
    /// margin degrades past what its release rule tolerates.
    DontOptimizeCnec { cnec: CnecId, side: Side, bound: MarginBound },
    /// Big-M link between absolute variation and the usage binary.
    IsVariation { action: ActionId, state: State },
    /// Cardinality cap on used actions.
    MaxRangeActions { state: State },
    /// `tsoUsed ≥ isUsed` for one member action.
    TsoRangeActionUsed { tso: TsoId, action: ActionId, state: State },
    /// Cardinality cap on operators with used actions.
    MaxTso { state: State },
    /// Cardinality cap on used actions of one operator.
    MaxRangeActionsPerTso { tso: TsoId, state: State },
    /// Cardinality cap on used PSTs of one operator.
    MaxPstPerTso { tso: TsoId, state: State },
    /// Cap on summed tap distances of one operator.
    MaxElementaryActionsPerTso { tso: TsoId, state: State },
    /// One of the two constraints defining the tap distance variable.
    TapDistanceDefinition { action: ActionId, state: State, sign: Sign },
    /// Exactly one commitment state per timestamp.
    GeneratorUniqueState { generator: GeneratorId, timestamp: Timestamp },
    /// `P + pmax·OFF ≤ pmax`.
    GeneratorOffPower { generator: GeneratorId, timestamp: Timestamp },
    /// `pmin·ON - P ≤ 0`.
    GeneratorMinPower { generator: GeneratorId, timestamp: Timestamp },
    /// `ON = UP + DOWN + FLAT`.
    GeneratorOnDecomposition { generator: GeneratorId, timestamp: Timestamp },
    /// Power-delta sign gate for one direction.
    GeneratorDelta { generator: GeneratorId, timestamp: Timestamp, direction: VariationDirection },
    /// State at t-1 equals the sum of transitions leaving it.
    GeneratorFromState { generator: GeneratorId, timestamp: Timestamp, state: CommitmentState },
    /// State at t equals the sum of transitions entering it.
    GeneratorToState { generator: GeneratorId, timestamp: Timestamp, state: CommitmentState },
    /// Transitions at the first timestamp leave the initial state.
    GeneratorInitialState { generator: GeneratorId },
    /// Gradient/ramp bound on the power delta between timestamps.
    GeneratorPowerTransition {
        generator: GeneratorId,
        timestamp: Timestamp,
        bound: BoundDirection,
    },
    /// `P - Σ key·(up - down) = P0` linking power to injection actions.
    GeneratorRedispatch { generator: GeneratorId, timestamp: Timestamp },
}

fn ts(t: &Timestamp) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl std::fmt::Display for VariableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use VariableId::*;
        match self {
            Flow { cnec, side } => write!(f, "flow[{cnec},{side}]"),
            SetPoint { action, state } => write!(f, "set_point[{action},{state}]"),
            SetPointVariation { action, state, direction } => {
                write!(f, "set_point_variation_{direction}[{action},{state}]")
            }
            AbsoluteVariation { action, state } => {
                write!(f, "absolute_variation[{action},{state}]")
            }
            GroupSetPoint { group, state } => write!(f, "group_set_point[{group},{state}]"),
            TapVariation { action, state, direction } => {
                write!(f, "tap_variation_{direction}[{action},{state}]")
            }
            TapVariationBinary { action, state, direction } => {
                write!(f, "tap_variation_binary_{direction}[{action},{state}]")
            }
            Tap { action, state } => write!(f, "tap[{action},{state}]"),
            GroupTap { group, state } => write!(f, "group_tap[{group},{state}]"),
            MinimumMargin => write!(f, "minimum_margin"),
            MinimumRelativeMargin => write!(f, "minimum_relative_margin"),
            MarginSignBinary => write!(f, "margin_sign_binary"),
            MnecViolation { cnec, side } => write!(f, "mnec_violation[{cnec},{side}]"),
            LoopflowViolation { cnec, side } => write!(f, "loopflow_violation[{cnec},{side}]"),
            OptimizeCnecBinary { cnec, side } => {
                write!(f, "optimize_cnec_binary[{cnec},{side}]")
            }
            RangeActionUsed { action, state } => write!(f, "is_used[{action},{state}]"),
            TsoRangeActionUsed { tso, state } => write!(f, "tso_used[{tso},{state}]"),
            TapDistanceFromInitial { action, state } => {
                write!(f, "tap_distance_from_initial[{action},{state}]")
            }
            GeneratorPower { generator, timestamp } => {
                write!(f, "generator_power[{generator},{}]", ts(timestamp))
            }
            GeneratorState { generator, timestamp, state } => {
                write!(f, "generator_state_{state}[{generator},{}]", ts(timestamp))
            }
            GeneratorOnMode { generator, timestamp, mode } => {
                write!(f, "generator_on_mode_{mode}[{generator},{}]", ts(timestamp))
            }
            GeneratorTransition { generator, timestamp, from, to } => {
                write!(f, "generator_transition_{from}_to_{to}[{generator},{}]", ts(timestamp))
            }
        }
    }
}

impl std::fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ConstraintId::*;
        match self {
            Flow { cnec, side } => write!(f, "flow_constraint[{cnec},{side}]"),
            SetPointVariation { action, state } => {
                write!(f, "set_point_variation_constraint[{action},{state}]")
            }
            AbsoluteVariation { action, state, direction } => {
                write!(f, "absolute_variation_{direction}_constraint[{action},{state}]")
            }
            RelativeSetPoint { action, state } => {
                write!(f, "relative_set_point_constraint[{action},{state}]")
            }
            RangeShrinking { action, state } => {
                write!(f, "range_shrinking_constraint[{action},{state}]")
            }
            InjectionBalance { state } => write!(f, "injection_balance_constraint[{state}]"),
            TapToAngleConversion { action, state } => {
                write!(f, "tap_to_angle_conversion_constraint[{action},{state}]")
            }
            UpOrDownVariation { action, state } => {
                write!(f, "up_or_down_variation_constraint[{action},{state}]")
            }
            TapVariationAuthorization { action, state, direction } => {
                write!(f, "tap_variation_authorization_{direction}_constraint[{action},{state}]")
            }
            TapValue { action, state } => write!(f, "tap_value_constraint[{action},{state}]"),
            RelativeTap { action, state } => {
                write!(f, "relative_tap_constraint[{action},{state}]")
            }
            GroupTapEquality { action, state } => {
                write!(f, "group_tap_equality_constraint[{action},{state}]")
            }
            GroupSetPointEquality { action, state } => {
                write!(f, "group_set_point_equality_constraint[{action},{state}]")
            }
            TimestepSetPoint { action, state } => {
                write!(f, "timestep_set_point_constraint[{action},{state}]")
            }
            TimestepTap { action, state } => {
                write!(f, "timestep_tap_constraint[{action},{state}]")
            }
            MinimumMargin { cnec, side, bound } => {
                write!(f, "minimum_margin_{bound:?}_constraint[{cnec},{side}]")
            }
            MinimumRelativeMargin { cnec, side, bound } => {
                write!(f, "minimum_relative_margin_{bound:?}_constraint[{cnec},{side}]")
            }
            MarginSignDefinition => write!(f, "margin_sign_definition_constraint"),
            RelativeMarginSetToZero => write!(f, "relative_margin_set_to_zero_constraint"),
            MnecFlow { cnec, side, bound } => {
                write!(f, "mnec_flow_{bound:?}_constraint[{cnec},{side}]")
            }
            MaxLoopFlow { cnec, side, bound } => {
                write!(f, "max_loop_flow_{bound:?}_constraint[{cnec},{side}]")
            }
            DontOptimizeCnec { cnec, side, bound } => {
                write!(f, "dont_optimize_cnec_{bound:?}_constraint[{cnec},{side}]")
            }
            IsVariation { action, state } => {
                write!(f, "is_variation_constraint[{action},{state}]")
            }
            MaxRangeActions { state } => write!(f, "max_range_actions_constraint[{state}]"),
            TsoRangeActionUsed { tso, action, state } => {
                write!(f, "tso_used_constraint[{tso},{action},{state}]")
            }
            MaxTso { state } => write!(f, "max_tso_constraint[{state}]"),
            MaxRangeActionsPerTso { tso, state } => {
                write!(f, "max_range_actions_per_tso_constraint[{tso},{state}]")
            }
            MaxPstPerTso { tso, state } => {
                write!(f, "max_pst_per_tso_constraint[{tso},{state}]")
            }
            MaxElementaryActionsPerTso { tso, state } => {
                write!(f, "max_elementary_actions_per_tso_constraint[{tso},{state}]")
            }
            TapDistanceDefinition { action, state, sign } => {
                write!(f, "tap_distance_{sign:?}_constraint[{action},{state}]")
            }
            GeneratorUniqueState { generator, timestamp } => {
                write!(f, "generator_unique_state_constraint[{generator},{}]", ts(timestamp))
            }
            GeneratorOffPower { generator, timestamp } => {
                write!(f, "generator_off_power_constraint[{generator},{}]", ts(timestamp))
            }
            GeneratorMinPower { generator, timestamp } => {
                write!(f, "generator_min_power_constraint[{generator},{}]", ts(timestamp))
            }
            GeneratorOnDecomposition { generator, timestamp } => {
                write!(f, "generator_on_decomposition_constraint[{generator},{}]", ts(timestamp))
            }
            GeneratorDelta { generator, timestamp, direction } => {
                write!(f, "generator_delta_{direction}_constraint[{generator},{}]", ts(timestamp))
            }
            GeneratorFromState { generator, timestamp, state } => {
                write!(f, "generator_from_{state}_constraint[{generator},{}]", ts(timestamp))
            }
            GeneratorToState { generator, timestamp, state } => {
                write!(f, "generator_to_{state}_constraint[{generator},{}]", ts(timestamp))
            }
            GeneratorInitialState { generator } => {
                write!(f, "generator_initial_state_constraint[{generator}]")
            }
            GeneratorPowerTransition { generator, timestamp, bound } => {
                write!(
                    f,
                    "generator_power_transition_{bound:?}_constraint[{generator},{}]",
                    ts(timestamp)
                )
            }
            GeneratorRedispatch { generator, timestamp } => {
                write!(f, "generator_redispatch_constraint[{generator},{}]", ts(timestamp))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_id_display() {
        let id = VariableId::SetPoint {
            action: ActionId::from("pst1"),
            state: State::preventive(),
        };
        assert_eq!(id.to_string(), "set_point[pst1,Preventive(0)]");
    }

    #[test]
    fn test_keys_are_distinct_by_direction() {
        let up = VariableId::TapVariation {
            action: ActionId::from("pst1"),
            state: State::preventive(),
            direction: VariationDirection::Upward,
        };
        let down = VariableId::TapVariation {
            action: ActionId::from("pst1"),
            state: State::preventive(),
            direction: VariationDirection::Downward,
        };
        assert_ne!(up, down);
    }
}
