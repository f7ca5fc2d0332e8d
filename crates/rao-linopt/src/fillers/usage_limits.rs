//! Usage limits on remedial actions.
//!
//! Caps the number of used actions, of operators with used actions, and of
//! per-operator actions, PSTs and elementary tap moves. Every available
//! action gets a usage binary tied to its variation variables by a big-M
//! link; the caps are plain cardinality constraints over those binaries.
//!
//! A PST whose taps are approximated by a continuous setpoint can drift by
//! rounding without really moving; its big-M link is relaxed by a fraction
//! of the average tap step so rounding noise does not count as usage.

use crate::filler::{FillerInputs, ProblemFiller};
use crate::inputs::OptimizationContext;
use crate::parameters::UsageLimits;
use crate::problem::{
    ConstraintId, LinearProblem, Sign, VarRef, VariableId, VariationDirection,
};
use rao_core::{ActivationSnapshot, RangeAction, RaoResult, State, TsoId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Epsilon keeping the big-M link feasible at the range edges.
const USAGE_EPSILON: f64 = 1e-4;
/// Fraction of the average tap step tolerated as rounding noise.
const PST_RELAXATION_RATIO: f64 = 0.3;

/// Usage-limits filler. Must run after the core filler, and after the
/// discrete tap filler when elementary-action limits are set.
pub struct UsageLimitsFiller {
    context: Arc<OptimizationContext>,
    limits_per_state: BTreeMap<State, UsageLimits>,
    /// Whether PST setpoints are continuous approximations of the taps.
    pst_taps_approximated: bool,
}

impl UsageLimitsFiller {
    pub fn new(
        context: Arc<OptimizationContext>,
        limits_per_state: BTreeMap<State, UsageLimits>,
        pst_taps_approximated: bool,
    ) -> Self {
        UsageLimitsFiller { context, limits_per_state, pst_taps_approximated }
    }

    /// Big-M slack of one action's usage link.
    fn relaxation(&self, action: &RangeAction) -> RaoResult<f64> {
        if !self.pst_taps_approximated {
            return Ok(0.0);
        }
        let Some(pst) = action.pst() else { return Ok(0.0) };
        let low = pst.lowest_tap()?;
        let high = pst.highest_tap()?;
        if high == low {
            return Ok(0.0);
        }
        let span = (pst.angle(high)? - pst.angle(low)?).abs();
        Ok(PST_RELAXATION_RATIO * span / f64::from(high - low))
    }

    /// `up + down - (maxSp - minSp + ε)·isUsed ≤ relaxation`.
    fn build_usage_binary(
        &self,
        problem: &mut LinearProblem,
        state: &State,
        action: &RangeAction,
    ) -> RaoResult<VarRef> {
        let id = VariableId::RangeActionUsed { action: action.id.clone(), state: state.clone() };
        if let Some(var) = problem.find_variable(&id) {
            // already created by the activation-cost objective
            return Ok(var);
        }
        let used = problem.add_binary_variable(id)?;
        let (min, max) = self.context.admissible_setpoint_range(action)?;
        let cons = problem.add_constraint(
            ConstraintId::IsVariation { action: action.id.clone(), state: state.clone() },
            -LinearProblem::infinity(),
            self.relaxation(action)?,
        )?;
        for direction in [VariationDirection::Upward, VariationDirection::Downward] {
            let variation = problem.get_variable(&VariableId::SetPointVariation {
                action: action.id.clone(),
                state: state.clone(),
                direction,
            })?;
            problem.set_coefficient(cons, variation, 1.0);
        }
        problem.set_coefficient(cons, used, -(max - min + USAGE_EPSILON));
        Ok(used)
    }

    fn build_state(
        &self,
        problem: &mut LinearProblem,
        state: &State,
        actions: &[RangeAction],
        limits: &UsageLimits,
    ) -> RaoResult<()> {
        let mut used_vars: Vec<(&RangeAction, VarRef)> = Vec::with_capacity(actions.len());
        for action in actions {
            let used = self.build_usage_binary(problem, state, action)?;
            used_vars.push((action, used));
        }

        // a cap at or above the population is vacuous
        if let Some(max_actions) = limits.max_range_actions {
            if max_actions < actions.len() {
                let cons = problem.add_constraint(
                    ConstraintId::MaxRangeActions { state: state.clone() },
                    -LinearProblem::infinity(),
                    max_actions as f64,
                )?;
                for (_, used) in &used_vars {
                    problem.set_coefficient(cons, *used, 1.0);
                }
            }
        }

        if let Some(max_tso) = limits.max_tso {
            let mut tso_vars: BTreeMap<&TsoId, VarRef> = BTreeMap::new();
            for (action, used) in &used_vars {
                if limits.max_tso_exclusions.contains(&action.operator) {
                    continue;
                }
                let tso_used = match tso_vars.get(&action.operator) {
                    Some(var) => *var,
                    None => {
                        let var = problem.add_binary_variable(VariableId::TsoRangeActionUsed {
                            tso: action.operator.clone(),
                            state: state.clone(),
                        })?;
                        tso_vars.insert(&action.operator, var);
                        var
                    }
                };
                // isUsed ≤ tsoUsed
                let cons = problem.add_constraint(
                    ConstraintId::TsoRangeActionUsed {
                        tso: action.operator.clone(),
                        action: action.id.clone(),
                        state: state.clone(),
                    },
                    -LinearProblem::infinity(),
                    0.0,
                )?;
                problem.set_coefficient(cons, *used, 1.0);
                problem.set_coefficient(cons, tso_used, -1.0);
            }
            if max_tso < tso_vars.len() {
                let cons = problem.add_constraint(
                    ConstraintId::MaxTso { state: state.clone() },
                    -LinearProblem::infinity(),
                    max_tso as f64,
                )?;
                for var in tso_vars.values() {
                    problem.set_coefficient(cons, *var, 1.0);
                }
            }
        }

        for (tso, cap) in &limits.max_range_actions_per_tso {
            let members: Vec<VarRef> = used_vars
                .iter()
                .filter(|(a, _)| &a.operator == tso)
                .map(|(_, v)| *v)
                .collect();
            if *cap < members.len() {
                let cons = problem.add_constraint(
                    ConstraintId::MaxRangeActionsPerTso { tso: tso.clone(), state: state.clone() },
                    -LinearProblem::infinity(),
                    *cap as f64,
                )?;
                for used in members {
                    problem.set_coefficient(cons, used, 1.0);
                }
            }
        }

        for (tso, cap) in &limits.max_pst_per_tso {
            let members: Vec<VarRef> = used_vars
                .iter()
                .filter(|(a, _)| a.is_pst() && &a.operator == tso)
                .map(|(_, v)| *v)
                .collect();
            if *cap < members.len() {
                let cons = problem.add_constraint(
                    ConstraintId::MaxPstPerTso { tso: tso.clone(), state: state.clone() },
                    -LinearProblem::infinity(),
                    *cap as f64,
                )?;
                for used in members {
                    problem.set_coefficient(cons, used, 1.0);
                }
            }
        }

        for (tso, cap) in &limits.max_elementary_actions_per_tso {
            self.build_elementary_cap(problem, state, actions, tso, *cap)?;
        }
        Ok(())
    }

    /// Per-operator cap on summed tap distances from the initial network:
    /// a non-negative integer distance variable per PST, defined by the
    /// two-sided constraints `D ∓ (ΔT⁺ - ΔT⁻) ≥ ±(currentTap - initialTap)`.
    fn build_elementary_cap(
        &self,
        problem: &mut LinearProblem,
        state: &State,
        actions: &[RangeAction],
        tso: &TsoId,
        cap: usize,
    ) -> RaoResult<()> {
        let mut distances: Vec<VarRef> = Vec::new();
        for action in actions.iter().filter(|a| a.is_pst() && &a.operator == tso) {
            let initial_tap = self.context.initial_tap(&action.id)?;
            // before the first solve the current tap is the initial tap
            let current_tap = self
                .context
                .pre_perimeter()
                .tap(&action.id)
                .unwrap_or(initial_tap);
            let shift = f64::from(current_tap - initial_tap);

            let distance = problem.add_integer_variable(
                VariableId::TapDistanceFromInitial {
                    action: action.id.clone(),
                    state: state.clone(),
                },
                0.0,
                LinearProblem::infinity(),
            )?;
            let up = problem.get_variable(&VariableId::TapVariation {
                action: action.id.clone(),
                state: state.clone(),
                direction: VariationDirection::Upward,
            })?;
            let down = problem.get_variable(&VariableId::TapVariation {
                action: action.id.clone(),
                state: state.clone(),
                direction: VariationDirection::Downward,
            })?;

            let positive = problem.add_constraint(
                ConstraintId::TapDistanceDefinition {
                    action: action.id.clone(),
                    state: state.clone(),
                    sign: Sign::Positive,
                },
                shift,
                LinearProblem::infinity(),
            )?;
            problem.set_coefficient(positive, distance, 1.0);
            problem.set_coefficient(positive, up, -1.0);
            problem.set_coefficient(positive, down, 1.0);

            let negative = problem.add_constraint(
                ConstraintId::TapDistanceDefinition {
                    action: action.id.clone(),
                    state: state.clone(),
                    sign: Sign::Negative,
                },
                -shift,
                LinearProblem::infinity(),
            )?;
            problem.set_coefficient(negative, distance, 1.0);
            problem.set_coefficient(negative, up, 1.0);
            problem.set_coefficient(negative, down, -1.0);

            distances.push(distance);
        }
        if !distances.is_empty() {
            let cons = problem.add_constraint(
                ConstraintId::MaxElementaryActionsPerTso { tso: tso.clone(), state: state.clone() },
                -LinearProblem::infinity(),
                cap as f64,
            )?;
            for distance in distances {
                problem.set_coefficient(cons, distance, 1.0);
            }
        }
        Ok(())
    }

    /// Re-anchor the tap-distance definitions on the latest taps.
    fn refresh_tap_distances(
        &self,
        problem: &mut LinearProblem,
        activations: &ActivationSnapshot,
    ) -> RaoResult<()> {
        for (state, limits) in &self.limits_per_state {
            if limits.max_elementary_actions_per_tso.is_empty() {
                continue;
            }
            let Some(actions) = self.context.actions_per_state().get(state) else { continue };
            for action in actions.iter().filter(|a| a.is_pst()) {
                let positive_id = ConstraintId::TapDistanceDefinition {
                    action: action.id.clone(),
                    state: state.clone(),
                    sign: Sign::Positive,
                };
                let Some(positive) = problem.find_constraint(&positive_id) else { continue };
                let initial_tap = self.context.initial_tap(&action.id)?;
                let Some(current_tap) = activations.tap(&action.id, state) else { continue };
                let shift = f64::from(current_tap - initial_tap);
                problem.set_constraint_bounds(positive, shift, LinearProblem::infinity());
                let negative = problem.get_constraint(&ConstraintId::TapDistanceDefinition {
                    action: action.id.clone(),
                    state: state.clone(),
                    sign: Sign::Negative,
                })?;
                problem.set_constraint_bounds(negative, -shift, LinearProblem::infinity());
            }
        }
        Ok(())
    }
}

impl ProblemFiller for UsageLimitsFiller {
    fn fill(&self, problem: &mut LinearProblem, _inputs: &FillerInputs<'_>) -> RaoResult<()> {
        for (state, limits) in &self.limits_per_state {
            if limits.is_empty() {
                continue;
            }
            let Some(actions) = self.context.actions_per_state().get(state) else { continue };
            self.build_state(problem, state, actions, limits)?;
        }
        Ok(())
    }

    fn update_between_sensi_iteration(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        _iteration: usize,
    ) -> RaoResult<()> {
        self.refresh_tap_distances(problem, inputs.activations)
    }

    fn update_between_mip_iteration(
        &self,
        problem: &mut LinearProblem,
        activations: &ActivationSnapshot,
    ) -> RaoResult<()> {
        self.refresh_tap_distances(problem, activations)
    }
}
