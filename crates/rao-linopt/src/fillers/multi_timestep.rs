//! Cross-timestep coupling of a multi-period optimization.
//!
//! Each study period owns its core filler over its own context; this filler
//! adds what spans periods:
//! - flow impacts of actions set in an earlier period and not re-optimized
//!   since (their setpoint persists in the network);
//! - setpoint delta bounds against the previous period for standard
//!   actions carrying a relative-to-previous-timestep range;
//! - tap delta bounds against the previous period for PSTs, expressed on
//!   the discrete variation variables and re-anchored on the latest taps.
//!
//! Cross-period sensitivities below the threshold are omitted at build time
//! and zeroed, not removed, on refresh, like in the per-period core filler.

use crate::filler::{FillerInputs, ProblemFiller};
use crate::inputs::OptimizationContext;
use crate::parameters::RangeActionParameters;
use crate::problem::{ConsRef, ConstraintId, LinearProblem, VariableId, VariationDirection};
use rao_core::{ActivationSnapshot, RangeAction, RaoResult, State};
use std::sync::Arc;

/// Multi-timestep filler over the ordered sequence of period contexts.
/// Must run after every period's core (and discrete tap) filler.
pub struct MultiTimestepFiller {
    contexts: Vec<Arc<OptimizationContext>>,
    parameters: RangeActionParameters,
}

impl MultiTimestepFiller {
    /// `contexts` must be ordered by ascending timestamp.
    pub fn new(contexts: Vec<Arc<OptimizationContext>>, parameters: RangeActionParameters) -> Self {
        MultiTimestepFiller { contexts, parameters }
    }

    /// First occurrence of the same physical action in a context, in state
    /// order (so the preventive occurrence when there are several).
    fn counterpart<'a>(
        context: &'a OptimizationContext,
        action: &RangeAction,
    ) -> Option<(&'a State, &'a RangeAction)> {
        for (state, actions) in context.actions_per_state() {
            if let Some(found) = actions
                .iter()
                .find(|a| a.id == action.id || a.same_network_elements(action))
            {
                return Some((state, found));
            }
        }
        None
    }

    /// Whether a later period up to `until` re-optimizes the same device,
    /// superseding the persisted setpoint.
    fn superseded(&self, action: &RangeAction, after: usize, until: usize) -> bool {
        self.contexts[after + 1..=until]
            .iter()
            .any(|ctx| Self::counterpart(ctx, action).is_some())
    }

    fn current_setpoint(
        activations: &ActivationSnapshot,
        action: &RangeAction,
        state: &State,
    ) -> RaoResult<f64> {
        activations.setpoint(&action.id, state).ok_or_else(|| {
            rao_core::RaoError::data(format!("no known setpoint for {}", action.id))
        })
    }

    fn fill_flow_impacts(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        build: bool,
    ) -> RaoResult<()> {
        for (period, context) in self.contexts.iter().enumerate().skip(1) {
            for cnec in context.cnecs() {
                for side in cnec.monitored_sides() {
                    let Some(cons) = problem
                        .find_constraint(&ConstraintId::Flow { cnec: cnec.id.clone(), side })
                    else {
                        continue;
                    };
                    for earlier in (0..period).rev() {
                        self.fill_period_impact(
                            problem, inputs, cons, cnec, side, earlier, period, build,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_period_impact(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        cons: ConsRef,
        cnec: &rao_core::FlowCnec,
        side: rao_core::Side,
        earlier: usize,
        period: usize,
        build: bool,
    ) -> RaoResult<()> {
        let context = &self.contexts[earlier];
        for (state, actions) in context.actions_per_state() {
            for action in actions {
                if self.superseded(action, earlier, period) {
                    continue;
                }
                let sensitivity =
                    inputs.sensitivities.sensitivity(&action.id, &cnec.id, side);
                let threshold = self.parameters.sensitivity_threshold(&action.kind);
                let set_point = problem.get_variable(&VariableId::SetPoint {
                    action: action.id.clone(),
                    state: state.clone(),
                })?;
                if sensitivity.is_finite() && sensitivity.abs() >= threshold {
                    let current = Self::current_setpoint(inputs.activations, action, state)?;
                    // the per-period core filler already reset the bounds;
                    // this shift stacks on top of its own
                    let lb = problem.constraint_lb(cons) - sensitivity * current;
                    let ub = problem.constraint_ub(cons) - sensitivity * current;
                    problem.set_constraint_bounds(cons, lb, ub);
                    problem.set_coefficient(cons, set_point, -sensitivity);
                } else if !build {
                    problem.set_coefficient(cons, set_point, 0.0);
                }
            }
        }
        Ok(())
    }

    fn fill_linkage_constraints(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        build: bool,
    ) -> RaoResult<()> {
        for (period, context) in self.contexts.iter().enumerate().skip(1) {
            let previous_context = &self.contexts[period - 1];
            for (state, actions) in context.actions_per_state() {
                for action in actions {
                    let Some((prev_state, prev_action)) =
                        Self::counterpart(previous_context, action)
                    else {
                        continue;
                    };
                    if build {
                        if let Some((lo, hi)) = action.timestep_setpoint_range() {
                            let cons = problem.add_constraint(
                                ConstraintId::TimestepSetPoint {
                                    action: action.id.clone(),
                                    state: state.clone(),
                                },
                                lo,
                                hi,
                            )?;
                            let set_point = problem.get_variable(&VariableId::SetPoint {
                                action: action.id.clone(),
                                state: state.clone(),
                            })?;
                            let previous = problem.get_variable(&VariableId::SetPoint {
                                action: prev_action.id.clone(),
                                state: prev_state.clone(),
                            })?;
                            problem.set_coefficient(cons, set_point, 1.0);
                            problem.set_coefficient(cons, previous, -1.0);
                        }
                    }
                    self.fill_tap_linkage(
                        problem,
                        inputs.activations,
                        state,
                        action,
                        prev_state,
                        prev_action,
                        build,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// `(τ + ΔT⁺ - ΔT⁻) - (τ_prev + ΔT⁺_prev - ΔT⁻_prev) ∈ [lo, hi]`,
    /// with the constant taps folded into the bounds.
    #[allow(clippy::too_many_arguments)]
    fn fill_tap_linkage(
        &self,
        problem: &mut LinearProblem,
        activations: &ActivationSnapshot,
        state: &State,
        action: &RangeAction,
        prev_state: &State,
        prev_action: &RangeAction,
        build: bool,
    ) -> RaoResult<()> {
        let Some(pst) = action.pst() else { return Ok(()) };
        let Some((lo, hi)) = pst.timestep_tap_interval() else { return Ok(()) };
        let tap = activations.tap(&action.id, state).ok_or_else(|| {
            rao_core::RaoError::data(format!("no known tap for {}", action.id))
        })?;
        let prev_tap = activations.tap(&prev_action.id, prev_state).ok_or_else(|| {
            rao_core::RaoError::data(format!("no known tap for {}", prev_action.id))
        })?;
        let shift = f64::from(prev_tap - tap);
        let id = ConstraintId::TimestepTap { action: action.id.clone(), state: state.clone() };
        if build {
            let cons =
                problem.add_constraint(id, f64::from(lo) + shift, f64::from(hi) + shift)?;
            for (target_action, target_state, sign) in
                [(action, state, 1.0), (prev_action, prev_state, -1.0)]
            {
                let up = problem.get_variable(&VariableId::TapVariation {
                    action: target_action.id.clone(),
                    state: target_state.clone(),
                    direction: VariationDirection::Upward,
                })?;
                let down = problem.get_variable(&VariableId::TapVariation {
                    action: target_action.id.clone(),
                    state: target_state.clone(),
                    direction: VariationDirection::Downward,
                })?;
                problem.set_coefficient(cons, up, sign);
                problem.set_coefficient(cons, down, -sign);
            }
        } else if let Some(cons) = problem.find_constraint(&id) {
            problem.set_constraint_bounds(cons, f64::from(lo) + shift, f64::from(hi) + shift);
        }
        Ok(())
    }
}

impl ProblemFiller for MultiTimestepFiller {
    fn fill(&self, problem: &mut LinearProblem, inputs: &FillerInputs<'_>) -> RaoResult<()> {
        self.fill_flow_impacts(problem, inputs, true)?;
        self.fill_linkage_constraints(problem, inputs, true)
    }

    fn update_between_sensi_iteration(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        _iteration: usize,
    ) -> RaoResult<()> {
        self.fill_flow_impacts(problem, inputs, false)?;
        self.fill_linkage_constraints(problem, inputs, false)
    }

    fn update_between_mip_iteration(
        &self,
        problem: &mut LinearProblem,
        activations: &ActivationSnapshot,
    ) -> RaoResult<()> {
        for (period, context) in self.contexts.iter().enumerate().skip(1) {
            let previous_context = &self.contexts[period - 1];
            for (state, actions) in context.actions_per_state() {
                for action in actions {
                    if let Some((prev_state, prev_action)) =
                        Self::counterpart(previous_context, action)
                    {
                        self.fill_tap_linkage(
                            problem, activations, state, action, prev_state, prev_action, false,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}
