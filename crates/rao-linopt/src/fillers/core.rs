//! Core flow/range filler.
//!
//! Builds, for every valid monitored element side, a free flow variable and
//! the linearized flow balance `F = f_ref + Σ s·(S - S_current)`, and for
//! every available action a setpoint variable with its admissible-range,
//! variation and absolute-variation constraints. Also carries the
//! trust-region range shrinking that damps oscillation of the outer
//! sequential-linearization loop.

use crate::filler::{FillerInputs, ProblemFiller};
use crate::inputs::{OptimizationContext, SETPOINT_EPSILON};
use crate::parameters::RangeActionParameters;
use crate::problem::{
    ConstraintId, LinearProblem, VariableId, VariationDirection,
};
use rao_core::{
    ActivationSnapshot, FlowCnec, RangeAction, RaoError, RaoResult, Side, State,
};
use std::sync::Arc;
use tracing::debug;

/// Geometric shrink rate of the trust-region window per iteration.
const RANGE_SHRINK_RATE: f64 = 0.667;

/// Core flow/range filler. One instance per optimization leaf (or per
/// study period in multi-timestep mode).
pub struct CoreProblemFiller {
    context: Arc<OptimizationContext>,
    parameters: RangeActionParameters,
}

impl CoreProblemFiller {
    pub fn new(context: Arc<OptimizationContext>, parameters: RangeActionParameters) -> Self {
        CoreProblemFiller { context, parameters }
    }

    fn build_flow_variables(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
    ) -> RaoResult<()> {
        for cnec in self.context.cnecs() {
            for side in cnec.monitored_sides() {
                if !inputs.sensitivities.is_valid(cnec, side) {
                    debug!(cnec = %cnec.id, %side, "skipping invalid monitored side");
                    continue;
                }
                problem.add_variable(
                    VariableId::Flow { cnec: cnec.id.clone(), side },
                    -LinearProblem::infinity(),
                    LinearProblem::infinity(),
                )?;
            }
        }
        Ok(())
    }

    fn build_range_action_variables(&self, problem: &mut LinearProblem) -> RaoResult<()> {
        for (state, actions) in self.context.actions_per_state() {
            for action in actions {
                let has_previous = self.context.previous_occurrence(action, state).is_some();
                let (lb, ub) = if has_previous {
                    (-LinearProblem::infinity(), LinearProblem::infinity())
                } else {
                    let (min, max) = self.context.admissible_setpoint_range(action)?;
                    (min - SETPOINT_EPSILON, max + SETPOINT_EPSILON)
                };
                problem.add_variable(
                    VariableId::SetPoint { action: action.id.clone(), state: state.clone() },
                    lb,
                    ub,
                )?;
                for direction in [VariationDirection::Upward, VariationDirection::Downward] {
                    problem.add_variable(
                        VariableId::SetPointVariation {
                            action: action.id.clone(),
                            state: state.clone(),
                            direction,
                        },
                        0.0,
                        LinearProblem::infinity(),
                    )?;
                }
                problem.add_variable(
                    VariableId::AbsoluteVariation {
                        action: action.id.clone(),
                        state: state.clone(),
                    },
                    0.0,
                    LinearProblem::infinity(),
                )?;
            }
        }
        Ok(())
    }

    /// Flow balance of one monitored side: `F - Σ s·S = f_ref - Σ s·S_cur`.
    /// Below-threshold sensitivities are omitted at build time (they are
    /// zeroed, not removed, on refresh, to keep the sparsity pattern
    /// stable).
    fn fill_flow_constraint(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        cnec: &FlowCnec,
        side: Side,
        build: bool,
    ) -> RaoResult<()> {
        let flow_id = ConstraintId::Flow { cnec: cnec.id.clone(), side };
        let cons = if build {
            let cons = problem.add_constraint(flow_id, 0.0, 0.0)?;
            let flow_var =
                problem.get_variable(&VariableId::Flow { cnec: cnec.id.clone(), side })?;
            problem.set_coefficient(cons, flow_var, 1.0);
            cons
        } else {
            match problem.find_constraint(&flow_id) {
                Some(cons) => cons,
                // side was invalid at build time, nothing to refresh
                None => return Ok(()),
            }
        };

        let reference_flow = inputs.sensitivities.flow(&cnec.id, side);
        let mut bound = reference_flow;
        for (action_state, action) in self.context.actions_available_before(&cnec.state) {
            let sensitivity =
                inputs.sensitivities.sensitivity(&action.id, &cnec.id, side);
            let threshold = self.parameters.sensitivity_threshold(&action.kind);
            let set_point_var = problem.get_variable(&VariableId::SetPoint {
                action: action.id.clone(),
                state: action_state.clone(),
            })?;
            if sensitivity.is_finite() && sensitivity.abs() >= threshold {
                let current = current_setpoint(inputs.activations, action, action_state)?;
                bound -= sensitivity * current;
                problem.set_coefficient(cons, set_point_var, -sensitivity);
            } else if !build {
                problem.set_coefficient(cons, set_point_var, 0.0);
            }
        }
        problem.set_constraint_bounds(cons, bound, bound);
        Ok(())
    }

    fn build_flow_constraints(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
    ) -> RaoResult<()> {
        for cnec in self.context.cnecs() {
            for side in cnec.monitored_sides() {
                if inputs.sensitivities.is_valid(cnec, side) {
                    self.fill_flow_constraint(problem, inputs, cnec, side, true)?;
                }
            }
        }
        Ok(())
    }

    fn update_flow_constraints(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
    ) -> RaoResult<()> {
        for cnec in self.context.cnecs() {
            for side in cnec.monitored_sides() {
                if inputs.sensitivities.is_valid(cnec, side) {
                    self.fill_flow_constraint(problem, inputs, cnec, side, false)?;
                }
            }
        }
        Ok(())
    }

    /// Variation bookkeeping of one action on one state:
    /// `S - up + down = ref` and the two `AV ≥ ±(S - ref)` inequalities,
    /// where `ref` is the pre-perimeter position or the previous-instant
    /// setpoint variable.
    fn build_set_point_constraints(&self, problem: &mut LinearProblem) -> RaoResult<()> {
        for (state, actions) in self.context.actions_per_state() {
            for action in actions {
                let set_point = problem.get_variable(&VariableId::SetPoint {
                    action: action.id.clone(),
                    state: state.clone(),
                })?;
                let up = problem.get_variable(&VariableId::SetPointVariation {
                    action: action.id.clone(),
                    state: state.clone(),
                    direction: VariationDirection::Upward,
                })?;
                let down = problem.get_variable(&VariableId::SetPointVariation {
                    action: action.id.clone(),
                    state: state.clone(),
                    direction: VariationDirection::Downward,
                })?;
                let av = problem.get_variable(&VariableId::AbsoluteVariation {
                    action: action.id.clone(),
                    state: state.clone(),
                })?;

                let previous = self.context.previous_occurrence(action, state);
                let previous_var = previous
                    .map(|(prev_state, prev_action)| {
                        problem.get_variable(&VariableId::SetPoint {
                            action: prev_action.id.clone(),
                            state: prev_state.clone(),
                        })
                    })
                    .transpose()?;
                let reference = match previous_var {
                    Some(_) => 0.0,
                    None => self.context.initial_setpoint(&action.id)?,
                };

                let variation = problem.add_constraint(
                    ConstraintId::SetPointVariation {
                        action: action.id.clone(),
                        state: state.clone(),
                    },
                    reference,
                    reference,
                )?;
                problem.set_coefficient(variation, set_point, 1.0);
                problem.set_coefficient(variation, up, -1.0);
                problem.set_coefficient(variation, down, 1.0);
                if let Some(prev) = previous_var {
                    problem.set_coefficient(variation, prev, -1.0);
                }

                // AV ≥ S - ref
                let upward = problem.add_constraint(
                    ConstraintId::AbsoluteVariation {
                        action: action.id.clone(),
                        state: state.clone(),
                        direction: VariationDirection::Upward,
                    },
                    -reference,
                    LinearProblem::infinity(),
                )?;
                problem.set_coefficient(upward, av, 1.0);
                problem.set_coefficient(upward, set_point, -1.0);
                if let Some(prev) = previous_var {
                    problem.set_coefficient(upward, prev, 1.0);
                }

                // AV ≥ ref - S
                let downward = problem.add_constraint(
                    ConstraintId::AbsoluteVariation {
                        action: action.id.clone(),
                        state: state.clone(),
                        direction: VariationDirection::Downward,
                    },
                    reference,
                    LinearProblem::infinity(),
                )?;
                problem.set_coefficient(downward, av, 1.0);
                problem.set_coefficient(downward, set_point, 1.0);
                if let Some(prev) = previous_var {
                    problem.set_coefficient(downward, prev, -1.0);
                }

                if previous_var.is_some() {
                    self.build_relative_set_point_constraint(problem, action, state)?;
                }
            }
        }
        Ok(())
    }

    fn build_relative_set_point_constraint(
        &self,
        problem: &mut LinearProblem,
        action: &RangeAction,
        state: &State,
    ) -> RaoResult<()> {
        let (prev_state, prev_action) = self
            .context
            .previous_occurrence(action, state)
            .ok_or_else(|| RaoError::data(format!("no previous occurrence for {}", action.id)))?;
        let set_point = problem.get_variable(&VariableId::SetPoint {
            action: action.id.clone(),
            state: state.clone(),
        })?;
        let prev = problem.get_variable(&VariableId::SetPoint {
            action: prev_action.id.clone(),
            state: prev_state.clone(),
        })?;
        match action.relative_setpoint_range()? {
            Some((min_rel, max_rel)) => {
                let cons = problem.add_constraint(
                    ConstraintId::RelativeSetPoint {
                        action: action.id.clone(),
                        state: state.clone(),
                    },
                    min_rel - SETPOINT_EPSILON,
                    max_rel + SETPOINT_EPSILON,
                )?;
                problem.set_coefficient(cons, set_point, 1.0);
                problem.set_coefficient(cons, prev, -1.0);
            }
            None => {
                // no relative clause: fall back to the absolute range
                let (min, max) = self.context.admissible_setpoint_range(action)?;
                let var = set_point;
                problem.set_variable_bounds(
                    var,
                    min - SETPOINT_EPSILON,
                    max + SETPOINT_EPSILON,
                );
            }
        }
        Ok(())
    }

    /// Zero-sum balance of injection variations per state. Injections with
    /// a zero distribution-key sum cannot shift any power; their variation
    /// variables are pinned to zero instead of entering the balance.
    fn build_injection_balance_constraints(&self, problem: &mut LinearProblem) -> RaoResult<()> {
        for (state, actions) in self.context.actions_per_state() {
            let mut balanced: Vec<(&RangeAction, f64)> = Vec::new();
            for action in actions {
                let Some(injection) = action.injection() else { continue };
                let key_sum = injection.key_sum();
                if key_sum == 0.0 {
                    debug!(action = %action.id, "zero distribution-key sum, pinning variations");
                    for direction in [VariationDirection::Upward, VariationDirection::Downward] {
                        let var = problem.get_variable(&VariableId::SetPointVariation {
                            action: action.id.clone(),
                            state: state.clone(),
                            direction,
                        })?;
                        problem.set_variable_bounds(var, 0.0, 0.0);
                    }
                } else {
                    balanced.push((action, key_sum));
                }
            }
            if balanced.len() < 2 {
                continue;
            }
            let cons = problem.add_constraint(
                ConstraintId::InjectionBalance { state: state.clone() },
                0.0,
                0.0,
            )?;
            for (action, key_sum) in balanced {
                let up = problem.get_variable(&VariableId::SetPointVariation {
                    action: action.id.clone(),
                    state: state.clone(),
                    direction: VariationDirection::Upward,
                })?;
                let down = problem.get_variable(&VariableId::SetPointVariation {
                    action: action.id.clone(),
                    state: state.clone(),
                    direction: VariationDirection::Downward,
                })?;
                problem.set_coefficient(cons, up, key_sum);
                problem.set_coefficient(cons, down, -key_sum);
            }
        }
        Ok(())
    }

    /// Objective terms. Margin mode puts the small per-kind penalty on both
    /// variation directions; cost mode uses the declared variation costs and
    /// charges activation costs through a usage binary capped by the
    /// absolute variation.
    fn fill_objective(&self, problem: &mut LinearProblem) -> RaoResult<()> {
        for (state, actions) in self.context.actions_per_state() {
            for action in actions {
                let penalty = self.parameters.penalty_cost(&action.kind);
                let (up_cost, down_cost) = if self.parameters.cost_optimization {
                    (
                        action.upward_variation_cost.unwrap_or(penalty),
                        action.downward_variation_cost.unwrap_or(penalty),
                    )
                } else {
                    (penalty, penalty)
                };
                let up = problem.get_variable(&VariableId::SetPointVariation {
                    action: action.id.clone(),
                    state: state.clone(),
                    direction: VariationDirection::Upward,
                })?;
                let down = problem.get_variable(&VariableId::SetPointVariation {
                    action: action.id.clone(),
                    state: state.clone(),
                    direction: VariationDirection::Downward,
                })?;
                problem.set_objective_coefficient(up, up_cost);
                problem.set_objective_coefficient(down, down_cost);

                if self.parameters.cost_optimization {
                    if let Some(activation_cost) = action.activation_cost {
                        let used = self.get_or_create_usage_binary(problem, action, state)?;
                        problem.set_objective_coefficient(used, activation_cost);
                    }
                }
            }
        }
        Ok(())
    }

    fn get_or_create_usage_binary(
        &self,
        problem: &mut LinearProblem,
        action: &RangeAction,
        state: &State,
    ) -> RaoResult<crate::problem::VarRef> {
        let id = VariableId::RangeActionUsed { action: action.id.clone(), state: state.clone() };
        if let Some(var) = problem.find_variable(&id) {
            return Ok(var);
        }
        let used = problem.add_binary_variable(id)?;
        let av = problem.get_variable(&VariableId::AbsoluteVariation {
            action: action.id.clone(),
            state: state.clone(),
        })?;
        let (min, max) = self.context.admissible_setpoint_range(action)?;
        let cons = problem.add_constraint(
            ConstraintId::IsVariation { action: action.id.clone(), state: state.clone() },
            -LinearProblem::infinity(),
            0.0,
        )?;
        problem.set_coefficient(cons, av, 1.0);
        problem.set_coefficient(cons, used, -(max - min + SETPOINT_EPSILON));
        Ok(used)
    }

    /// Trust-region shrinking: window `previousOptimum ± span·rate^iter`,
    /// clamped to the admissible range, created on first use then
    /// tightened. Skipped on the zeroth iteration so the first solve sees
    /// the full range.
    fn update_range_shrinking(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        iteration: usize,
    ) -> RaoResult<()> {
        if iteration == 0 {
            return Ok(());
        }
        let factor = RANGE_SHRINK_RATE.powi(iteration as i32);
        for (state, actions) in self.context.actions_per_state() {
            for action in actions {
                let (min, max) = self.context.admissible_setpoint_range(action)?;
                let previous = current_setpoint(inputs.activations, action, state)?;
                let width = (max - min) * factor;
                let lb = (previous - width).max(min);
                let ub = (previous + width).min(max);
                let id = ConstraintId::RangeShrinking {
                    action: action.id.clone(),
                    state: state.clone(),
                };
                match problem.find_constraint(&id) {
                    Some(cons) => problem.set_constraint_bounds(cons, lb, ub),
                    None => {
                        let cons = problem.add_constraint(id, lb, ub)?;
                        let set_point = problem.get_variable(&VariableId::SetPoint {
                            action: action.id.clone(),
                            state: state.clone(),
                        })?;
                        problem.set_coefficient(cons, set_point, 1.0);
                    }
                }
            }
        }
        Ok(())
    }
}

fn current_setpoint(
    activations: &ActivationSnapshot,
    action: &RangeAction,
    state: &State,
) -> RaoResult<f64> {
    activations
        .setpoint(&action.id, state)
        .ok_or_else(|| RaoError::data(format!("no known setpoint for {}", action.id)))
}

impl ProblemFiller for CoreProblemFiller {
    fn fill(&self, problem: &mut LinearProblem, inputs: &FillerInputs<'_>) -> RaoResult<()> {
        self.build_flow_variables(problem, inputs)?;
        self.build_range_action_variables(problem)?;
        self.build_flow_constraints(problem, inputs)?;
        self.build_set_point_constraints(problem)?;
        self.build_injection_balance_constraints(problem)?;
        self.fill_objective(problem)
    }

    fn update_between_sensi_iteration(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        iteration: usize,
    ) -> RaoResult<()> {
        self.update_flow_constraints(problem, inputs)?;
        if self.parameters.range_shrinking {
            self.update_range_shrinking(problem, inputs, iteration)?;
        }
        Ok(())
    }

    fn update_between_mip_iteration(
        &self,
        _problem: &mut LinearProblem,
        _activations: &ActivationSnapshot,
    ) -> RaoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        inputs, mw_cnec, pst_action, simple_context, uniform_pst_data,
    };
    use rao_core::{ActionId, CnecId, SensitivitySnapshot, SetpointSnapshot};
    use std::collections::BTreeMap;

    /// One monitored element at ±1000 MW, reference flow 1100 MW, one PST
    /// with sensitivity 50 MW/°, range ±3.1°, current setpoint 0.1°.
    fn scenario() -> (Arc<OptimizationContext>, SensitivitySnapshot, SetpointSnapshot) {
        let cnec = mw_cnec("cnec1", -1000.0, 1000.0);
        let action = pst_action("pst1", uniform_pst_data(16, 3.1 / 16.0));
        let mut actions = BTreeMap::new();
        actions.insert(State::preventive(), vec![action]);

        let mut pre = SetpointSnapshot::new();
        pre.set_setpoint("pst1", 0.1);
        pre.set_tap("pst1", 0);

        let mut sensi = SensitivitySnapshot::new();
        sensi.set_flow("cnec1", Side::One, 1100.0);
        sensi.set_sensitivity("pst1", "cnec1", Side::One, 50.0);

        (Arc::new(simple_context(vec![cnec], actions, pre.clone())), sensi, pre)
    }

    #[test]
    fn test_flow_constraint_linearization() {
        let (ctx, sensi, pre) = scenario();
        let filler = CoreProblemFiller::new(ctx, RangeActionParameters::default());
        let mut problem = LinearProblem::new();
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        filler
            .fill(&mut problem, &inputs(&sensi, &activations))
            .unwrap();

        let cons = problem
            .get_constraint(&ConstraintId::Flow { cnec: CnecId::from("cnec1"), side: Side::One })
            .unwrap();
        // bound = 1100 - 50·0.1 = 1095 on both sides
        assert!((problem.constraint_lb(cons) - 1095.0).abs() < 1e-9);
        assert!((problem.constraint_ub(cons) - 1095.0).abs() < 1e-9);

        let set_point = problem
            .get_variable(&VariableId::SetPoint {
                action: ActionId::from("pst1"),
                state: State::preventive(),
            })
            .unwrap();
        assert!((problem.coefficient(cons, set_point) + 50.0).abs() < 1e-9);

        let flow = problem
            .get_variable(&VariableId::Flow { cnec: CnecId::from("cnec1"), side: Side::One })
            .unwrap();
        assert_eq!(problem.coefficient(cons, flow), 1.0);
    }

    #[test]
    fn test_set_point_bounds_equal_admissible_range() {
        let (ctx, sensi, pre) = scenario();
        let filler = CoreProblemFiller::new(ctx, RangeActionParameters::default());
        let mut problem = LinearProblem::new();
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        filler
            .fill(&mut problem, &inputs(&sensi, &activations))
            .unwrap();

        let set_point = problem
            .get_variable(&VariableId::SetPoint {
                action: ActionId::from("pst1"),
                state: State::preventive(),
            })
            .unwrap();
        assert!((problem.variable_lb(set_point) - (-3.1 - SETPOINT_EPSILON)).abs() < 1e-9);
        assert!((problem.variable_ub(set_point) - (3.1 + SETPOINT_EPSILON)).abs() < 1e-9);
    }

    #[test]
    fn test_variation_constraints_anchor_on_pre_perimeter() {
        let (ctx, sensi, pre) = scenario();
        let filler = CoreProblemFiller::new(ctx, RangeActionParameters::default());
        let mut problem = LinearProblem::new();
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        filler
            .fill(&mut problem, &inputs(&sensi, &activations))
            .unwrap();

        let variation = problem
            .get_constraint(&ConstraintId::SetPointVariation {
                action: ActionId::from("pst1"),
                state: State::preventive(),
            })
            .unwrap();
        assert!((problem.constraint_lb(variation) - 0.1).abs() < 1e-9);
        assert!((problem.constraint_ub(variation) - 0.1).abs() < 1e-9);

        let av_up = problem
            .get_constraint(&ConstraintId::AbsoluteVariation {
                action: ActionId::from("pst1"),
                state: State::preventive(),
                direction: VariationDirection::Upward,
            })
            .unwrap();
        assert!((problem.constraint_lb(av_up) + 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_refresh_with_identical_snapshot_is_stable() {
        let (ctx, sensi, pre) = scenario();
        let filler = CoreProblemFiller::new(ctx, RangeActionParameters::default());
        let mut problem = LinearProblem::new();
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        let io = inputs(&sensi, &activations);
        filler.fill(&mut problem, &io).unwrap();

        let cons = problem
            .get_constraint(&ConstraintId::Flow { cnec: CnecId::from("cnec1"), side: Side::One })
            .unwrap();
        let set_point = problem
            .get_variable(&VariableId::SetPoint {
                action: ActionId::from("pst1"),
                state: State::preventive(),
            })
            .unwrap();
        let (lb, ub) = (problem.constraint_lb(cons), problem.constraint_ub(cons));
        let coeff = problem.coefficient(cons, set_point);

        filler.update_between_sensi_iteration(&mut problem, &io, 0).unwrap();

        assert_eq!(problem.constraint_lb(cons), lb);
        assert_eq!(problem.constraint_ub(cons), ub);
        assert_eq!(problem.coefficient(cons, set_point), coeff);
    }

    #[test]
    fn test_below_threshold_zeroed_on_update_only() {
        let (ctx, mut sensi, pre) = scenario();
        let filler = CoreProblemFiller::new(ctx, RangeActionParameters::default());
        let mut problem = LinearProblem::new();
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        filler
            .fill(&mut problem, &inputs(&sensi, &activations))
            .unwrap();

        // sensitivity collapses below threshold on the next iteration
        sensi.set_sensitivity("pst1", "cnec1", Side::One, 1e-9);
        filler
            .update_between_sensi_iteration(&mut problem, &inputs(&sensi, &activations), 1)
            .unwrap();

        let cons = problem
            .get_constraint(&ConstraintId::Flow { cnec: CnecId::from("cnec1"), side: Side::One })
            .unwrap();
        let set_point = problem
            .get_variable(&VariableId::SetPoint {
                action: ActionId::from("pst1"),
                state: State::preventive(),
            })
            .unwrap();
        assert_eq!(problem.coefficient(cons, set_point), 0.0);
        // bound reverts to the raw reference flow
        assert!((problem.constraint_lb(cons) - 1100.0).abs() < 1e-9);
    }

    #[test]
    fn test_range_shrinking_skips_iteration_zero_then_tightens() {
        let (ctx, sensi, pre) = scenario();
        let parameters = RangeActionParameters { range_shrinking: true, ..Default::default() };
        let filler = CoreProblemFiller::new(ctx, parameters);
        let mut problem = LinearProblem::new();
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        let io = inputs(&sensi, &activations);
        filler.fill(&mut problem, &io).unwrap();

        let id = ConstraintId::RangeShrinking {
            action: ActionId::from("pst1"),
            state: State::preventive(),
        };

        filler.update_between_sensi_iteration(&mut problem, &io, 0).unwrap();
        assert!(problem.find_constraint(&id).is_none());

        filler.update_between_sensi_iteration(&mut problem, &io, 1).unwrap();
        let cons = problem.get_constraint(&id).unwrap();
        let width_1 = 6.2 * RANGE_SHRINK_RATE;
        assert!((problem.constraint_lb(cons) - (0.1 - width_1)).abs() < 1e-9);
        assert!((problem.constraint_ub(cons) - (0.1 + width_1)).abs() < 1e-9);

        filler.update_between_sensi_iteration(&mut problem, &io, 2).unwrap();
        let width_2 = 6.2 * RANGE_SHRINK_RATE * RANGE_SHRINK_RATE;
        assert!(width_2 < width_1);
        assert!((problem.constraint_ub(cons) - (0.1 + width_2)).abs() < 1e-9);
    }

    #[test]
    fn test_objective_penalties_on_variations() {
        let (ctx, sensi, pre) = scenario();
        let filler = CoreProblemFiller::new(ctx, RangeActionParameters::default());
        let mut problem = LinearProblem::new();
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        filler
            .fill(&mut problem, &inputs(&sensi, &activations))
            .unwrap();

        for direction in [VariationDirection::Upward, VariationDirection::Downward] {
            let var = problem
                .get_variable(&VariableId::SetPointVariation {
                    action: ActionId::from("pst1"),
                    state: State::preventive(),
                    direction,
                })
                .unwrap();
            assert!((problem.objective_coefficient(var) - 0.01).abs() < 1e-9);
        }
    }
}
