//! Release of selected elements from the margin objective.
//!
//! Some elements should only enter the max-min margin objective when the
//! optimizer actually degrades them: elements of operators without remedial
//! actions in the perimeter, as long as they keep their pre-perimeter
//! margin, and elements protected by a dedicated range action, as long as
//! that action can still secure them. A binary per element/side arbitrates:
//! at 0 the element's minimum-margin constraints are relaxed by a big-M and
//! the margin variable ignores it; the release-rule constraints force the
//! binary to 1 as soon as the tolerated situation is lost.
//!
//! The two rules are mutually exclusive; mapping elements to securing
//! actions takes precedence over the operator list.

use crate::filler::{FillerInputs, ProblemFiller};
use crate::inputs::OptimizationContext;
use crate::parameters::{RangeActionParameters, UnoptimizedCnecParameters};
use crate::problem::{ConstraintId, LinearProblem, MarginBound, VarRef, VariableId};
use rao_core::{
    ActivationSnapshot, FlowCnec, RangeAction, RaoResult, SensitivitySnapshot, Side, State,
};
use std::sync::Arc;

/// Unoptimized-element filler. Must run after the core and margin fillers.
pub struct UnoptimizedCnecFiller {
    context: Arc<OptimizationContext>,
    parameters: UnoptimizedCnecParameters,
    range_action_parameters: RangeActionParameters,
    /// Flows before any optimization, fixed for the whole run.
    initial_flows: SensitivitySnapshot,
}

impl UnoptimizedCnecFiller {
    pub fn new(
        context: Arc<OptimizationContext>,
        parameters: UnoptimizedCnecParameters,
        range_action_parameters: RangeActionParameters,
        initial_flows: SensitivitySnapshot,
    ) -> Self {
        UnoptimizedCnecFiller { context, parameters, range_action_parameters, initial_flows }
    }

    fn secured_by_action(&self) -> bool {
        !self.parameters.cnecs_secured_by_range_action.is_empty()
    }

    /// Elements the active rule applies to.
    fn selected_cnecs(&self) -> Vec<&FlowCnec> {
        self.context
            .cnecs()
            .iter()
            .filter(|cnec| cnec.optimized)
            .filter(|cnec| {
                if self.secured_by_action() {
                    self.parameters.cnecs_secured_by_range_action.contains_key(&cnec.id)
                } else {
                    self.parameters.operators_not_to_optimize.contains(&cnec.operator)
                }
            })
            .collect()
    }

    /// Largest absolute flow bound (MW) over the selected elements, scaling
    /// the big-M values.
    fn highest_threshold(cnecs: &[&FlowCnec]) -> f64 {
        let mut highest = 0.0f64;
        for cnec in cnecs {
            for side in cnec.monitored_sides() {
                if let Some(max_flow) = cnec.max_flow_mw(side) {
                    highest = highest.max(max_flow.abs());
                }
                if let Some(min_flow) = cnec.min_flow_mw(side) {
                    highest = highest.max(min_flow.abs());
                }
            }
        }
        highest
    }

    /// Worst margin of one side before any optimization (MW).
    fn pre_perimeter_margin(&self, cnec: &FlowCnec, side: Side) -> f64 {
        let flow = self.initial_flows.flow(&cnec.id, side);
        let above = cnec.max_flow_mw(side).map(|max_flow| max_flow - flow);
        let below = cnec.min_flow_mw(side).map(|min_flow| flow - min_flow);
        match (above, below) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => LinearProblem::infinity(),
        }
    }

    /// The securing action of an element, at its latest occurrence able to
    /// influence the element's state.
    fn securing_action(&self, cnec: &FlowCnec) -> Option<(&State, &RangeAction)> {
        let action_id = self.parameters.cnecs_secured_by_range_action.get(&cnec.id)?;
        self.context
            .actions_available_before(&cnec.state)
            .into_iter()
            .find(|(_, action)| action.id == *action_id)
    }

    /// Sensitivity of the securing action on the element, zeroed below the
    /// per-kind threshold.
    fn securing_sensitivity(
        &self,
        inputs: &FillerInputs<'_>,
        cnec: &FlowCnec,
        side: Side,
        action: &RangeAction,
    ) -> f64 {
        let sensitivity = inputs.sensitivities.sensitivity(&action.id, &cnec.id, side);
        let threshold = self.range_action_parameters.sensitivity_threshold(&action.kind);
        if sensitivity.is_finite() && sensitivity.abs() >= threshold {
            sensitivity
        } else {
            0.0
        }
    }

    /// `flow + bigM·b ≥ minFlow + preMargin` and
    /// `-flow + bigM·b ≥ preMargin - maxFlow`: losing the pre-perimeter
    /// margin forces the binary to 1.
    fn build_margin_decrease_constraints(
        &self,
        problem: &mut LinearProblem,
        cnec: &FlowCnec,
        side: Side,
        flow: VarRef,
        binary: VarRef,
        big_m: f64,
    ) -> RaoResult<()> {
        let pre_margin = self.pre_perimeter_margin(cnec, side);
        if let Some(min_flow) = cnec.min_flow_mw(side) {
            let cons = problem.add_constraint(
                ConstraintId::DontOptimizeCnec {
                    cnec: cnec.id.clone(),
                    side,
                    bound: MarginBound::BelowThreshold,
                },
                min_flow + pre_margin,
                LinearProblem::infinity(),
            )?;
            problem.set_coefficient(cons, flow, 1.0);
            problem.set_coefficient(cons, binary, big_m);
        }
        if let Some(max_flow) = cnec.max_flow_mw(side) {
            let cons = problem.add_constraint(
                ConstraintId::DontOptimizeCnec {
                    cnec: cnec.id.clone(),
                    side,
                    bound: MarginBound::AboveThreshold,
                },
                pre_margin - max_flow,
                LinearProblem::infinity(),
            )?;
            problem.set_coefficient(cons, flow, -1.0);
            problem.set_coefficient(cons, binary, big_m);
        }
        Ok(())
    }

    /// `flow - s·S + bigM·b ≥ minFlow - worstShift` and the symmetric upper
    /// constraint: the binary stays 0 only while the securing action has
    /// enough remaining range to keep the element inside its bounds.
    #[allow(clippy::too_many_arguments)]
    fn build_securing_action_constraints(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        cnec: &FlowCnec,
        side: Side,
        flow: VarRef,
        binary: VarRef,
        big_m: f64,
        build: bool,
    ) -> RaoResult<()> {
        let Some((action_state, action)) = self.securing_action(cnec) else {
            return Ok(());
        };
        let set_point = problem.get_variable(&VariableId::SetPoint {
            action: action.id.clone(),
            state: action_state.clone(),
        })?;
        let sensitivity = self.securing_sensitivity(inputs, cnec, side, action);
        let (min_setpoint, max_setpoint) = self.context.admissible_setpoint_range(action)?;

        if let Some(min_flow) = cnec.min_flow_mw(side) {
            let id = ConstraintId::DontOptimizeCnec {
                cnec: cnec.id.clone(),
                side,
                bound: MarginBound::BelowThreshold,
            };
            let lb = if sensitivity >= 0.0 {
                min_flow - max_setpoint * sensitivity
            } else {
                min_flow - min_setpoint * sensitivity
            };
            let cons = if build {
                let cons = problem.add_constraint(id, lb, LinearProblem::infinity())?;
                problem.set_coefficient(cons, flow, 1.0);
                problem.set_coefficient(cons, binary, big_m);
                cons
            } else {
                let cons = problem.get_constraint(&id)?;
                problem.set_constraint_bounds(cons, lb, LinearProblem::infinity());
                cons
            };
            problem.set_coefficient(cons, set_point, -sensitivity);
        }
        if let Some(max_flow) = cnec.max_flow_mw(side) {
            let id = ConstraintId::DontOptimizeCnec {
                cnec: cnec.id.clone(),
                side,
                bound: MarginBound::AboveThreshold,
            };
            let lb = if sensitivity >= 0.0 {
                -max_flow + min_setpoint * sensitivity
            } else {
                -max_flow + max_setpoint * sensitivity
            };
            let cons = if build {
                let cons = problem.add_constraint(id, lb, LinearProblem::infinity())?;
                problem.set_coefficient(cons, flow, -1.0);
                problem.set_coefficient(cons, binary, big_m);
                cons
            } else {
                let cons = problem.get_constraint(&id)?;
                problem.set_constraint_bounds(cons, lb, LinearProblem::infinity());
                cons
            };
            problem.set_coefficient(cons, set_point, sensitivity);
        }
        Ok(())
    }

    /// Relax the existing minimum-margin constraints of the selected sides:
    /// with the binary at 0 the margin variable is free of them.
    fn relax_minimum_margin_constraints(
        &self,
        problem: &mut LinearProblem,
        cnec: &FlowCnec,
        side: Side,
        binary: VarRef,
        big_m: f64,
    ) {
        for bound in [MarginBound::BelowThreshold, MarginBound::AboveThreshold] {
            let ids = [
                ConstraintId::MinimumMargin { cnec: cnec.id.clone(), side, bound },
                ConstraintId::MinimumRelativeMargin { cnec: cnec.id.clone(), side, bound },
            ];
            for id in ids {
                // absent when no margin filler covers this side
                let Some(cons) = problem.find_constraint(&id) else { continue };
                let lb = problem.constraint_lb(cons);
                let ub = problem.constraint_ub(cons);
                // tight again once the binary is 1
                problem.set_coefficient(cons, binary, big_m);
                problem.set_constraint_bounds(cons, lb, ub + big_m);
            }
        }
    }
}

impl ProblemFiller for UnoptimizedCnecFiller {
    fn fill(&self, problem: &mut LinearProblem, inputs: &FillerInputs<'_>) -> RaoResult<()> {
        let cnecs = self.selected_cnecs();
        if cnecs.is_empty() {
            return Ok(());
        }
        let highest_threshold = Self::highest_threshold(&cnecs);
        let rule_big_m = 20.0 * highest_threshold;
        let margin_big_m = 2.0 * highest_threshold;

        for cnec in &cnecs {
            for side in cnec.monitored_sides() {
                let Some(flow) =
                    problem.find_variable(&VariableId::Flow { cnec: cnec.id.clone(), side })
                else {
                    continue;
                };
                if self.secured_by_action() && self.securing_action(cnec).is_none() {
                    continue;
                }
                let binary = problem.add_binary_variable(VariableId::OptimizeCnecBinary {
                    cnec: cnec.id.clone(),
                    side,
                })?;
                if self.secured_by_action() {
                    self.build_securing_action_constraints(
                        problem, inputs, cnec, side, flow, binary, rule_big_m, true,
                    )?;
                } else {
                    self.build_margin_decrease_constraints(
                        problem, cnec, side, flow, binary, rule_big_m,
                    )?;
                }
                self.relax_minimum_margin_constraints(problem, cnec, side, binary, margin_big_m);
            }
        }
        Ok(())
    }

    fn update_between_sensi_iteration(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        _iteration: usize,
    ) -> RaoResult<()> {
        // the margin-decrease rule is anchored on the initial flows; only
        // the securing-action constraints follow the sensitivities
        if !self.secured_by_action() {
            return Ok(());
        }
        let cnecs = self.selected_cnecs();
        let rule_big_m = 20.0 * Self::highest_threshold(&cnecs);
        for cnec in &cnecs {
            for side in cnec.monitored_sides() {
                let Some(binary) = problem.find_variable(&VariableId::OptimizeCnecBinary {
                    cnec: cnec.id.clone(),
                    side,
                }) else {
                    continue;
                };
                let flow =
                    problem.get_variable(&VariableId::Flow { cnec: cnec.id.clone(), side })?;
                self.build_securing_action_constraints(
                    problem, inputs, cnec, side, flow, binary, rule_big_m, false,
                )?;
            }
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
