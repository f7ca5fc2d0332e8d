//! Soft loop-flow bounds.
//!
//! Elements under loop-flow control keep their loop flow (physical flow
//! minus commercial flow) inside a symmetric corridor. The corridor half
//! width is the loop-flow threshold, relaxed to the initial loop flow plus
//! the acceptable increase when the element already exceeded it, and it is
//! re-centered on the commercial flow of each sensitivity iteration. A
//! non-negative violation variable softens both sides.

use crate::filler::{FillerInputs, ProblemFiller};
use crate::inputs::OptimizationContext;
use crate::parameters::LoopFlowParameters;
use crate::problem::{BoundDirection, ConstraintId, LinearProblem, VariableId};
use rao_core::{ActivationSnapshot, FlowCnec, RaoResult, SensitivitySnapshot, Side};
use std::sync::Arc;

/// Tolerance added to both corridor bounds against commercial-flow noise.
const LOOP_FLOW_EPSILON: f64 = 0.01;

/// Loop-flow filler. Must run after the core filler.
pub struct LoopFlowFiller {
    context: Arc<OptimizationContext>,
    parameters: LoopFlowParameters,
    /// Loop flows before any optimization, fixed for the whole run.
    initial_flows: SensitivitySnapshot,
}

impl LoopFlowFiller {
    pub fn new(
        context: Arc<OptimizationContext>,
        parameters: LoopFlowParameters,
        initial_flows: SensitivitySnapshot,
    ) -> Self {
        LoopFlowFiller { context, parameters, initial_flows }
    }

    /// Corridor half width of one side, floored at the initial loop flow so
    /// the pre-optimization point stays feasible whatever the adjustment
    /// coefficient.
    fn corridor_half_width(&self, cnec: &FlowCnec, side: Side, threshold: f64) -> f64 {
        let initial = self.initial_flows.loop_flow(&cnec.id, side);
        if !initial.is_finite() {
            return (threshold - self.parameters.constraint_adjustment_coefficient).max(0.0);
        }
        let relaxed = threshold.max(initial.abs() + self.parameters.acceptable_increase);
        (relaxed - self.parameters.constraint_adjustment_coefficient).max(initial.abs())
    }

    fn fill_constraints(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        build: bool,
    ) -> RaoResult<()> {
        for cnec in self.context.cnecs() {
            let Some(threshold) = cnec.loop_flow_threshold_mw else { continue };
            let side_count = cnec.monitored_sides().count().max(1);
            for side in cnec.monitored_sides() {
                let Some(flow) =
                    problem.find_variable(&VariableId::Flow { cnec: cnec.id.clone(), side })
                else {
                    continue;
                };
                let half_width = self.corridor_half_width(cnec, side, threshold);
                let commercial = inputs.sensitivities.commercial_flow(&cnec.id, side);
                if !commercial.is_finite() {
                    continue;
                }
                let upper_id = ConstraintId::MaxLoopFlow {
                    cnec: cnec.id.clone(),
                    side,
                    bound: BoundDirection::Upper,
                };
                let lower_id = ConstraintId::MaxLoopFlow {
                    cnec: cnec.id.clone(),
                    side,
                    bound: BoundDirection::Lower,
                };
                let ub = half_width + commercial + LOOP_FLOW_EPSILON;
                let lb = -half_width + commercial - LOOP_FLOW_EPSILON;
                if build {
                    let violation = problem.add_variable(
                        VariableId::LoopflowViolation { cnec: cnec.id.clone(), side },
                        0.0,
                        LinearProblem::infinity(),
                    )?;
                    problem.set_objective_coefficient(
                        violation,
                        self.parameters.violation_cost / side_count as f64,
                    );
                    // F - V ≤ halfWidth + commercial + ε
                    let upper = problem.add_constraint(
                        upper_id,
                        -LinearProblem::infinity(),
                        ub,
                    )?;
                    problem.set_coefficient(upper, flow, 1.0);
                    problem.set_coefficient(upper, violation, -1.0);
                    // F + V ≥ -halfWidth + commercial - ε
                    let lower =
                        problem.add_constraint(lower_id, lb, LinearProblem::infinity())?;
                    problem.set_coefficient(lower, flow, 1.0);
                    problem.set_coefficient(lower, violation, 1.0);
                } else {
                    if let Some(upper) = problem.find_constraint(&upper_id) {
                        problem.set_constraint_bounds(
                            upper,
                            -LinearProblem::infinity(),
                            ub,
                        );
                    }
                    if let Some(lower) = problem.find_constraint(&lower_id) {
                        problem.set_constraint_bounds(lower, lb, LinearProblem::infinity());
                    }
                }
            }
        }
        Ok(())
    }
}

impl ProblemFiller for LoopFlowFiller {
    fn fill(&self, problem: &mut LinearProblem, inputs: &FillerInputs<'_>) -> RaoResult<()> {
        self.fill_constraints(problem, inputs, true)
    }

    fn update_between_sensi_iteration(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        _iteration: usize,
    ) -> RaoResult<()> {
        // commercial flows move with each sensitivity computation
        self.fill_constraints(problem, inputs, false)
    }

    fn update_between_mip_iteration(
        &self,
        _problem: &mut LinearProblem,
        _activations: &ActivationSnapshot,
    ) -> RaoResult<()> {
        Ok(())
    }
}
