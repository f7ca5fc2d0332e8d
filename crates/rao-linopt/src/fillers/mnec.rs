//! Soft flow bounds on monitored network elements.
//!
//! Monitored elements do not enter the margin objective; instead their flow
//! is kept inside an adjusted corridor by a pair of soft constraints with a
//! shared non-negative violation variable, priced in the objective. The
//! corridor widens to the pre-optimization flow minus the acceptable margin
//! decrease when the element was already overloaded, so the optimizer is
//! never asked to fix what it did not break.

use crate::filler::{FillerInputs, ProblemFiller};
use crate::inputs::OptimizationContext;
use crate::parameters::MnecParameters;
use crate::problem::{BoundDirection, ConstraintId, LinearProblem, VariableId};
use rao_core::{ActivationSnapshot, RaoResult, SensitivitySnapshot};
use std::sync::Arc;

/// MNEC filler. Must run after the core filler.
pub struct MnecFiller {
    context: Arc<OptimizationContext>,
    parameters: MnecParameters,
    /// Flows before any optimization, fixed for the whole run.
    initial_flows: SensitivitySnapshot,
}

impl MnecFiller {
    pub fn new(
        context: Arc<OptimizationContext>,
        parameters: MnecParameters,
        initial_flows: SensitivitySnapshot,
    ) -> Self {
        MnecFiller { context, parameters, initial_flows }
    }
}

impl ProblemFiller for MnecFiller {
    fn fill(&self, problem: &mut LinearProblem, _inputs: &FillerInputs<'_>) -> RaoResult<()> {
        for cnec in self.context.cnecs() {
            if !cnec.monitored {
                continue;
            }
            let side_count = cnec.monitored_sides().count().max(1);
            for side in cnec.monitored_sides() {
                let Some(flow) =
                    problem.find_variable(&VariableId::Flow { cnec: cnec.id.clone(), side })
                else {
                    continue;
                };
                let initial_flow = self.initial_flows.flow(&cnec.id, side);
                let decrease = self.parameters.acceptable_margin_decrease;
                let adjustment = self.parameters.constraint_adjustment_coefficient;

                let violation = problem.add_variable(
                    VariableId::MnecViolation { cnec: cnec.id.clone(), side },
                    0.0,
                    LinearProblem::infinity(),
                )?;
                problem.set_objective_coefficient(
                    violation,
                    self.parameters.violation_cost / side_count as f64,
                );

                if let Some(max_flow) = cnec.max_flow_mw(side) {
                    // floored at the initial flow: the adjustment must not
                    // push the pre-optimization point outside the corridor
                    let ub = (max_flow.max(initial_flow + decrease) - adjustment)
                        .max(initial_flow);
                    // F - V ≤ ub
                    let cons = problem.add_constraint(
                        ConstraintId::MnecFlow {
                            cnec: cnec.id.clone(),
                            side,
                            bound: BoundDirection::Upper,
                        },
                        -LinearProblem::infinity(),
                        ub,
                    )?;
                    problem.set_coefficient(cons, flow, 1.0);
                    problem.set_coefficient(cons, violation, -1.0);
                }
                if let Some(min_flow) = cnec.min_flow_mw(side) {
                    let lb = (min_flow.min(initial_flow - decrease) + adjustment)
                        .min(initial_flow);
                    // F + V ≥ lb
                    let cons = problem.add_constraint(
                        ConstraintId::MnecFlow {
                            cnec: cnec.id.clone(),
                            side,
                            bound: BoundDirection::Lower,
                        },
                        lb,
                        LinearProblem::infinity(),
                    )?;
                    problem.set_coefficient(cons, flow, 1.0);
                    problem.set_coefficient(cons, violation, 1.0);
                }
            }
        }
        Ok(())
    }

    fn update_between_sensi_iteration(
        &self,
        _problem: &mut LinearProblem,
        _inputs: &FillerInputs<'_>,
        _iteration: usize,
    ) -> RaoResult<()> {
        // the corridor is anchored on the initial flows, not the iterates
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
