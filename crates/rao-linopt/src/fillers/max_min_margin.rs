//! Max-min margin objective.
//!
//! Introduces the shared minimum-margin variable and, for every optimized
//! monitored side, one constraint per physical threshold forcing the
//! variable under that side's margin. Maximizing the minimum margin is
//! expressed as a `-1` objective coefficient in the minimization.
//!
//! Margins are computed in each threshold's own unit; the unit multiplier
//! converts the margin variable into megawatts inside the flow constraint.

use crate::filler::{FillerInputs, ProblemFiller};
use crate::inputs::OptimizationContext;
use crate::problem::{ConstraintId, LinearProblem, MarginBound, VariableId};
use rao_core::{ActivationSnapshot, RaoResult};
use std::sync::Arc;

/// Absolute margin objective filler. Must run after the core filler.
pub struct MaxMinMarginFiller {
    context: Arc<OptimizationContext>,
}

impl MaxMinMarginFiller {
    pub fn new(context: Arc<OptimizationContext>) -> Self {
        MaxMinMarginFiller { context }
    }
}

impl ProblemFiller for MaxMinMarginFiller {
    fn fill(&self, problem: &mut LinearProblem, _inputs: &FillerInputs<'_>) -> RaoResult<()> {
        let margin = problem.add_variable(
            VariableId::MinimumMargin,
            -LinearProblem::infinity(),
            LinearProblem::infinity(),
        )?;

        for cnec in self.context.cnecs() {
            if !cnec.optimized {
                continue;
            }
            for side in cnec.monitored_sides() {
                // absent when the side was invalid at build time
                let Some(flow) =
                    problem.find_variable(&VariableId::Flow { cnec: cnec.id.clone(), side })
                else {
                    continue;
                };
                let unit_multiplier = cnec.unit_multiplier(side);

                if let Some(max_flow) = cnec.max_flow_mw(side) {
                    // flow + mult·MM ≤ maxFlow
                    let cons = problem.add_constraint(
                        ConstraintId::MinimumMargin {
                            cnec: cnec.id.clone(),
                            side,
                            bound: MarginBound::AboveThreshold,
                        },
                        -LinearProblem::infinity(),
                        max_flow,
                    )?;
                    problem.set_coefficient(cons, flow, 1.0);
                    problem.set_coefficient(cons, margin, unit_multiplier);
                }
                if let Some(min_flow) = cnec.min_flow_mw(side) {
                    // -flow + mult·MM ≤ -minFlow
                    let cons = problem.add_constraint(
                        ConstraintId::MinimumMargin {
                            cnec: cnec.id.clone(),
                            side,
                            bound: MarginBound::BelowThreshold,
                        },
                        -LinearProblem::infinity(),
                        -min_flow,
                    )?;
                    problem.set_coefficient(cons, flow, -1.0);
                    problem.set_coefficient(cons, margin, unit_multiplier);
                }
            }
        }

        problem.set_objective_coefficient(margin, -1.0);
        Ok(())
    }

    fn update_between_sensi_iteration(
        &self,
        _problem: &mut LinearProblem,
        _inputs: &FillerInputs<'_>,
        _iteration: usize,
    ) -> RaoResult<()> {
        // thresholds and unit multipliers are static
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
