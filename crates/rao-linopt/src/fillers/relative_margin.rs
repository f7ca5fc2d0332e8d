//! Max-min relative margin objective.
//!
//! Extends the absolute margin objective with a PTDF-scaled margin that
//! only counts once the network is secure. A big-M sign binary switches
//! between the two regimes: while the minimum absolute margin is negative
//! the relative margin is forced to zero, and once it is positive the
//! absolute margin is capped so the relative one drives the objective.
//!
//! Must run after [`MaxMinMarginFiller`](super::max_min_margin::MaxMinMarginFiller),
//! whose minimum-margin variable and constraints it builds upon.

use crate::filler::{FillerInputs, ProblemFiller};
use crate::inputs::OptimizationContext;
use crate::parameters::RelativeMarginParameters;
use crate::problem::{ConstraintId, LinearProblem, MarginBound, VariableId};
use rao_core::{ActivationSnapshot, FlowCnec, RaoResult, Side};
use std::sync::Arc;

/// Relative margin objective filler.
pub struct MaxMinRelativeMarginFiller {
    context: Arc<OptimizationContext>,
    parameters: RelativeMarginParameters,
}

impl MaxMinRelativeMarginFiller {
    pub fn new(context: Arc<OptimizationContext>, parameters: RelativeMarginParameters) -> Self {
        MaxMinRelativeMarginFiller { context, parameters }
    }

    /// Twice the highest threshold over all monitored sides, in megawatts.
    /// Large enough to dominate any reachable margin.
    fn big_m(&self) -> f64 {
        let mut highest = 0.0_f64;
        for cnec in self.context.cnecs() {
            for side in cnec.monitored_sides() {
                if let Some(max_flow) = cnec.max_flow_mw(side) {
                    highest = highest.max(max_flow.abs());
                }
                if let Some(min_flow) = cnec.min_flow_mw(side) {
                    highest = highest.max(min_flow.abs());
                }
            }
        }
        2.0 * highest
    }

    /// PTDF-scaled margin coefficient of one side: the unit multiplier
    /// times the zonal PTDF sum, floored to avoid division blow-up on
    /// weakly exposed elements.
    fn margin_coefficient(
        &self,
        inputs: &FillerInputs<'_>,
        cnec: &FlowCnec,
        side: Side,
    ) -> f64 {
        let ptdf_sum = inputs.sensitivities.ptdf_zonal_sum(&cnec.id, side);
        let scaled = if ptdf_sum.is_finite() {
            ptdf_sum.abs().max(self.parameters.ptdf_sum_lower_bound)
        } else {
            self.parameters.ptdf_sum_lower_bound
        };
        cnec.unit_multiplier(side) * scaled
    }

    fn fill_margin_constraints(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        build: bool,
    ) -> RaoResult<()> {
        let relative_margin = problem.get_variable(&VariableId::MinimumRelativeMargin)?;
        for cnec in self.context.cnecs() {
            if !cnec.optimized {
                continue;
            }
            for side in cnec.monitored_sides() {
                let Some(flow) =
                    problem.find_variable(&VariableId::Flow { cnec: cnec.id.clone(), side })
                else {
                    continue;
                };
                let coefficient = self.margin_coefficient(inputs, cnec, side);

                if let Some(max_flow) = cnec.max_flow_mw(side) {
                    let id = ConstraintId::MinimumRelativeMargin {
                        cnec: cnec.id.clone(),
                        side,
                        bound: MarginBound::AboveThreshold,
                    };
                    let cons = if build {
                        let cons = problem.add_constraint(
                            id,
                            -LinearProblem::infinity(),
                            max_flow,
                        )?;
                        problem.set_coefficient(cons, flow, 1.0);
                        cons
                    } else {
                        problem.get_constraint(&id)?
                    };
                    problem.set_coefficient(cons, relative_margin, coefficient);
                }
                if let Some(min_flow) = cnec.min_flow_mw(side) {
                    let id = ConstraintId::MinimumRelativeMargin {
                        cnec: cnec.id.clone(),
                        side,
                        bound: MarginBound::BelowThreshold,
                    };
                    let cons = if build {
                        let cons = problem.add_constraint(
                            id,
                            -LinearProblem::infinity(),
                            -min_flow,
                        )?;
                        problem.set_coefficient(cons, flow, -1.0);
                        cons
                    } else {
                        problem.get_constraint(&id)?
                    };
                    problem.set_coefficient(cons, relative_margin, coefficient);
                }
            }
        }
        Ok(())
    }
}

impl ProblemFiller for MaxMinRelativeMarginFiller {
    fn fill(&self, problem: &mut LinearProblem, inputs: &FillerInputs<'_>) -> RaoResult<()> {
        let relative_margin = problem.add_variable(
            VariableId::MinimumRelativeMargin,
            0.0,
            LinearProblem::infinity(),
        )?;
        let sign = problem.add_binary_variable(VariableId::MarginSignBinary)?;
        let margin = problem.get_variable(&VariableId::MinimumMargin)?;

        let big_m = self.big_m();
        // MM + M·b ≤ M: b = 1 caps the absolute margin at zero
        let sign_definition = problem.add_constraint(
            ConstraintId::MarginSignDefinition,
            -LinearProblem::infinity(),
            big_m,
        )?;
        problem.set_coefficient(sign_definition, margin, 1.0);
        problem.set_coefficient(sign_definition, sign, big_m);
        // RM - M·b ≤ 0: b = 0 forces the relative margin to zero
        let zero_guard = problem.add_constraint(
            ConstraintId::RelativeMarginSetToZero,
            -LinearProblem::infinity(),
            0.0,
        )?;
        problem.set_coefficient(zero_guard, relative_margin, 1.0);
        problem.set_coefficient(zero_guard, sign, -big_m);

        self.fill_margin_constraints(problem, inputs, true)?;
        problem.set_objective_coefficient(relative_margin, -1.0);
        Ok(())
    }

    fn update_between_sensi_iteration(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        _iteration: usize,
    ) -> RaoResult<()> {
        // PTDF sums move with each sensitivity computation
        self.fill_margin_constraints(problem, inputs, false)
    }

    fn update_between_mip_iteration(
        &self,
        _problem: &mut LinearProblem,
        _activations: &ActivationSnapshot,
    ) -> RaoResult<()> {
        Ok(())
    }
}
