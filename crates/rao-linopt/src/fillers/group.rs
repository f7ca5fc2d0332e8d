//! Alignment of ganged range actions.
//!
//! Actions declared in the same group must move together. Each group gets a
//! lazily created virtual variable per state (a shared setpoint in the
//! continuous model, a shared integer tap in the discrete model) and every
//! member is tied to it by an equality constraint. The group variables are
//! only created for states that actually carry a member.

use crate::filler::{FillerInputs, ProblemFiller};
use crate::inputs::OptimizationContext;
use crate::problem::{ConstraintId, LinearProblem, VarRef, VariableId};
use rao_core::{ActivationSnapshot, GroupId, RaoResult, State};
use std::sync::Arc;

/// Ties the continuous setpoint of every grouped action to its group's
/// virtual setpoint. Must run after the core filler.
pub struct ContinuousGroupFiller {
    context: Arc<OptimizationContext>,
}

impl ContinuousGroupFiller {
    pub fn new(context: Arc<OptimizationContext>) -> Self {
        ContinuousGroupFiller { context }
    }

    fn group_set_point(
        problem: &mut LinearProblem,
        group: &GroupId,
        state: &State,
    ) -> RaoResult<VarRef> {
        let id = VariableId::GroupSetPoint { group: group.clone(), state: state.clone() };
        match problem.find_variable(&id) {
            Some(var) => Ok(var),
            None => problem.add_variable(id, -LinearProblem::infinity(), LinearProblem::infinity()),
        }
    }
}

impl ProblemFiller for ContinuousGroupFiller {
    fn fill(&self, problem: &mut LinearProblem, _inputs: &FillerInputs<'_>) -> RaoResult<()> {
        for (state, actions) in self.context.actions_per_state() {
            for action in actions {
                let Some(group) = &action.group else { continue };
                let group_var = Self::group_set_point(problem, group, state)?;
                let set_point = problem.get_variable(&VariableId::SetPoint {
                    action: action.id.clone(),
                    state: state.clone(),
                })?;
                let cons = problem.add_constraint(
                    ConstraintId::GroupSetPointEquality {
                        action: action.id.clone(),
                        state: state.clone(),
                    },
                    0.0,
                    0.0,
                )?;
                problem.set_coefficient(cons, set_point, 1.0);
                problem.set_coefficient(cons, group_var, -1.0);
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

/// Ties the integer tap of every grouped PST to its group's virtual tap.
/// Must run after the discrete tap filler. The group tap bounds are the
/// intersection of the member bounds, so an infeasible gang is caught by
/// the solver rather than silently split.
pub struct DiscreteGroupFiller {
    context: Arc<OptimizationContext>,
}

impl DiscreteGroupFiller {
    pub fn new(context: Arc<OptimizationContext>) -> Self {
        DiscreteGroupFiller { context }
    }
}

impl ProblemFiller for DiscreteGroupFiller {
    fn fill(&self, problem: &mut LinearProblem, _inputs: &FillerInputs<'_>) -> RaoResult<()> {
        for (state, actions) in self.context.actions_per_state() {
            for action in actions {
                if !action.is_pst() {
                    continue;
                }
                let Some(group) = &action.group else { continue };
                let tap = problem.get_variable(&VariableId::Tap {
                    action: action.id.clone(),
                    state: state.clone(),
                })?;
                let (member_lb, member_ub) =
                    (problem.variable_lb(tap), problem.variable_ub(tap));

                let id = VariableId::GroupTap { group: group.clone(), state: state.clone() };
                let group_var = match problem.find_variable(&id) {
                    Some(var) => {
                        let lb = problem.variable_lb(var).max(member_lb);
                        let ub = problem.variable_ub(var).min(member_ub);
                        problem.set_variable_bounds(var, lb, ub);
                        var
                    }
                    None => problem.add_integer_variable(id, member_lb, member_ub)?,
                };
                let cons = problem.add_constraint(
                    ConstraintId::GroupTapEquality {
                        action: action.id.clone(),
                        state: state.clone(),
                    },
                    0.0,
                    0.0,
                )?;
                problem.set_coefficient(cons, tap, 1.0);
                problem.set_coefficient(cons, group_var, -1.0);
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
