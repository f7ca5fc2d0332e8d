//! Discrete tap optimization of phase-shifting transformers.
//!
//! Layers an integer tap model on top of the continuous setpoint variable:
//! non-negative integer tap variations in both directions, direction
//! binaries forbidding simultaneous up-and-down movement, a two-slope
//! tap-to-angle conversion tying the setpoint to the tap moves, and an
//! integer tap variable for the downstream group and usage-limit fillers.
//!
//! The conversion is a local linearization around the current tap: built
//! with the average slopes over the admissible range, then recalibrated to
//! the one-tap slopes around the latest optimum between solver runs.

use crate::filler::{FillerInputs, ProblemFiller};
use crate::inputs::OptimizationContext;
use crate::problem::{
    ConstraintId, LinearProblem, VariableId, VariationDirection,
};
use rao_core::{
    ActivationSnapshot, PstData, RangeAction, RaoError, RaoResult, State,
};
use std::sync::Arc;

/// Discrete tap filler. Must run after the core filler (it references the
/// continuous setpoint variables).
pub struct DiscretePstFiller {
    context: Arc<OptimizationContext>,
}

impl DiscretePstFiller {
    pub fn new(context: Arc<OptimizationContext>) -> Self {
        DiscretePstFiller { context }
    }

    fn psts(&self) -> impl Iterator<Item = (&State, &RangeAction, &PstData)> {
        self.context
            .actions_per_state()
            .iter()
            .flat_map(|(state, actions)| actions.iter().map(move |a| (state, a)))
            .filter_map(|(state, action)| action.pst().map(|pst| (state, action, pst)))
    }

    /// Admissible tap interval, anchored on the initial-network tap and
    /// therefore constant across iterations.
    fn admissible_taps(&self, action: &RangeAction, pst: &PstData) -> RaoResult<(i32, i32)> {
        let initial_tap = self.context.initial_tap(&action.id)?;
        pst.admissible_tap_interval(initial_tap)
    }

    fn current_tap(
        activations: &ActivationSnapshot,
        action: &RangeAction,
        state: &State,
    ) -> RaoResult<i32> {
        activations
            .tap(&action.id, state)
            .ok_or_else(|| RaoError::data(format!("no known tap for {}", action.id)))
    }

    fn build_action(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        state: &State,
        action: &RangeAction,
        pst: &PstData,
    ) -> RaoResult<()> {
        let (min_adm, max_adm) = self.admissible_taps(action, pst)?;
        let tap = Self::current_tap(inputs.activations, action, state)?;
        let max_up = i64::from((max_adm - tap).max(0));
        let max_down = i64::from((tap - min_adm).max(0));

        let up = problem.add_integer_variable(
            VariableId::TapVariation {
                action: action.id.clone(),
                state: state.clone(),
                direction: VariationDirection::Upward,
            },
            0.0,
            max_up as f64,
        )?;
        let down = problem.add_integer_variable(
            VariableId::TapVariation {
                action: action.id.clone(),
                state: state.clone(),
                direction: VariationDirection::Downward,
            },
            0.0,
            max_down as f64,
        )?;
        let up_binary = problem.add_binary_variable(VariableId::TapVariationBinary {
            action: action.id.clone(),
            state: state.clone(),
            direction: VariationDirection::Upward,
        })?;
        let down_binary = problem.add_binary_variable(VariableId::TapVariationBinary {
            action: action.id.clone(),
            state: state.clone(),
            direction: VariationDirection::Downward,
        })?;
        let tap_var = problem.add_integer_variable(
            VariableId::Tap { action: action.id.clone(), state: state.clone() },
            f64::from(min_adm),
            f64::from(max_adm),
        )?;

        // S = angle(tap) + slopeUp·ΔT⁺ - slopeDown·ΔT⁻, average slopes over
        // the admissible range until the first recalibration
        let angle = pst.angle(tap)?;
        let slope_up = if max_adm > tap {
            (pst.angle(max_adm)? - angle) / f64::from(max_adm - tap)
        } else {
            0.0
        };
        let slope_down = if tap > min_adm {
            (angle - pst.angle(min_adm)?) / f64::from(tap - min_adm)
        } else {
            0.0
        };
        let conversion = problem.add_constraint(
            ConstraintId::TapToAngleConversion {
                action: action.id.clone(),
                state: state.clone(),
            },
            angle,
            angle,
        )?;
        let set_point = problem.get_variable(&VariableId::SetPoint {
            action: action.id.clone(),
            state: state.clone(),
        })?;
        problem.set_coefficient(conversion, set_point, 1.0);
        problem.set_coefficient(conversion, up, -slope_up);
        problem.set_coefficient(conversion, down, slope_down);

        // b⁺ + b⁻ ≤ 1
        let exclusive = problem.add_constraint(
            ConstraintId::UpOrDownVariation { action: action.id.clone(), state: state.clone() },
            -LinearProblem::infinity(),
            1.0,
        )?;
        problem.set_coefficient(exclusive, up_binary, 1.0);
        problem.set_coefficient(exclusive, down_binary, 1.0);

        // ΔT± ≤ max±·b±
        let authorize_up = problem.add_constraint(
            ConstraintId::TapVariationAuthorization {
                action: action.id.clone(),
                state: state.clone(),
                direction: VariationDirection::Upward,
            },
            -LinearProblem::infinity(),
            0.0,
        )?;
        problem.set_coefficient(authorize_up, up, 1.0);
        problem.set_coefficient(authorize_up, up_binary, -(max_up as f64));
        let authorize_down = problem.add_constraint(
            ConstraintId::TapVariationAuthorization {
                action: action.id.clone(),
                state: state.clone(),
                direction: VariationDirection::Downward,
            },
            -LinearProblem::infinity(),
            0.0,
        )?;
        problem.set_coefficient(authorize_down, down, 1.0);
        problem.set_coefficient(authorize_down, down_binary, -(max_down as f64));

        // T - ΔT⁺ + ΔT⁻ = currentTap
        let tap_value = problem.add_constraint(
            ConstraintId::TapValue { action: action.id.clone(), state: state.clone() },
            f64::from(tap),
            f64::from(tap),
        )?;
        problem.set_coefficient(tap_value, tap_var, 1.0);
        problem.set_coefficient(tap_value, up, -1.0);
        problem.set_coefficient(tap_value, down, 1.0);

        self.fill_relative_tap_constraint(problem, inputs.activations, state, action, pst, true)?;
        Ok(())
    }

    /// Relative tap bounds against the previous-instant occurrence,
    /// expressed on the variation variables of both occurrences:
    /// `(ΔT⁺ - ΔT⁻) - (ΔT⁺_prev - ΔT⁻_prev) ∈ [lo, hi] + (τ_prev - τ)`.
    fn fill_relative_tap_constraint(
        &self,
        problem: &mut LinearProblem,
        activations: &ActivationSnapshot,
        state: &State,
        action: &RangeAction,
        pst: &PstData,
        build: bool,
    ) -> RaoResult<()> {
        let Some((lo, hi)) = pst.relative_tap_interval() else {
            return Ok(());
        };
        let Some((prev_state, prev_action)) = self.context.previous_occurrence(action, state)
        else {
            return Ok(());
        };
        let tap = Self::current_tap(activations, action, state)?;
        let prev_tap = Self::current_tap(activations, prev_action, prev_state)?;
        let shift = f64::from(prev_tap - tap);
        let id = ConstraintId::RelativeTap { action: action.id.clone(), state: state.clone() };
        if build {
            let cons =
                problem.add_constraint(id, f64::from(lo) + shift, f64::from(hi) + shift)?;
            for (target_action, target_state, sign) in [
                (action, state, 1.0),
                (prev_action, prev_state, -1.0),
            ] {
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
        } else {
            let cons = problem.get_constraint(&id)?;
            problem.set_constraint_bounds(cons, f64::from(lo) + shift, f64::from(hi) + shift);
        }
        Ok(())
    }

    /// Re-center the tap model on the latest optimum: variation bounds,
    /// authorization big-Ms, tap-value anchor, and one-tap conversion
    /// slopes (a direction at the range edge keeps its previous slope, its
    /// variation is pinned to zero anyway).
    fn refresh(
        &self,
        problem: &mut LinearProblem,
        activations: &ActivationSnapshot,
    ) -> RaoResult<()> {
        for (state, action, pst) in self.psts() {
            let (min_adm, max_adm) = self.admissible_taps(action, pst)?;
            let tap = Self::current_tap(activations, action, state)?;
            let max_up = f64::from((max_adm - tap).max(0));
            let max_down = f64::from((tap - min_adm).max(0));

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
            problem.set_variable_bounds(up, 0.0, max_up);
            problem.set_variable_bounds(down, 0.0, max_down);

            let authorize_up = problem.get_constraint(&ConstraintId::TapVariationAuthorization {
                action: action.id.clone(),
                state: state.clone(),
                direction: VariationDirection::Upward,
            })?;
            let up_binary = problem.get_variable(&VariableId::TapVariationBinary {
                action: action.id.clone(),
                state: state.clone(),
                direction: VariationDirection::Upward,
            })?;
            problem.set_coefficient(authorize_up, up_binary, -max_up);
            let authorize_down =
                problem.get_constraint(&ConstraintId::TapVariationAuthorization {
                    action: action.id.clone(),
                    state: state.clone(),
                    direction: VariationDirection::Downward,
                })?;
            let down_binary = problem.get_variable(&VariableId::TapVariationBinary {
                action: action.id.clone(),
                state: state.clone(),
                direction: VariationDirection::Downward,
            })?;
            problem.set_coefficient(authorize_down, down_binary, -max_down);

            let angle = pst.angle(tap)?;
            let conversion = problem.get_constraint(&ConstraintId::TapToAngleConversion {
                action: action.id.clone(),
                state: state.clone(),
            })?;
            problem.set_constraint_bounds(conversion, angle, angle);
            if tap < max_adm {
                let slope_up = pst.angle(tap + 1)? - angle;
                problem.set_coefficient(conversion, up, -slope_up);
            }
            if tap > min_adm {
                let slope_down = angle - pst.angle(tap - 1)?;
                problem.set_coefficient(conversion, down, slope_down);
            }

            let tap_value = problem.get_constraint(&ConstraintId::TapValue {
                action: action.id.clone(),
                state: state.clone(),
            })?;
            problem.set_constraint_bounds(tap_value, f64::from(tap), f64::from(tap));

            self.fill_relative_tap_constraint(problem, activations, state, action, pst, false)?;
        }
        Ok(())
    }
}

impl ProblemFiller for DiscretePstFiller {
    fn fill(&self, problem: &mut LinearProblem, inputs: &FillerInputs<'_>) -> RaoResult<()> {
        for (state, action, pst) in self.psts() {
            self.build_action(problem, inputs, state, action, pst)?;
        }
        Ok(())
    }

    fn update_between_sensi_iteration(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        _iteration: usize,
    ) -> RaoResult<()> {
        self.refresh(problem, inputs.activations)
    }

    fn update_between_mip_iteration(
        &self,
        problem: &mut LinearProblem,
        activations: &ActivationSnapshot,
    ) -> RaoResult<()> {
        self.refresh(problem, activations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fillers::core::CoreProblemFiller;
    use crate::parameters::RangeActionParameters;
    use crate::testutil::{inputs, mw_cnec, pst_action, simple_context, uniform_pst_data};
    use rao_core::{
        ActionId, NetworkElementId, RangeActionKind, RangeType, SensitivitySnapshot,
        SetpointSnapshot, Side, TapRange,
    };
    use std::collections::BTreeMap;

    fn scenario() -> (Arc<OptimizationContext>, SensitivitySnapshot, SetpointSnapshot) {
        let cnec = mw_cnec("cnec1", -1000.0, 1000.0);
        let action = pst_action("pst1", uniform_pst_data(16, 0.25));
        let mut actions = BTreeMap::new();
        actions.insert(State::preventive(), vec![action]);

        let mut pre = SetpointSnapshot::new();
        pre.set_setpoint("pst1", 0.0);
        pre.set_tap("pst1", 0);

        let mut sensi = SensitivitySnapshot::new();
        sensi.set_flow("cnec1", Side::One, 500.0);
        sensi.set_sensitivity("pst1", "cnec1", Side::One, 25.0);

        (Arc::new(simple_context(vec![cnec], actions, pre.clone())), sensi, pre)
    }

    fn filled(
        ctx: &Arc<OptimizationContext>,
        sensi: &SensitivitySnapshot,
        activations: &ActivationSnapshot,
    ) -> LinearProblem {
        let mut problem = LinearProblem::new();
        let core = CoreProblemFiller::new(Arc::clone(ctx), RangeActionParameters::default());
        let discrete = DiscretePstFiller::new(Arc::clone(ctx));
        let io = inputs(sensi, activations);
        core.fill(&mut problem, &io).unwrap();
        discrete.fill(&mut problem, &io).unwrap();
        problem
    }

    #[test]
    fn test_tap_model_built_around_current_tap() {
        let (ctx, sensi, pre) = scenario();
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        let problem = filled(&ctx, &sensi, &activations);
        let state = State::preventive();

        let up = problem
            .get_variable(&VariableId::TapVariation {
                action: ActionId::from("pst1"),
                state: state.clone(),
                direction: VariationDirection::Upward,
            })
            .unwrap();
        assert_eq!(problem.variable_lb(up), 0.0);
        assert_eq!(problem.variable_ub(up), 16.0);

        let conversion = problem
            .get_constraint(&ConstraintId::TapToAngleConversion {
                action: ActionId::from("pst1"),
                state: state.clone(),
            })
            .unwrap();
        // tap 0 sits at angle 0; average slopes are 0.25°/tap both ways
        assert_eq!(problem.constraint_lb(conversion), 0.0);
        assert!((problem.coefficient(conversion, up) + 0.25).abs() < 1e-9);

        let tap_value = problem
            .get_constraint(&ConstraintId::TapValue {
                action: ActionId::from("pst1"),
                state: state.clone(),
            })
            .unwrap();
        assert_eq!(problem.constraint_lb(tap_value), 0.0);
        let tap_var = problem
            .get_variable(&VariableId::Tap { action: ActionId::from("pst1"), state })
            .unwrap();
        assert_eq!(problem.coefficient(tap_value, tap_var), 1.0);
        assert_eq!(problem.variable_lb(tap_var), -16.0);
        assert_eq!(problem.variable_ub(tap_var), 16.0);
    }

    #[test]
    fn test_direction_binaries_are_exclusive_and_authorizing() {
        let (ctx, sensi, pre) = scenario();
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        let problem = filled(&ctx, &sensi, &activations);
        let state = State::preventive();

        let exclusive = problem
            .get_constraint(&ConstraintId::UpOrDownVariation {
                action: ActionId::from("pst1"),
                state: state.clone(),
            })
            .unwrap();
        assert_eq!(problem.constraint_ub(exclusive), 1.0);

        let authorize_up = problem
            .get_constraint(&ConstraintId::TapVariationAuthorization {
                action: ActionId::from("pst1"),
                state: state.clone(),
                direction: VariationDirection::Upward,
            })
            .unwrap();
        let up_binary = problem
            .get_variable(&VariableId::TapVariationBinary {
                action: ActionId::from("pst1"),
                state,
                direction: VariationDirection::Upward,
            })
            .unwrap();
        assert_eq!(problem.coefficient(authorize_up, up_binary), -16.0);
        assert_eq!(problem.constraint_ub(authorize_up), 0.0);
    }

    #[test]
    fn test_mip_refresh_recenters_on_new_tap() {
        let (ctx, sensi, pre) = scenario();
        let mut activations = ActivationSnapshot::from_pre_perimeter(&pre);
        let mut problem = filled(&ctx, &sensi, &activations);
        let state = State::preventive();

        activations.set_tap("pst1", state.clone(), 10);
        activations.set_setpoint("pst1", state.clone(), 2.5);
        let discrete = DiscretePstFiller::new(Arc::clone(&ctx));
        discrete.update_between_mip_iteration(&mut problem, &activations).unwrap();

        let up = problem
            .get_variable(&VariableId::TapVariation {
                action: ActionId::from("pst1"),
                state: state.clone(),
                direction: VariationDirection::Upward,
            })
            .unwrap();
        let down = problem
            .get_variable(&VariableId::TapVariation {
                action: ActionId::from("pst1"),
                state: state.clone(),
                direction: VariationDirection::Downward,
            })
            .unwrap();
        assert_eq!(problem.variable_ub(up), 6.0);
        assert_eq!(problem.variable_ub(down), 26.0);

        let conversion = problem
            .get_constraint(&ConstraintId::TapToAngleConversion {
                action: ActionId::from("pst1"),
                state: state.clone(),
            })
            .unwrap();
        // anchored on angle(10) = 2.5°, one-tap slopes 0.25°/tap
        assert!((problem.constraint_lb(conversion) - 2.5).abs() < 1e-9);
        assert!((problem.coefficient(conversion, up) + 0.25).abs() < 1e-9);
        assert!((problem.coefficient(conversion, down) - 0.25).abs() < 1e-9);

        let tap_value = problem
            .get_constraint(&ConstraintId::TapValue { action: ActionId::from("pst1"), state })
            .unwrap();
        assert_eq!(problem.constraint_lb(tap_value), 10.0);
    }

    #[test]
    fn test_relative_tap_constraint_between_instants() {
        let preventive = State::preventive();
        let curative = State::post_contingency(rao_core::Instant::curative(0), "co1");

        let mut data = uniform_pst_data(16, 0.25);
        data.ranges.push(TapRange {
            min_tap: -2,
            max_tap: 2,
            range_type: RangeType::RelativeToPreviousInstant,
        });
        let mut prev_action = pst_action("pst_prev", uniform_pst_data(16, 0.25));
        let mut cur_action = pst_action("pst_cur", data);
        // same physical device declared on both instants
        let shared: std::collections::BTreeSet<NetworkElementId> =
            [NetworkElementId::from("pst_ne")].into_iter().collect();
        prev_action.network_elements = shared.clone();
        cur_action.network_elements = shared;

        let mut actions = BTreeMap::new();
        actions.insert(preventive.clone(), vec![prev_action]);
        actions.insert(curative.clone(), vec![cur_action]);

        let mut pre = SetpointSnapshot::new();
        for id in ["pst_prev", "pst_cur"] {
            pre.set_setpoint(id, 0.0);
            pre.set_tap(id, 0);
        }
        let mut cnec = mw_cnec("cnec1", -1000.0, 1000.0);
        cnec.state = curative.clone();
        let mut sensi = SensitivitySnapshot::new();
        sensi.set_flow("cnec1", Side::One, 500.0);

        let ctx = Arc::new(simple_context(vec![cnec], actions, pre.clone()));
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        let problem = filled(&ctx, &sensi, &activations);

        let relative = problem
            .get_constraint(&ConstraintId::RelativeTap {
                action: ActionId::from("pst_cur"),
                state: curative.clone(),
            })
            .unwrap();
        assert_eq!(problem.constraint_lb(relative), -2.0);
        assert_eq!(problem.constraint_ub(relative), 2.0);

        let cur_up = problem
            .get_variable(&VariableId::TapVariation {
                action: ActionId::from("pst_cur"),
                state: curative,
                direction: VariationDirection::Upward,
            })
            .unwrap();
        let prev_up = problem
            .get_variable(&VariableId::TapVariation {
                action: ActionId::from("pst_prev"),
                state: preventive,
                direction: VariationDirection::Upward,
            })
            .unwrap();
        assert_eq!(problem.coefficient(relative, cur_up), 1.0);
        assert_eq!(problem.coefficient(relative, prev_up), -1.0);
    }

    #[test]
    fn test_non_pst_actions_are_ignored() {
        let hvdc = crate::testutil::hvdc_action("hvdc1", -100.0, 100.0);
        assert!(matches!(hvdc.kind, RangeActionKind::Hvdc(_)));
        let mut actions = BTreeMap::new();
        actions.insert(State::preventive(), vec![hvdc]);
        let mut pre = SetpointSnapshot::new();
        pre.set_setpoint("hvdc1", 0.0);
        let ctx = Arc::new(simple_context(vec![], actions, pre.clone()));
        let sensi = SensitivitySnapshot::new();
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);

        let mut problem = LinearProblem::new();
        let core = CoreProblemFiller::new(Arc::clone(&ctx), RangeActionParameters::default());
        let discrete = DiscretePstFiller::new(Arc::clone(&ctx));
        core.fill(&mut problem, &inputs(&sensi, &activations)).unwrap();
        let before = problem.num_variables();
        discrete.fill(&mut problem, &inputs(&sensi, &activations)).unwrap();
        assert_eq!(problem.num_variables(), before);
    }
}
