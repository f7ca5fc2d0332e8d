//! Commitment model of dispatchable generators across study periods.
//!
//! Each constrained generator gets, per period, a power variable, binary
//! commitment-state indicators and binary state-transition indicators
//! forming a small unit-commitment automaton: OFF and ON always exist, and
//! a RAMP_UP (resp. RAMP_DOWN) phase is inserted when the lead (resp. lag)
//! time exceeds a period gap, so starting or stopping spans several
//! periods. Power transition constraints bound the power delta between
//! periods by the gradients, with transition-specific allowances for
//! starting and stopping units.
//!
//! The ON state is further decomposed into UP/DOWN/FLAT balancing modes
//! gating the sign of the power delta, and a redispatch constraint ties the
//! power to the injection variation variables acting on the generator.
//!
//! Period gaps may be irregular; a zero or negative gap is a fatal data
//! error. The whole commitment model is static across iterations (only the
//! injection variables it references move).

use crate::filler::{FillerInputs, ProblemFiller};
use crate::inputs::OptimizationContext;
use crate::problem::{
    BoundDirection, CommitmentState, ConsRef, ConstraintId, LinearProblem, OnMode, VarRef,
    VariableId, VariationDirection,
};
use rao_core::{ActivationSnapshot, GeneratorConstraints, RaoError, RaoResult, Timestamp};
use std::sync::Arc;

/// Tolerance when placing projected ramp-window ends on the period grid.
const TIME_EPSILON: f64 = 1e-8;

/// Generator commitment filler over the ordered sequence of period
/// contexts. Must run after every period's core filler.
pub struct GeneratorFiller {
    contexts: Vec<Arc<OptimizationContext>>,
    generators: Vec<GeneratorConstraints>,
}

/// The study-period timetable, resolved once per fill.
struct Timetable {
    timestamps: Vec<Timestamp>,
    /// Hour offset of each timestamp from the first one.
    hours: Vec<f64>,
    /// Gap in hours of the transition entering each period. The first
    /// period has no preceding timestamp; its transition from the initial
    /// network state is given the first inter-period gap.
    gaps: Vec<f64>,
}

impl Timetable {
    /// Hour offset at which the transition entering `period` begins.
    fn transition_start(&self, period: usize) -> f64 {
        self.hours[period] - self.gaps[period]
    }
}

impl GeneratorFiller {
    /// `contexts` must be ordered by ascending timestamp.
    pub fn new(
        contexts: Vec<Arc<OptimizationContext>>,
        generators: Vec<GeneratorConstraints>,
    ) -> Self {
        GeneratorFiller { contexts, generators }
    }

    fn timetable(&self) -> RaoResult<Timetable> {
        let mut timestamps = Vec::with_capacity(self.contexts.len());
        for context in &self.contexts {
            let timestamp = context
                .actions_per_state()
                .keys()
                .chain(context.cnecs().iter().map(|c| &c.state))
                .find_map(|state| state.timestamp)
                .ok_or_else(|| {
                    RaoError::Timestamps("study period without a timestamp".to_string())
                })?;
            timestamps.push(timestamp);
        }
        if timestamps.len() < 2 {
            return Err(RaoError::Timestamps(
                "at least two study periods are required for commitment constraints".to_string(),
            ));
        }
        let hours: Vec<f64> =
            timestamps.iter().map(|&t| hours_between(timestamps[0], t)).collect();
        let mut gaps = Vec::with_capacity(hours.len());
        gaps.push(hours[1] - hours[0]);
        for pair in hours.windows(2) {
            let gap = pair[1] - pair[0];
            if gap <= 0.0 {
                return Err(RaoError::Timestamps(
                    "study periods must be strictly increasing".to_string(),
                ));
            }
            gaps.push(gap);
        }
        Ok(Timetable { timestamps, hours, gaps })
    }

    fn initial_power(&self, generator: &GeneratorConstraints) -> RaoResult<f64> {
        self.contexts[0]
            .pre_perimeter()
            .generator_power(&generator.id)
            .ok_or_else(|| {
                RaoError::data(format!("no initial power for generator {}", generator.id))
            })
    }

    fn initial_state(
        generator: &GeneratorConstraints,
        initial_power: f64,
    ) -> RaoResult<CommitmentState> {
        if initial_power == 0.0 {
            Ok(CommitmentState::Off)
        } else if initial_power >= generator.p_min && initial_power <= generator.p_max {
            Ok(CommitmentState::On)
        } else {
            Err(RaoError::data(format!(
                "could not determine the initial state of generator {}",
                generator.id
            )))
        }
    }

    /// Commitment states of this generator: ramp phases exist as soon as
    /// some gap is shorter than the configured lead/lag time.
    fn states(generator: &GeneratorConstraints, gaps: &[f64]) -> Vec<CommitmentState> {
        let mut states = vec![CommitmentState::Off, CommitmentState::On];
        if gaps.iter().any(|&gap| generator.needs_ramp_up(gap)) {
            states.push(CommitmentState::RampUp);
        }
        if gaps.iter().any(|&gap| generator.needs_ramp_down(gap)) {
            states.push(CommitmentState::RampDown);
        }
        states
    }

    /// Transitions entering one period: a start either jumps OFF→ON when
    /// the gap covers the lead time or enters the RAMP_UP phase otherwise,
    /// symmetrically for stops. Ramps started over an earlier, shorter gap
    /// may continue or complete over any gap.
    fn transitions(
        generator: &GeneratorConstraints,
        states: &[CommitmentState],
        gap: f64,
    ) -> Vec<(CommitmentState, CommitmentState)> {
        use CommitmentState::*;
        let mut transitions = vec![(Off, Off), (On, On)];
        if states.contains(&RampUp) {
            transitions.extend([(RampUp, RampUp), (RampUp, On)]);
        }
        if generator.needs_ramp_up(gap) {
            transitions.push((Off, RampUp));
        } else {
            transitions.push((Off, On));
        }
        if states.contains(&RampDown) {
            transitions.extend([(RampDown, RampDown), (RampDown, Off)]);
        }
        if generator.needs_ramp_down(gap) {
            transitions.push((On, RampDown));
        } else {
            transitions.push((On, Off));
        }
        transitions
    }

    fn build_generator(
        &self,
        problem: &mut LinearProblem,
        generator: &GeneratorConstraints,
        timetable: &Timetable,
    ) -> RaoResult<()> {
        let initial_power = self.initial_power(generator)?;
        let states = Self::states(generator, &timetable.gaps);

        for (period, &timestamp) in timetable.timestamps.iter().enumerate() {
            let transitions = Self::transitions(generator, &states, timetable.gaps[period]);
            problem.add_variable(
                VariableId::GeneratorPower { generator: generator.id.clone(), timestamp },
                0.0,
                generator.p_max,
            )?;
            for &state in &states {
                problem.add_binary_variable(VariableId::GeneratorState {
                    generator: generator.id.clone(),
                    timestamp,
                    state,
                })?;
            }
            for &(from, to) in &transitions {
                problem.add_binary_variable(VariableId::GeneratorTransition {
                    generator: generator.id.clone(),
                    timestamp,
                    from,
                    to,
                })?;
            }

            self.build_unique_state_constraint(problem, generator, timestamp, &states)?;
            self.build_power_bound_constraints(problem, generator, timestamp)?;
            self.build_state_transition_constraints(
                problem, generator, timetable, period, initial_power, &states, &transitions,
            )?;
            self.build_power_transition_constraints(
                problem, generator, timetable, period, initial_power, &states,
            )?;
            self.build_on_decomposition(
                problem, generator, timetable, period, initial_power, &states,
            )?;
            self.build_redispatch_constraint(problem, generator, period, timestamp)?;
        }
        Ok(())
    }

    /// `Σ states = 1`.
    fn build_unique_state_constraint(
        &self,
        problem: &mut LinearProblem,
        generator: &GeneratorConstraints,
        timestamp: Timestamp,
        states: &[CommitmentState],
    ) -> RaoResult<()> {
        let cons = problem.add_constraint(
            ConstraintId::GeneratorUniqueState { generator: generator.id.clone(), timestamp },
            1.0,
            1.0,
        )?;
        for &state in states {
            let var = problem.get_variable(&VariableId::GeneratorState {
                generator: generator.id.clone(),
                timestamp,
                state,
            })?;
            problem.set_coefficient(cons, var, 1.0);
        }
        Ok(())
    }

    /// `P + pmax·OFF ≤ pmax` (off means no power) and `pmin·ON - P ≤ 0`
    /// (on means at least the minimum stable power).
    fn build_power_bound_constraints(
        &self,
        problem: &mut LinearProblem,
        generator: &GeneratorConstraints,
        timestamp: Timestamp,
    ) -> RaoResult<()> {
        let power = problem.get_variable(&VariableId::GeneratorPower {
            generator: generator.id.clone(),
            timestamp,
        })?;
        let off = problem.get_variable(&VariableId::GeneratorState {
            generator: generator.id.clone(),
            timestamp,
            state: CommitmentState::Off,
        })?;
        let on = problem.get_variable(&VariableId::GeneratorState {
            generator: generator.id.clone(),
            timestamp,
            state: CommitmentState::On,
        })?;

        let off_power = problem.add_constraint(
            ConstraintId::GeneratorOffPower { generator: generator.id.clone(), timestamp },
            -LinearProblem::infinity(),
            generator.p_max,
        )?;
        problem.set_coefficient(off_power, power, 1.0);
        problem.set_coefficient(off_power, off, generator.p_max);

        let min_power = problem.add_constraint(
            ConstraintId::GeneratorMinPower { generator: generator.id.clone(), timestamp },
            -LinearProblem::infinity(),
            0.0,
        )?;
        problem.set_coefficient(min_power, on, generator.p_min);
        problem.set_coefficient(min_power, power, -1.0);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_state_transition_constraints(
        &self,
        problem: &mut LinearProblem,
        generator: &GeneratorConstraints,
        timetable: &Timetable,
        period: usize,
        initial_power: f64,
        states: &[CommitmentState],
        transitions: &[(CommitmentState, CommitmentState)],
    ) -> RaoResult<()> {
        let timestamp = timetable.timestamps[period];

        if period == 0 {
            // the transitions of the first period leave the initial state
            let initial_state = Self::initial_state(generator, initial_power)?;
            let cons = problem.add_constraint(
                ConstraintId::GeneratorInitialState { generator: generator.id.clone() },
                1.0,
                1.0,
            )?;
            for &(from, to) in transitions.iter().filter(|(from, _)| *from == initial_state) {
                let var = problem.get_variable(&VariableId::GeneratorTransition {
                    generator: generator.id.clone(),
                    timestamp,
                    from,
                    to,
                })?;
                problem.set_coefficient(cons, var, 1.0);
            }
        } else {
            // state at t-1 equals the sum of transitions leaving it
            let previous = timetable.timestamps[period - 1];
            for &state in states {
                let cons = problem.add_constraint(
                    ConstraintId::GeneratorFromState {
                        generator: generator.id.clone(),
                        timestamp,
                        state,
                    },
                    0.0,
                    0.0,
                )?;
                let state_var = problem.get_variable(&VariableId::GeneratorState {
                    generator: generator.id.clone(),
                    timestamp: previous,
                    state,
                })?;
                problem.set_coefficient(cons, state_var, 1.0);
                for &(from, to) in transitions.iter().filter(|(from, _)| *from == state) {
                    let var = problem.get_variable(&VariableId::GeneratorTransition {
                        generator: generator.id.clone(),
                        timestamp,
                        from,
                        to,
                    })?;
                    problem.set_coefficient(cons, var, -1.0);
                }
            }
        }

        // state at t equals the sum of transitions entering it
        for &state in states {
            let cons = problem.add_constraint(
                ConstraintId::GeneratorToState {
                    generator: generator.id.clone(),
                    timestamp,
                    state,
                },
                0.0,
                0.0,
            )?;
            let state_var = problem.get_variable(&VariableId::GeneratorState {
                generator: generator.id.clone(),
                timestamp,
                state,
            })?;
            problem.set_coefficient(cons, state_var, 1.0);
            for &(from, to) in transitions.iter().filter(|(_, to)| *to == state) {
                let var = problem.get_variable(&VariableId::GeneratorTransition {
                    generator: generator.id.clone(),
                    timestamp,
                    from,
                    to,
                })?;
                problem.set_coefficient(cons, var, -1.0);
            }
        }
        Ok(())
    }

    /// Gradient bounds on the power delta between periods, with
    /// transition-specific allowances: a start reaches at least the minimum
    /// stable power and at most what the gradient permits past the lead
    /// time; ramp phases progress by a pro-rata share of the minimum stable
    /// power per period. Allowances are capped at the full power amplitude.
    fn build_power_transition_constraints(
        &self,
        problem: &mut LinearProblem,
        generator: &GeneratorConstraints,
        timetable: &Timetable,
        period: usize,
        initial_power: f64,
        states: &[CommitmentState],
    ) -> RaoResult<()> {
        use CommitmentState::*;
        let timestamp = timetable.timestamps[period];
        let gap = timetable.gaps[period];
        let p_min = generator.p_min;
        let lead = generator.lead_time.unwrap_or(0.0);
        let lag = generator.lag_time.unwrap_or(0.0);
        let up_gradient = generator.upward_gradient.unwrap_or(LinearProblem::infinity());
        let down_gradient = generator.downward_gradient.unwrap_or(LinearProblem::infinity());
        let amplitude = |allowance: f64| allowance.min(generator.p_max);

        let power = problem.get_variable(&VariableId::GeneratorPower {
            generator: generator.id.clone(),
            timestamp,
        })?;
        let transition = |problem: &LinearProblem, from, to| {
            problem.get_variable(&VariableId::GeneratorTransition {
                generator: generator.id.clone(),
                timestamp,
                from,
                to,
            })
        };

        // P - P_prev ≥ -down·Δt when staying on, with stop allowances
        let lower = problem.add_constraint(
            ConstraintId::GeneratorPowerTransition {
                generator: generator.id.clone(),
                timestamp,
                bound: BoundDirection::Lower,
            },
            0.0,
            LinearProblem::infinity(),
        )?;
        // P - P_prev ≤ up·Δt when staying on, with start allowances
        let upper = problem.add_constraint(
            ConstraintId::GeneratorPowerTransition {
                generator: generator.id.clone(),
                timestamp,
                bound: BoundDirection::Upper,
            },
            -LinearProblem::infinity(),
            0.0,
        )?;
        problem.set_coefficient(lower, power, 1.0);
        problem.set_coefficient(upper, power, 1.0);

        let on_on = transition(problem, On, On)?;
        problem.set_coefficient(lower, on_on, amplitude(gap * down_gradient));
        problem.set_coefficient(upper, on_on, -amplitude(gap * up_gradient));

        if period == 0 {
            problem.set_constraint_bounds(lower, initial_power, LinearProblem::infinity());
            problem.set_constraint_bounds(upper, -LinearProblem::infinity(), initial_power);
        } else {
            let previous_power = problem.get_variable(&VariableId::GeneratorPower {
                generator: generator.id.clone(),
                timestamp: timetable.timestamps[period - 1],
            })?;
            problem.set_coefficient(lower, previous_power, -1.0);
            problem.set_coefficient(upper, previous_power, -1.0);
        }

        if states.contains(&RampUp) {
            let share = p_min / lead;
            let ramp_ramp = transition(problem, RampUp, RampUp)?;
            problem.set_coefficient(lower, ramp_ramp, -gap * share);
            problem.set_coefficient(upper, ramp_ramp, -gap * share);
            let tail = ramp_up_tail(timetable, lead, period);
            let ramp_on = transition(problem, RampUp, On)?;
            problem.set_coefficient(lower, ramp_on, -tail * share);
            problem.set_coefficient(
                upper,
                ramp_on,
                -amplitude(tail * share + (gap - tail) * up_gradient),
            );
        }
        if generator.needs_ramp_up(gap) {
            let off_ramp = transition(problem, Off, RampUp)?;
            let share = p_min / lead;
            problem.set_coefficient(lower, off_ramp, -gap * share);
            problem.set_coefficient(upper, off_ramp, -gap * share);
        } else {
            let off_on = transition(problem, Off, On)?;
            problem.set_coefficient(lower, off_on, -p_min);
            problem.set_coefficient(
                upper,
                off_on,
                -amplitude(p_min + (gap - lead) * up_gradient),
            );
        }

        if states.contains(&RampDown) {
            let share = p_min / lag;
            let ramp_ramp = transition(problem, RampDown, RampDown)?;
            let ramp_off = transition(problem, RampDown, Off)?;
            problem.set_coefficient(lower, ramp_ramp, gap * share);
            problem.set_coefficient(upper, ramp_ramp, gap * share);
            problem.set_coefficient(lower, ramp_off, gap * share);
            problem.set_coefficient(upper, ramp_off, gap * share);
        }
        if generator.needs_ramp_down(gap) {
            let on_ramp = transition(problem, On, RampDown)?;
            let share = p_min / lag;
            let head = ramp_down_head(timetable, lag, period);
            problem.set_coefficient(
                lower,
                on_ramp,
                amplitude(head * share + (gap - head) * down_gradient),
            );
            problem.set_coefficient(upper, on_ramp, head * share);
        } else {
            let on_off = transition(problem, On, Off)?;
            problem.set_coefficient(
                lower,
                on_off,
                amplitude(p_min + (gap - lag) * down_gradient),
            );
            problem.set_coefficient(upper, on_off, p_min);
        }
        Ok(())
    }

    /// `ON = UP + DOWN + FLAT`, with the UP (resp. DOWN) mode authorizing a
    /// positive (resp. negative) power delta. Periods spent off or ramping
    /// get a full-power slack so the gate only binds steady operation.
    fn build_on_decomposition(
        &self,
        problem: &mut LinearProblem,
        generator: &GeneratorConstraints,
        timetable: &Timetable,
        period: usize,
        initial_power: f64,
        states: &[CommitmentState],
    ) -> RaoResult<()> {
        let timestamp = timetable.timestamps[period];
        let p_max = generator.p_max;

        let mut modes: Vec<VarRef> = Vec::with_capacity(3);
        for mode in [OnMode::Up, OnMode::Down, OnMode::Flat] {
            modes.push(problem.add_binary_variable(VariableId::GeneratorOnMode {
                generator: generator.id.clone(),
                timestamp,
                mode,
            })?);
        }
        let on = problem.get_variable(&VariableId::GeneratorState {
            generator: generator.id.clone(),
            timestamp,
            state: CommitmentState::On,
        })?;
        let decomposition = problem.add_constraint(
            ConstraintId::GeneratorOnDecomposition { generator: generator.id.clone(), timestamp },
            0.0,
            0.0,
        )?;
        problem.set_coefficient(decomposition, on, 1.0);
        for mode in &modes {
            problem.set_coefficient(decomposition, *mode, -1.0);
        }

        let power = problem.get_variable(&VariableId::GeneratorPower {
            generator: generator.id.clone(),
            timestamp,
        })?;
        let slack_states = |problem: &mut LinearProblem, cons: ConsRef| -> RaoResult<()> {
            for &state in states.iter().filter(|s| **s != CommitmentState::On) {
                let var = problem.get_variable(&VariableId::GeneratorState {
                    generator: generator.id.clone(),
                    timestamp,
                    state,
                })?;
                problem.set_coefficient(cons, var, -p_max);
            }
            if period > 0 {
                let previous_off = problem.get_variable(&VariableId::GeneratorState {
                    generator: generator.id.clone(),
                    timestamp: timetable.timestamps[period - 1],
                    state: CommitmentState::Off,
                })?;
                problem.set_coefficient(cons, previous_off, -p_max);
            }
            Ok(())
        };

        // P - P_prev - pmax·UP - slack ≤ 0
        let up_bound = if period == 0 { initial_power } else { 0.0 };
        let upward = problem.add_constraint(
            ConstraintId::GeneratorDelta {
                generator: generator.id.clone(),
                timestamp,
                direction: VariationDirection::Upward,
            },
            -LinearProblem::infinity(),
            up_bound,
        )?;
        problem.set_coefficient(upward, power, 1.0);
        problem.set_coefficient(upward, modes[0], -p_max);
        slack_states(problem, upward)?;

        // P_prev - P - pmax·DOWN - slack ≤ 0
        let down_bound = if period == 0 { -initial_power } else { 0.0 };
        let downward = problem.add_constraint(
            ConstraintId::GeneratorDelta {
                generator: generator.id.clone(),
                timestamp,
                direction: VariationDirection::Downward,
            },
            -LinearProblem::infinity(),
            down_bound,
        )?;
        problem.set_coefficient(downward, power, -1.0);
        problem.set_coefficient(downward, modes[1], -p_max);
        slack_states(problem, downward)?;

        if period > 0 {
            let previous_power = problem.get_variable(&VariableId::GeneratorPower {
                generator: generator.id.clone(),
                timestamp: timetable.timestamps[period - 1],
            })?;
            problem.set_coefficient(upward, previous_power, -1.0);
            problem.set_coefficient(downward, previous_power, 1.0);
        }
        Ok(())
    }

    /// `P - Σ key·(up - down) = P0` over the injection actions acting on
    /// this generator in the period's context.
    fn build_redispatch_constraint(
        &self,
        problem: &mut LinearProblem,
        generator: &GeneratorConstraints,
        period: usize,
        timestamp: Timestamp,
    ) -> RaoResult<()> {
        let context = &self.contexts[period];
        let reference_power = context
            .pre_perimeter()
            .generator_power(&generator.id)
            .ok_or_else(|| {
                RaoError::data(format!("no initial power for generator {}", generator.id))
            })?;
        let cons = problem.add_constraint(
            ConstraintId::GeneratorRedispatch { generator: generator.id.clone(), timestamp },
            reference_power,
            reference_power,
        )?;
        let power = problem.get_variable(&VariableId::GeneratorPower {
            generator: generator.id.clone(),
            timestamp,
        })?;
        problem.set_coefficient(cons, power, 1.0);

        for (state, actions) in context.actions_per_state() {
            for action in actions {
                let Some(injection) = action.injection() else { continue };
                let Some(&key) = injection.distribution_keys.get(&generator.network_element)
                else {
                    continue;
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
                problem.set_coefficient(cons, up, -key);
                problem.set_coefficient(cons, down, key);
            }
        }
        Ok(())
    }
}

fn hours_between(earlier: Timestamp, later: Timestamp) -> f64 {
    // millisecond precision: sub-minute period gaps must not round away
    (later - earlier).num_milliseconds() as f64 / 3_600_000.0
}

/// Hours of a completing ramp-up that fall inside `period`: searches
/// backward for the period whose ramp start projects a window ending inside
/// this one. A window end landing exactly on a timestamp counts as ending
/// in the period closing at that timestamp.
fn ramp_up_tail(timetable: &Timetable, lead: f64, period: usize) -> f64 {
    let window_lo = timetable.transition_start(period);
    let window_hi = timetable.hours[period];
    for start_period in (0..=period).rev() {
        let end = timetable.transition_start(start_period) + lead;
        if end > window_lo + TIME_EPSILON && end <= window_hi + TIME_EPSILON {
            return end - window_lo;
        }
    }
    lead.min(timetable.gaps[period])
}

/// Hours of a beginning ramp-down that fall inside `period`: projects the
/// ramp window forward from the start of the period and finds the timestamp
/// where it completes.
fn ramp_down_head(timetable: &Timetable, lag: f64, period: usize) -> f64 {
    let end = timetable.transition_start(period) + lag;
    for later in period..timetable.hours.len() {
        if end <= timetable.hours[later] + TIME_EPSILON {
            let head = lag - (timetable.hours[later] - timetable.hours[period]);
            return head.clamp(0.0, timetable.gaps[period]);
        }
    }
    lag.min(timetable.gaps[period])
}

impl ProblemFiller for GeneratorFiller {
    fn fill(&self, problem: &mut LinearProblem, _inputs: &FillerInputs<'_>) -> RaoResult<()> {
        if self.generators.is_empty() {
            return Ok(());
        }
        let timetable = self.timetable()?;
        for generator in &self.generators {
            self.build_generator(problem, generator, &timetable)?;
        }
        Ok(())
    }

    fn update_between_sensi_iteration(
        &self,
        _problem: &mut LinearProblem,
        _inputs: &FillerInputs<'_>,
        _iteration: usize,
    ) -> RaoResult<()> {
        // the commitment model only depends on static generator data
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
    use crate::fillers::core::CoreProblemFiller;
    use crate::parameters::RangeActionParameters;
    use crate::testutil::{injection_action, inputs, simple_context};
    use chrono::{Duration, TimeZone, Utc};
    use rao_core::{
        ActionId, GeneratorId, NetworkElementId, SensitivitySnapshot, SetpointSnapshot, State,
    };
    use std::collections::BTreeMap;

    fn ts(hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 1, 1, hour, 0, 0).single().unwrap()
    }

    fn generator(lead_time: Option<f64>, lag_time: Option<f64>) -> GeneratorConstraints {
        GeneratorConstraints {
            id: GeneratorId::from("gen1"),
            network_element: NetworkElementId::from("gen1_ne"),
            p_min: 100.0,
            p_max: 1000.0,
            lead_time,
            lag_time,
            upward_gradient: Some(200.0),
            downward_gradient: Some(150.0),
        }
    }

    /// One period per timestamp, each with one redispatch injection acting
    /// on the generator. Initial generator power 500 MW.
    fn contexts(timestamps: &[Timestamp]) -> Vec<Arc<OptimizationContext>> {
        timestamps
            .iter()
            .map(|&timestamp| {
                let state = State::preventive().at_timestamp(timestamp);
                let mut action = injection_action("redispatch1", -400.0, 400.0, 1.0);
                action.kind = rao_core::RangeActionKind::Injection(rao_core::InjectionData {
                    ranges: vec![rao_core::StandardRange {
                        min: -400.0,
                        max: 400.0,
                        range_type: rao_core::RangeType::Absolute,
                    }],
                    distribution_keys: [(NetworkElementId::from("gen1_ne"), 1.0)]
                        .into_iter()
                        .collect(),
                });
                let mut actions = BTreeMap::new();
                actions.insert(state, vec![action]);
                let mut pre = SetpointSnapshot::new();
                pre.set_setpoint("redispatch1", 0.0);
                pre.set_generator_power("gen1", 500.0);
                Arc::new(simple_context(vec![], actions, pre))
            })
            .collect()
    }

    fn filled(generator: GeneratorConstraints, timestamps: &[Timestamp]) -> LinearProblem {
        let contexts = contexts(timestamps);
        let sensi = SensitivitySnapshot::new();
        let mut pre = SetpointSnapshot::new();
        pre.set_setpoint("redispatch1", 0.0);
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        let io = inputs(&sensi, &activations);

        let mut problem = LinearProblem::new();
        for context in &contexts {
            CoreProblemFiller::new(Arc::clone(context), RangeActionParameters::default())
                .fill(&mut problem, &io)
                .unwrap();
        }
        GeneratorFiller::new(contexts, vec![generator]).fill(&mut problem, &io).unwrap();
        problem
    }

    #[test]
    fn test_unique_state_without_ramp_phases() {
        // lead 1h over 2h periods: no ramp phase needed
        let problem = filled(generator(Some(1.0), None), &[ts(0), ts(2)]);
        let gen = GeneratorId::from("gen1");

        let cons = problem
            .get_constraint(&ConstraintId::GeneratorUniqueState {
                generator: gen.clone(),
                timestamp: ts(0),
            })
            .unwrap();
        assert_eq!(problem.constraint_lb(cons), 1.0);
        assert_eq!(problem.constraint_ub(cons), 1.0);
        for state in [CommitmentState::Off, CommitmentState::On] {
            let var = problem
                .get_variable(&VariableId::GeneratorState {
                    generator: gen.clone(),
                    timestamp: ts(0),
                    state,
                })
                .unwrap();
            assert_eq!(problem.coefficient(cons, var), 1.0);
        }
        assert!(problem
            .find_variable(&VariableId::GeneratorState {
                generator: gen,
                timestamp: ts(0),
                state: CommitmentState::RampUp,
            })
            .is_none());
    }

    #[test]
    fn test_power_bounds() {
        let problem = filled(generator(Some(1.0), None), &[ts(0), ts(2)]);
        let gen = GeneratorId::from("gen1");
        let power = problem
            .get_variable(&VariableId::GeneratorPower { generator: gen.clone(), timestamp: ts(0) })
            .unwrap();
        assert_eq!(problem.variable_ub(power), 1000.0);

        let off_power = problem
            .get_constraint(&ConstraintId::GeneratorOffPower {
                generator: gen.clone(),
                timestamp: ts(0),
            })
            .unwrap();
        assert_eq!(problem.constraint_ub(off_power), 1000.0);
        let off = problem
            .get_variable(&VariableId::GeneratorState {
                generator: gen.clone(),
                timestamp: ts(0),
                state: CommitmentState::Off,
            })
            .unwrap();
        assert_eq!(problem.coefficient(off_power, off), 1000.0);

        let min_power = problem
            .get_constraint(&ConstraintId::GeneratorMinPower { generator: gen, timestamp: ts(0) })
            .unwrap();
        assert_eq!(problem.constraint_ub(min_power), 0.0);
        assert_eq!(problem.coefficient(min_power, power), -1.0);
    }

    #[test]
    fn test_start_allowance_in_power_transition() {
        // lead 1h, 2h periods: a start may reach pmin plus one hour of
        // upward gradient: coefficient -pmin - (2 - 1)·200 = -300
        let problem = filled(generator(Some(1.0), None), &[ts(0), ts(2)]);
        let gen = GeneratorId::from("gen1");
        let upper = problem
            .get_constraint(&ConstraintId::GeneratorPowerTransition {
                generator: gen.clone(),
                timestamp: ts(2),
                bound: BoundDirection::Upper,
            })
            .unwrap();
        let off_on = problem
            .get_variable(&VariableId::GeneratorTransition {
                generator: gen.clone(),
                timestamp: ts(2),
                from: CommitmentState::Off,
                to: CommitmentState::On,
            })
            .unwrap();
        assert!((problem.coefficient(upper, off_on) + 300.0).abs() < 1e-6);

        // staying on: delta capped by 2h of gradient
        let on_on = problem
            .get_variable(&VariableId::GeneratorTransition {
                generator: gen,
                timestamp: ts(2),
                from: CommitmentState::On,
                to: CommitmentState::On,
            })
            .unwrap();
        assert!((problem.coefficient(upper, on_on) + 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_period_anchored_on_initial_power() {
        let problem = filled(generator(Some(1.0), None), &[ts(0), ts(2)]);
        let gen = GeneratorId::from("gen1");
        let lower = problem
            .get_constraint(&ConstraintId::GeneratorPowerTransition {
                generator: gen.clone(),
                timestamp: ts(0),
                bound: BoundDirection::Lower,
            })
            .unwrap();
        assert_eq!(problem.constraint_lb(lower), 500.0);
        let upper = problem
            .get_constraint(&ConstraintId::GeneratorPowerTransition {
                generator: gen.clone(),
                timestamp: ts(0),
                bound: BoundDirection::Upper,
            })
            .unwrap();
        assert_eq!(problem.constraint_ub(upper), 500.0);

        // initial power 500 MW: the initial state is ON
        let initial = problem
            .get_constraint(&ConstraintId::GeneratorInitialState { generator: gen.clone() })
            .unwrap();
        let on_on = problem
            .get_variable(&VariableId::GeneratorTransition {
                generator: gen.clone(),
                timestamp: ts(0),
                from: CommitmentState::On,
                to: CommitmentState::On,
            })
            .unwrap();
        let on_off = problem
            .get_variable(&VariableId::GeneratorTransition {
                generator: gen,
                timestamp: ts(0),
                from: CommitmentState::On,
                to: CommitmentState::Off,
            })
            .unwrap();
        assert_eq!(problem.coefficient(initial, on_on), 1.0);
        assert_eq!(problem.coefficient(initial, on_off), 1.0);
    }

    #[test]
    fn test_ramp_phase_when_lead_exceeds_period() {
        // lead 5h over 2h periods: starting goes through RAMP_UP
        let problem = filled(generator(Some(5.0), None), &[ts(0), ts(2)]);
        let gen = GeneratorId::from("gen1");
        assert!(problem
            .find_variable(&VariableId::GeneratorState {
                generator: gen.clone(),
                timestamp: ts(0),
                state: CommitmentState::RampUp,
            })
            .is_some());
        assert!(problem
            .find_variable(&VariableId::GeneratorTransition {
                generator: gen.clone(),
                timestamp: ts(0),
                from: CommitmentState::Off,
                to: CommitmentState::On,
            })
            .is_none());
        assert!(problem
            .find_variable(&VariableId::GeneratorTransition {
                generator: gen,
                timestamp: ts(0),
                from: CommitmentState::Off,
                to: CommitmentState::RampUp,
            })
            .is_some());
    }

    #[test]
    fn test_on_decomposition_and_delta_gates() {
        let problem = filled(generator(Some(1.0), None), &[ts(0), ts(2)]);
        let gen = GeneratorId::from("gen1");
        let decomposition = problem
            .get_constraint(&ConstraintId::GeneratorOnDecomposition {
                generator: gen.clone(),
                timestamp: ts(2),
            })
            .unwrap();
        let on = problem
            .get_variable(&VariableId::GeneratorState {
                generator: gen.clone(),
                timestamp: ts(2),
                state: CommitmentState::On,
            })
            .unwrap();
        assert_eq!(problem.coefficient(decomposition, on), 1.0);
        for mode in [OnMode::Up, OnMode::Down, OnMode::Flat] {
            let var = problem
                .get_variable(&VariableId::GeneratorOnMode {
                    generator: gen.clone(),
                    timestamp: ts(2),
                    mode,
                })
                .unwrap();
            assert_eq!(problem.coefficient(decomposition, var), -1.0);
        }

        let upward = problem
            .get_constraint(&ConstraintId::GeneratorDelta {
                generator: gen.clone(),
                timestamp: ts(2),
                direction: VariationDirection::Upward,
            })
            .unwrap();
        let up_mode = problem
            .get_variable(&VariableId::GeneratorOnMode {
                generator: gen.clone(),
                timestamp: ts(2),
                mode: OnMode::Up,
            })
            .unwrap();
        assert_eq!(problem.coefficient(upward, up_mode), -1000.0);
        // the previous period's OFF state slackens the gate
        let previous_off = problem
            .get_variable(&VariableId::GeneratorState {
                generator: gen,
                timestamp: ts(0),
                state: CommitmentState::Off,
            })
            .unwrap();
        assert_eq!(problem.coefficient(upward, previous_off), -1000.0);
    }

    #[test]
    fn test_redispatch_links_power_to_injections() {
        let problem = filled(generator(Some(1.0), None), &[ts(0), ts(2)]);
        let gen = GeneratorId::from("gen1");
        let cons = problem
            .get_constraint(&ConstraintId::GeneratorRedispatch {
                generator: gen,
                timestamp: ts(0),
            })
            .unwrap();
        assert_eq!(problem.constraint_lb(cons), 500.0);
        assert_eq!(problem.constraint_ub(cons), 500.0);

        let state = State::preventive().at_timestamp(ts(0));
        let up = problem
            .get_variable(&VariableId::SetPointVariation {
                action: ActionId::from("redispatch1"),
                state: state.clone(),
                direction: VariationDirection::Upward,
            })
            .unwrap();
        let down = problem
            .get_variable(&VariableId::SetPointVariation {
                action: ActionId::from("redispatch1"),
                state,
                direction: VariationDirection::Downward,
            })
            .unwrap();
        assert_eq!(problem.coefficient(cons, up), -1.0);
        assert_eq!(problem.coefficient(cons, down), 1.0);
    }

    #[test]
    fn test_irregular_gaps_scale_allowances_per_period() {
        // gaps 2h then 1h, lead 1h: the start allowance follows each gap
        let problem = filled(generator(Some(1.0), None), &[ts(0), ts(2), ts(3)]);
        let gen = GeneratorId::from("gen1");

        let upper_2h = problem
            .get_constraint(&ConstraintId::GeneratorPowerTransition {
                generator: gen.clone(),
                timestamp: ts(2),
                bound: BoundDirection::Upper,
            })
            .unwrap();
        let off_on_2h = problem
            .get_variable(&VariableId::GeneratorTransition {
                generator: gen.clone(),
                timestamp: ts(2),
                from: CommitmentState::Off,
                to: CommitmentState::On,
            })
            .unwrap();
        // -pmin - (2 - 1)·200
        assert!((problem.coefficient(upper_2h, off_on_2h) + 300.0).abs() < 1e-6);

        let upper_1h = problem
            .get_constraint(&ConstraintId::GeneratorPowerTransition {
                generator: gen.clone(),
                timestamp: ts(3),
                bound: BoundDirection::Upper,
            })
            .unwrap();
        let off_on_1h = problem
            .get_variable(&VariableId::GeneratorTransition {
                generator: gen,
                timestamp: ts(3),
                from: CommitmentState::Off,
                to: CommitmentState::On,
            })
            .unwrap();
        // -pmin - (1 - 1)·200
        assert!((problem.coefficient(upper_1h, off_on_1h) + 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_ramp_completion_carries_the_window_tail() {
        // lead 3h over 2h gaps: a ramp started entering the first period
        // projects its window end 1h into the third period
        let problem = filled(generator(Some(3.0), None), &[ts(0), ts(2), ts(4)]);
        let gen = GeneratorId::from("gen1");
        let lower = problem
            .get_constraint(&ConstraintId::GeneratorPowerTransition {
                generator: gen.clone(),
                timestamp: ts(4),
                bound: BoundDirection::Lower,
            })
            .unwrap();
        let ramp_on = problem
            .get_variable(&VariableId::GeneratorTransition {
                generator: gen.clone(),
                timestamp: ts(4),
                from: CommitmentState::RampUp,
                to: CommitmentState::On,
            })
            .unwrap();
        // tail 1h of the 3h ramp: -1·pmin/lead = -100/3
        assert!((problem.coefficient(lower, ramp_on) + 100.0 / 3.0).abs() < 1e-6);

        let ramp_ramp = problem
            .get_variable(&VariableId::GeneratorTransition {
                generator: gen,
                timestamp: ts(4),
                from: CommitmentState::RampUp,
                to: CommitmentState::RampUp,
            })
            .unwrap();
        // a full 2h mid-ramp period advances by 2·pmin/lead
        assert!((problem.coefficient(lower, ramp_ramp) + 200.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_sub_minute_gaps_keep_full_precision() {
        // 90-second periods: the gap is 0.025h, not a rounded whole minute
        let start = ts(0);
        let problem =
            filled(generator(None, None), &[start, start + Duration::seconds(90)]);
        let gen = GeneratorId::from("gen1");
        let upper = problem
            .get_constraint(&ConstraintId::GeneratorPowerTransition {
                generator: gen.clone(),
                timestamp: start + Duration::seconds(90),
                bound: BoundDirection::Upper,
            })
            .unwrap();
        let on_on = problem
            .get_variable(&VariableId::GeneratorTransition {
                generator: gen,
                timestamp: start + Duration::seconds(90),
                from: CommitmentState::On,
                to: CommitmentState::On,
            })
            .unwrap();
        // 0.025h of the 200 MW/h upward gradient
        assert!((problem.coefficient(upper, on_on) + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_chronological_periods_rejected() {
        let contexts = contexts(&[ts(2), ts(0)]);
        let sensi = SensitivitySnapshot::new();
        let pre = SetpointSnapshot::new();
        let activations = ActivationSnapshot::from_pre_perimeter(&pre);
        let mut problem = LinearProblem::new();
        let err = GeneratorFiller::new(contexts, vec![generator(Some(1.0), None)])
            .fill(&mut problem, &inputs(&sensi, &activations))
            .unwrap_err();
        assert!(matches!(err, RaoError::Timestamps(_)));
    }
}
