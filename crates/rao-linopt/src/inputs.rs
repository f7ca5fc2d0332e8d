//! Per-leaf immutable inputs shared by the fillers.
//!
//! An [`OptimizationContext`] bundles the static catalogs of one
//! optimization leaf: the monitored elements, the remedial actions available
//! per state, and the pre-perimeter positions. It also implements the
//! previous-state walks the fillers rely on (latest instant first, with
//! duplicate-action detection across aligned states).

use rao_core::{
    ActionId, FlowCnec, RangeAction, RaoError, RaoResult, SetpointSnapshot, State,
};
use std::collections::BTreeMap;

/// Epsilon relaxing admissible setpoint bounds so the current position is
/// never cut off by rounding.
pub const SETPOINT_EPSILON: f64 = 1e-5;

/// Static inputs of one optimization leaf.
#[derive(Debug, Clone, Default)]
pub struct OptimizationContext {
    cnecs: Vec<FlowCnec>,
    actions_per_state: BTreeMap<State, Vec<RangeAction>>,
    pre_perimeter: SetpointSnapshot,
}

impl OptimizationContext {
    /// Build a context; CNECs and per-state action lists are sorted by
    /// identifier so iteration order is deterministic.
    pub fn new(
        mut cnecs: Vec<FlowCnec>,
        mut actions_per_state: BTreeMap<State, Vec<RangeAction>>,
        pre_perimeter: SetpointSnapshot,
    ) -> Self {
        cnecs.sort_by(|a, b| a.id.cmp(&b.id));
        for actions in actions_per_state.values_mut() {
            actions.sort_by(|a, b| a.id.cmp(&b.id));
        }
        OptimizationContext { cnecs, actions_per_state, pre_perimeter }
    }

    /// Monitored elements, ordered by identifier.
    pub fn cnecs(&self) -> &[FlowCnec] {
        &self.cnecs
    }

    /// Optimized states with their available actions, in state order.
    pub fn actions_per_state(&self) -> &BTreeMap<State, Vec<RangeAction>> {
        &self.actions_per_state
    }

    /// Pre-perimeter positions.
    pub fn pre_perimeter(&self) -> &SetpointSnapshot {
        &self.pre_perimeter
    }

    /// Pre-perimeter setpoint of an action; missing entries are a data
    /// error (the orchestrator must snapshot every available action).
    pub fn initial_setpoint(&self, action: &ActionId) -> RaoResult<f64> {
        self.pre_perimeter
            .setpoint(action)
            .ok_or_else(|| RaoError::data(format!("no pre-perimeter setpoint for {action}")))
    }

    /// Pre-perimeter tap of a PST action.
    pub fn initial_tap(&self, action: &ActionId) -> RaoResult<i32> {
        self.pre_perimeter
            .tap(action)
            .ok_or_else(|| RaoError::data(format!("no pre-perimeter tap for {action}")))
    }

    /// Admissible setpoint interval of an action around its pre-perimeter
    /// position.
    pub fn admissible_setpoint_range(&self, action: &RangeAction) -> RaoResult<(f64, f64)> {
        let initial_setpoint = self.initial_setpoint(&action.id)?;
        let initial_tap = if action.is_pst() {
            Some(self.initial_tap(&action.id)?)
        } else {
            None
        };
        action.admissible_setpoint_range(initial_setpoint, initial_tap)
    }

    /// Optimized states at or before `state` on the same scenario branch,
    /// ordered latest instant first.
    pub fn states_before(&self, state: &State) -> Vec<&State> {
        let mut states: Vec<&State> = self
            .actions_per_state
            .keys()
            .filter(|s| state.follows(s))
            .collect();
        states.sort_by(|a, b| b.instant.cmp(&a.instant));
        states
    }

    /// Actions able to influence a monitored element at `state`: walk the
    /// previous states latest-first, counting each physical action once even
    /// when it is declared on several instants (same identifier or same
    /// network elements).
    pub fn actions_available_before(&self, state: &State) -> Vec<(&State, &RangeAction)> {
        let mut picked: Vec<(&State, &RangeAction)> = Vec::new();
        for earlier in self.states_before(state) {
            let Some(actions) = self.actions_per_state.get(earlier) else {
                continue;
            };
            for action in actions {
                let duplicate = picked.iter().any(|(_, chosen)| {
                    chosen.id == action.id || chosen.same_network_elements(action)
                });
                if !duplicate {
                    picked.push((earlier, action));
                }
            }
        }
        picked
    }

    /// The latest occurrence of the same physical action on a strictly
    /// earlier instant of the same scenario branch, if any. Determines
    /// whether an action's range is anchored on the pre-perimeter position
    /// or on its previous-instant setpoint variable.
    pub fn previous_occurrence(
        &self,
        action: &RangeAction,
        state: &State,
    ) -> Option<(&State, &RangeAction)> {
        for earlier in self.states_before(state) {
            if earlier.instant >= state.instant {
                continue;
            }
            if let Some(actions) = self.actions_per_state.get(earlier) {
                if let Some(found) = actions
                    .iter()
                    .find(|a| a.id == action.id || a.same_network_elements(action))
                {
                    return Some((earlier, found));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rao_core::{
        HvdcData, Instant, NetworkElementId, RangeActionKind, StandardRange, TsoId,
    };

    fn hvdc(id: &str, element: &str) -> RangeAction {
        RangeAction {
            id: ActionId::from(id),
            operator: TsoId::from("operator1"),
            group: None,
            activation_cost: None,
            upward_variation_cost: None,
            downward_variation_cost: None,
            network_elements: [NetworkElementId::from(element)].into_iter().collect(),
            kind: RangeActionKind::Hvdc(HvdcData {
                ranges: vec![StandardRange {
                    min: -100.0,
                    max: 100.0,
                    range_type: rao_core::RangeType::Absolute,
                }],
            }),
        }
    }

    fn context() -> OptimizationContext {
        let preventive = State::preventive();
        let curative = State::post_contingency(Instant::curative(0), "co1");
        let mut actions = BTreeMap::new();
        actions.insert(preventive, vec![hvdc("hvdc_prev", "link1")]);
        actions.insert(
            curative,
            vec![hvdc("hvdc_cur", "link1"), hvdc("hvdc_other", "link2")],
        );
        OptimizationContext::new(vec![], actions, SetpointSnapshot::new())
    }

    #[test]
    fn test_states_before_latest_first() {
        let ctx = context();
        let curative = State::post_contingency(Instant::curative(0), "co1");
        let states = ctx.states_before(&curative);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].instant, Instant::curative(0));
        assert_eq!(states[1].instant, Instant::preventive());
    }

    #[test]
    fn test_duplicate_action_counted_once() {
        let ctx = context();
        let curative = State::post_contingency(Instant::curative(0), "co1");
        // hvdc_prev and hvdc_cur act on the same element: only the curative
        // (latest) occurrence is kept
        let available = ctx.actions_available_before(&curative);
        let ids: Vec<&str> = available.iter().map(|(_, a)| a.id.as_str()).collect();
        assert_eq!(ids, vec!["hvdc_cur", "hvdc_other"]);
    }

    #[test]
    fn test_previous_occurrence_found_by_network_element() {
        let ctx = context();
        let curative = State::post_contingency(Instant::curative(0), "co1");
        let action = hvdc("hvdc_cur", "link1");
        let (state, found) = ctx.previous_occurrence(&action, &curative).unwrap();
        assert_eq!(state.instant, Instant::preventive());
        assert_eq!(found.id.as_str(), "hvdc_prev");

        let lonely = hvdc("hvdc_other", "link2");
        assert!(ctx.previous_occurrence(&lonely, &curative).is_none());
    }
}
