//! Remedial actions with admissible ranges.
//!
//! A [`RangeAction`] is an adjustable grid control. Its payload is a tagged
//! [`RangeActionKind`]: phase-shifting transformers carry an integer
//! tap-to-angle map and tap ranges, HVDC links and injections carry
//! continuous setpoint ranges (injections additionally carry distribution
//! keys over network elements). Branching on the kind is always an
//! exhaustive match; there is no "unsupported subtype" path at runtime.
//!
//! Range clauses come in four types and intersect (running max of lower
//! bounds, running min of upper bounds):
//! - `Absolute`: bounds on the raw tap/setpoint;
//! - `RelativeToInitialNetwork`: bounds on the excursion from the initial
//!   network position;
//! - `RelativeToPreviousInstant`: bounds on the delta against the same
//!   action's position at the previous instant;
//! - `RelativeToPreviousTimeStep`: bounds on the delta against the previous
//!   study period (multi-timestep only).

use crate::error::{RaoError, RaoResult};
use crate::id::{ActionId, GroupId, NetworkElementId, TsoId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Type of a range clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeType {
    Absolute,
    RelativeToInitialNetwork,
    RelativeToPreviousInstant,
    RelativeToPreviousTimeStep,
}

/// Integer tap range clause of a phase-shifting transformer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TapRange {
    pub min_tap: i32,
    pub max_tap: i32,
    pub range_type: RangeType,
}

/// Continuous setpoint range clause of a standard (HVDC/injection) action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StandardRange {
    pub min: f64,
    pub max: f64,
    pub range_type: RangeType,
}

/// Phase-shifting transformer payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PstData {
    /// Tap position to phase angle (degrees). Not assumed monotonic.
    pub tap_to_angle: BTreeMap<i32, f64>,
    /// Tap range clauses.
    pub ranges: Vec<TapRange>,
}

impl PstData {
    /// Angle of a tap position; the tap must exist in the map.
    pub fn angle(&self, tap: i32) -> RaoResult<f64> {
        self.tap_to_angle
            .get(&tap)
            .copied()
            .ok_or_else(|| RaoError::data(format!("tap {tap} outside of tap-to-angle map")))
    }

    /// Lowest tap position of the map.
    pub fn lowest_tap(&self) -> RaoResult<i32> {
        self.tap_to_angle
            .keys()
            .next()
            .copied()
            .ok_or_else(|| RaoError::data("empty tap-to-angle map"))
    }

    /// Highest tap position of the map.
    pub fn highest_tap(&self) -> RaoResult<i32> {
        self.tap_to_angle
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| RaoError::data("empty tap-to-angle map"))
    }

    /// Smallest absolute angle difference between two consecutive taps.
    /// Used to convert relative tap counts into conservative angle deltas.
    pub fn smallest_angle_step(&self) -> RaoResult<f64> {
        let angles: Vec<f64> = self.tap_to_angle.values().copied().collect();
        if angles.len() < 2 {
            return Err(RaoError::data("tap-to-angle map needs at least two taps"));
        }
        let mut smallest = f64::INFINITY;
        for pair in angles.windows(2) {
            let step = (pair[1] - pair[0]).abs();
            if step < smallest {
                smallest = step;
            }
        }
        Ok(smallest)
    }

    /// Admissible tap interval given the initial-network tap, intersecting
    /// `Absolute` and `RelativeToInitialNetwork` clauses. Clauses with
    /// swapped bounds are normalized before intersecting.
    pub fn admissible_tap_interval(&self, initial_tap: i32) -> RaoResult<(i32, i32)> {
        let mut min_tap = self.lowest_tap()?;
        let mut max_tap = self.highest_tap()?;
        for range in &self.ranges {
            let (lo, hi) = ordered(range.min_tap, range.max_tap);
            match range.range_type {
                RangeType::Absolute => {
                    min_tap = min_tap.max(lo);
                    max_tap = max_tap.min(hi);
                }
                RangeType::RelativeToInitialNetwork => {
                    min_tap = min_tap.max(initial_tap + lo);
                    max_tap = max_tap.min(initial_tap + hi);
                }
                RangeType::RelativeToPreviousInstant | RangeType::RelativeToPreviousTimeStep => {}
            }
        }
        Ok((min_tap, max_tap))
    }

    /// Relative tap bounds against the previous instant, intersected over
    /// all `RelativeToPreviousInstant` clauses and clamped so that keeping
    /// the previous position always stays feasible.
    pub fn relative_tap_interval(&self) -> Option<(i32, i32)> {
        let mut bounds: Option<(i32, i32)> = None;
        for range in &self.ranges {
            if range.range_type == RangeType::RelativeToPreviousInstant {
                let (lo, hi) = ordered(range.min_tap, range.max_tap);
                let (cur_lo, cur_hi) = bounds.unwrap_or((i32::MIN, i32::MAX));
                bounds = Some((cur_lo.max(lo), cur_hi.min(hi)));
            }
        }
        bounds.map(|(lo, hi)| (lo.min(0), hi.max(0)))
    }

    /// Relative tap bounds against the previous study period.
    pub fn timestep_tap_interval(&self) -> Option<(i32, i32)> {
        let mut bounds: Option<(i32, i32)> = None;
        for range in &self.ranges {
            if range.range_type == RangeType::RelativeToPreviousTimeStep {
                let (lo, hi) = ordered(range.min_tap, range.max_tap);
                let (cur_lo, cur_hi) = bounds.unwrap_or((i32::MIN, i32::MAX));
                bounds = Some((cur_lo.max(lo), cur_hi.min(hi)));
            }
        }
        bounds.map(|(lo, hi)| (lo.min(0), hi.max(0)))
    }

    /// Admissible setpoint (angle) interval for the given initial tap.
    /// Tap-to-angle maps are not assumed monotonic, so the angle interval is
    /// the min/max of the two endpoint angles.
    pub fn admissible_setpoint_range(&self, initial_tap: i32) -> RaoResult<(f64, f64)> {
        let (min_tap, max_tap) = self.admissible_tap_interval(initial_tap)?;
        let a = self.angle(min_tap)?;
        let b = self.angle(max_tap)?;
        Ok((a.min(b), a.max(b)))
    }
}

/// HVDC (or other continuous standard action) payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HvdcData {
    /// Setpoint range clauses (MW).
    pub ranges: Vec<StandardRange>,
}

/// Injection payload: continuous setpoint distributed over network elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionData {
    /// Setpoint range clauses (MW).
    pub ranges: Vec<StandardRange>,
    /// Distribution key per injected network element.
    pub distribution_keys: BTreeMap<NetworkElementId, f64>,
}

impl InjectionData {
    /// Sum of the distribution keys, used for balance constraints.
    pub fn key_sum(&self) -> f64 {
        self.distribution_keys.values().sum()
    }
}

/// Tagged payload of a remedial action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeActionKind {
    Pst(PstData),
    Hvdc(HvdcData),
    Injection(InjectionData),
}

impl RangeActionKind {
    fn standard_ranges(&self) -> Option<&[StandardRange]> {
        match self {
            RangeActionKind::Pst(_) => None,
            RangeActionKind::Hvdc(d) => Some(&d.ranges),
            RangeActionKind::Injection(d) => Some(&d.ranges),
        }
    }
}

/// An adjustable grid control available to the optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeAction {
    /// Unique identifier.
    pub id: ActionId,
    /// Owning operator.
    pub operator: TsoId,
    /// Alignment group of ganged actions, if any.
    pub group: Option<GroupId>,
    /// Fixed cost of activating the action at all.
    pub activation_cost: Option<f64>,
    /// Cost per unit of upward setpoint variation.
    pub upward_variation_cost: Option<f64>,
    /// Cost per unit of downward setpoint variation.
    pub downward_variation_cost: Option<f64>,
    /// Network elements this action acts on.
    pub network_elements: BTreeSet<NetworkElementId>,
    /// Payload with kind-specific ranges and data.
    pub kind: RangeActionKind,
}

impl RangeAction {
    /// Whether this action is a phase-shifting transformer.
    pub fn is_pst(&self) -> bool {
        matches!(self.kind, RangeActionKind::Pst(_))
    }

    /// PST payload, if this action is one.
    pub fn pst(&self) -> Option<&PstData> {
        match &self.kind {
            RangeActionKind::Pst(d) => Some(d),
            RangeActionKind::Hvdc(_) | RangeActionKind::Injection(_) => None,
        }
    }

    /// Injection payload, if this action is one.
    pub fn injection(&self) -> Option<&InjectionData> {
        match &self.kind {
            RangeActionKind::Injection(d) => Some(d),
            RangeActionKind::Pst(_) | RangeActionKind::Hvdc(_) => None,
        }
    }

    /// Whether the two actions act on the exact same network elements.
    /// Used to deduplicate occurrences of one physical device declared as
    /// several catalog entries across instants.
    pub fn same_network_elements(&self, other: &RangeAction) -> bool {
        self.network_elements == other.network_elements
    }

    /// Admissible setpoint interval around the pre-perimeter position,
    /// intersecting `Absolute` and `RelativeToInitialNetwork` clauses.
    ///
    /// For PSTs the pre-perimeter position is the initial tap; for standard
    /// actions it is the initial setpoint in MW.
    pub fn admissible_setpoint_range(
        &self,
        initial_setpoint: f64,
        initial_tap: Option<i32>,
    ) -> RaoResult<(f64, f64)> {
        match &self.kind {
            RangeActionKind::Pst(pst) => {
                let tap = initial_tap.ok_or_else(|| {
                    RaoError::data(format!("missing initial tap for PST {}", self.id))
                })?;
                pst.admissible_setpoint_range(tap)
            }
            RangeActionKind::Hvdc(_) | RangeActionKind::Injection(_) => {
                let ranges = self.kind.standard_ranges().unwrap_or_default();
                let mut lo = f64::NEG_INFINITY;
                let mut hi = f64::INFINITY;
                for range in ranges {
                    match range.range_type {
                        RangeType::Absolute => {
                            lo = lo.max(range.min);
                            hi = hi.min(range.max);
                        }
                        RangeType::RelativeToInitialNetwork => {
                            lo = lo.max(initial_setpoint + range.min);
                            hi = hi.min(initial_setpoint + range.max);
                        }
                        RangeType::RelativeToPreviousInstant
                        | RangeType::RelativeToPreviousTimeStep => {}
                    }
                }
                Ok((lo, hi))
            }
        }
    }

    /// Setpoint delta bounds against the previous instant, intersected over
    /// all `RelativeToPreviousInstant` clauses. `None` when no such clause
    /// exists. PST deltas are converted to angles through the smallest
    /// angle step (conservative for non-uniform maps).
    pub fn relative_setpoint_range(&self) -> RaoResult<Option<(f64, f64)>> {
        match &self.kind {
            RangeActionKind::Pst(pst) => match pst.relative_tap_interval() {
                Some((lo, hi)) => {
                    let step = pst.smallest_angle_step()?;
                    Ok(Some((f64::from(lo) * step, f64::from(hi) * step)))
                }
                None => Ok(None),
            },
            RangeActionKind::Hvdc(_) | RangeActionKind::Injection(_) => {
                let ranges = self.kind.standard_ranges().unwrap_or_default();
                let mut bounds: Option<(f64, f64)> = None;
                for range in ranges {
                    if range.range_type == RangeType::RelativeToPreviousInstant {
                        let (lo, hi) = bounds.unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
                        bounds = Some((lo.max(range.min), hi.min(range.max)));
                    }
                }
                Ok(bounds.map(|(lo, hi)| (lo.min(0.0), hi.max(0.0))))
            }
        }
    }

    /// Setpoint delta bounds against the previous study period.
    pub fn timestep_setpoint_range(&self) -> Option<(f64, f64)> {
        let ranges = self.kind.standard_ranges()?;
        let mut bounds: Option<(f64, f64)> = None;
        for range in ranges {
            if range.range_type == RangeType::RelativeToPreviousTimeStep {
                let (lo, hi) = bounds.unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
                bounds = Some((lo.max(range.min), hi.min(range.max)));
            }
        }
        bounds.map(|(lo, hi)| (lo.min(0.0), hi.max(0.0)))
    }
}

fn ordered(a: i32, b: i32) -> (i32, i32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pst_map(taps: std::ops::RangeInclusive<i32>, step: f64) -> BTreeMap<i32, f64> {
        taps.map(|t| (t, f64::from(t) * step)).collect()
    }

    fn pst_action(ranges: Vec<TapRange>) -> RangeAction {
        RangeAction {
            id: ActionId::from("pst1"),
            operator: TsoId::from("operator1"),
            group: None,
            activation_cost: None,
            upward_variation_cost: None,
            downward_variation_cost: None,
            network_elements: [NetworkElementId::from("pst1_ne")].into_iter().collect(),
            kind: RangeActionKind::Pst(PstData {
                tap_to_angle: pst_map(-16..=16, 0.3125),
                ranges,
            }),
        }
    }

    #[test]
    fn test_tap_interval_intersects_absolute_and_initial_relative() {
        let action = pst_action(vec![
            TapRange { min_tap: -10, max_tap: 10, range_type: RangeType::Absolute },
            TapRange {
                min_tap: -5,
                max_tap: 12,
                range_type: RangeType::RelativeToInitialNetwork,
            },
            // must not affect the absolute interval
            TapRange {
                min_tap: -2,
                max_tap: 2,
                range_type: RangeType::RelativeToPreviousInstant,
            },
        ]);
        let pst = action.pst().unwrap();
        // initial tap 3: relative-to-initial clause gives [-2, 15], absolute
        // clause gives [-10, 10], map gives [-16, 16]
        assert_eq!(pst.admissible_tap_interval(3).unwrap(), (-2, 10));
    }

    #[test]
    fn test_tap_interval_normalizes_swapped_bounds() {
        let action = pst_action(vec![TapRange {
            min_tap: 10,
            max_tap: -10,
            range_type: RangeType::Absolute,
        }]);
        assert_eq!(action.pst().unwrap().admissible_tap_interval(0).unwrap(), (-10, 10));
    }

    #[test]
    fn test_setpoint_range_non_monotonic_map() {
        // angles decrease with tap: angle interval must still be ordered
        let tap_to_angle: BTreeMap<i32, f64> = (-2..=2).map(|t| (t, f64::from(-t))).collect();
        let pst = PstData { tap_to_angle, ranges: vec![] };
        let (lo, hi) = pst.admissible_setpoint_range(0).unwrap();
        assert_eq!((lo, hi), (-2.0, 2.0));
    }

    #[test]
    fn test_relative_tap_interval_keeps_zero_feasible() {
        let action = pst_action(vec![TapRange {
            min_tap: 1,
            max_tap: 3,
            range_type: RangeType::RelativeToPreviousInstant,
        }]);
        // clamped so "do not move" stays admissible
        assert_eq!(action.pst().unwrap().relative_tap_interval(), Some((0, 3)));
    }

    #[test]
    fn test_relative_setpoint_scales_by_smallest_step() {
        let action = pst_action(vec![TapRange {
            min_tap: -2,
            max_tap: 2,
            range_type: RangeType::RelativeToPreviousInstant,
        }]);
        let (lo, hi) = action.relative_setpoint_range().unwrap().unwrap();
        assert!((lo + 2.0 * 0.3125).abs() < 1e-9);
        assert!((hi - 2.0 * 0.3125).abs() < 1e-9);
    }

    #[test]
    fn test_standard_admissible_range() {
        let action = RangeAction {
            id: ActionId::from("hvdc1"),
            operator: TsoId::from("operator1"),
            group: None,
            activation_cost: None,
            upward_variation_cost: None,
            downward_variation_cost: None,
            network_elements: [NetworkElementId::from("hvdc1_ne")].into_iter().collect(),
            kind: RangeActionKind::Hvdc(HvdcData {
                ranges: vec![
                    StandardRange { min: -500.0, max: 500.0, range_type: RangeType::Absolute },
                    StandardRange {
                        min: -300.0,
                        max: 300.0,
                        range_type: RangeType::RelativeToInitialNetwork,
                    },
                ],
            }),
        };
        let (lo, hi) = action.admissible_setpoint_range(250.0, None).unwrap();
        assert_eq!((lo, hi), (-50.0, 500.0));
    }

    #[test]
    fn test_missing_tap_is_data_error() {
        let action = pst_action(vec![]);
        let err = action.pst().unwrap().angle(99).unwrap_err();
        assert!(err.to_string().contains("tap 99"));
    }
}
