//! Engine parameters.
//!
//! Plain serde-derived structs with sensible defaults, loadable from JSON by
//! the orchestration layer. Every filler takes the parameter struct it needs
//! by value at construction.

use rao_core::{ActionId, CnecId, RangeActionKind, TsoId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Parameters of the core flow/range filler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeActionParameters {
    /// Sensitivity below which a PST term is dropped from flow constraints.
    pub pst_sensitivity_threshold: f64,
    /// Sensitivity below which an HVDC term is dropped.
    pub hvdc_sensitivity_threshold: f64,
    /// Sensitivity below which an injection term is dropped.
    pub injection_sensitivity_threshold: f64,
    /// Objective penalty per unit of PST setpoint variation.
    pub pst_penalty_cost: f64,
    /// Objective penalty per unit of HVDC setpoint variation.
    pub hvdc_penalty_cost: f64,
    /// Objective penalty per unit of injection setpoint variation.
    pub injection_penalty_cost: f64,
    /// Enable the trust-region range shrinking between sensitivity
    /// iterations.
    pub range_shrinking: bool,
    /// Cost-driven mode: use declared activation/variation costs instead of
    /// the small penalty costs.
    pub cost_optimization: bool,
}

impl Default for RangeActionParameters {
    fn default() -> Self {
        RangeActionParameters {
            pst_sensitivity_threshold: 1e-6,
            hvdc_sensitivity_threshold: 1e-6,
            injection_sensitivity_threshold: 1e-6,
            pst_penalty_cost: 0.01,
            hvdc_penalty_cost: 0.001,
            injection_penalty_cost: 0.001,
            range_shrinking: false,
            cost_optimization: false,
        }
    }
}

impl RangeActionParameters {
    /// Sensitivity threshold for an action kind.
    pub fn sensitivity_threshold(&self, kind: &RangeActionKind) -> f64 {
        match kind {
            RangeActionKind::Pst(_) => self.pst_sensitivity_threshold,
            RangeActionKind::Hvdc(_) => self.hvdc_sensitivity_threshold,
            RangeActionKind::Injection(_) => self.injection_sensitivity_threshold,
        }
    }

    /// Variation penalty cost for an action kind.
    pub fn penalty_cost(&self, kind: &RangeActionKind) -> f64 {
        match kind {
            RangeActionKind::Pst(_) => self.pst_penalty_cost,
            RangeActionKind::Hvdc(_) => self.hvdc_penalty_cost,
            RangeActionKind::Injection(_) => self.injection_penalty_cost,
        }
    }
}

/// Parameters of the relative-margin objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelativeMarginParameters {
    /// Floor applied to absolute zonal PTDF sums to avoid division blow-up.
    pub ptdf_sum_lower_bound: f64,
}

impl Default for RelativeMarginParameters {
    fn default() -> Self {
        RelativeMarginParameters { ptdf_sum_lower_bound: 0.01 }
    }
}

/// Parameters of the MNEC soft constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MnecParameters {
    /// Tolerated margin decrease below the initial flow (MW).
    pub acceptable_margin_decrease: f64,
    /// Objective cost per MW of violation (split over monitored sides).
    pub violation_cost: f64,
    /// Security margin subtracted from the computed bound (MW).
    pub constraint_adjustment_coefficient: f64,
}

impl Default for MnecParameters {
    fn default() -> Self {
        MnecParameters {
            acceptable_margin_decrease: 50.0,
            violation_cost: 10.0,
            constraint_adjustment_coefficient: 0.0,
        }
    }
}

/// Parameters of the loop-flow soft constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopFlowParameters {
    /// Tolerated loop-flow increase above the initial value (MW).
    pub acceptable_increase: f64,
    /// Objective cost per MW of violation.
    pub violation_cost: f64,
    /// Security margin subtracted from the computed bound (MW).
    pub constraint_adjustment_coefficient: f64,
}

impl Default for LoopFlowParameters {
    fn default() -> Self {
        LoopFlowParameters {
            acceptable_increase: 0.0,
            violation_cost: 10.0,
            constraint_adjustment_coefficient: 0.0,
        }
    }
}

/// Parameters releasing selected elements from the margin objective.
///
/// Two mutually exclusive rules: elements of listed operators may keep
/// their pre-perimeter margin, or elements mapped to a securing range
/// action stay unoptimized while that action can still protect them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnoptimizedCnecParameters {
    /// Operators whose elements are not degraded past their pre-perimeter
    /// margin instead of being optimized.
    pub operators_not_to_optimize: BTreeSet<TsoId>,
    /// Elements left out of the objective as long as the mapped range
    /// action can secure them. Takes precedence over the operator rule.
    pub cnecs_secured_by_range_action: BTreeMap<CnecId, ActionId>,
}

/// Usage limits of one constrained state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageLimits {
    /// Maximum number of used remedial actions.
    pub max_range_actions: Option<usize>,
    /// Maximum number of operators with used actions.
    pub max_tso: Option<usize>,
    /// Operators exempted from the max-TSO count.
    pub max_tso_exclusions: Vec<TsoId>,
    /// Per-operator cap on used actions.
    pub max_range_actions_per_tso: BTreeMap<TsoId, usize>,
    /// Per-operator cap on used PSTs.
    pub max_pst_per_tso: BTreeMap<TsoId, usize>,
    /// Per-operator cap on summed tap movements.
    pub max_elementary_actions_per_tso: BTreeMap<TsoId, usize>,
}

impl UsageLimits {
    /// Whether no limit is set at all (the filler skips the state).
    pub fn is_empty(&self) -> bool {
        self.max_range_actions.is_none()
            && self.max_tso.is_none()
            && self.max_range_actions_per_tso.is_empty()
            && self.max_pst_per_tso.is_empty()
            && self.max_elementary_actions_per_tso.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = RangeActionParameters::default();
        assert_eq!(p.pst_penalty_cost, 0.01);
        assert_eq!(p.pst_sensitivity_threshold, 1e-6);
        assert!(!p.range_shrinking);

        let m = MnecParameters::default();
        assert_eq!(m.acceptable_margin_decrease, 50.0);
    }

    #[test]
    fn test_parameters_from_json() {
        let p: RangeActionParameters =
            serde_json::from_str(r#"{"pst_penalty_cost": 0.02, "range_shrinking": true}"#)
                .unwrap();
        assert_eq!(p.pst_penalty_cost, 0.02);
        assert!(p.range_shrinking);
        // untouched fields keep their defaults
        assert_eq!(p.hvdc_penalty_cost, 0.001);
    }

    #[test]
    fn test_usage_limits_emptiness() {
        assert!(UsageLimits::default().is_empty());
        let limits = UsageLimits { max_range_actions: Some(2), ..Default::default() };
        assert!(!limits.is_empty());
    }
}
