//! Monitored flow elements (CNECs) and their bounds.

use crate::id::{CnecId, NetworkElementId, TsoId};
use crate::state::State;
use serde::{Deserialize, Serialize};

/// Side of a branch from which the flow is monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    One,
    Two,
}

impl Side {
    /// Both sides, in deterministic order.
    pub const BOTH: [Side; 2] = [Side::One, Side::Two];
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::One => write!(f, "one"),
            Side::Two => write!(f, "two"),
        }
    }
}

/// Unit in which a flow bound is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Megawatt,
    Ampere,
}

impl Unit {
    /// Multiplier converting a value in `self` into megawatts for a branch
    /// at the given nominal voltage (kV): MW = value × multiplier.
    ///
    /// For amperes this is `nominalV·√3/1000`; for megawatts it is 1.
    pub fn flow_unit_multiplier(&self, nominal_voltage_kv: f64) -> f64 {
        match self {
            Unit::Megawatt => 1.0,
            Unit::Ampere => nominal_voltage_kv * 3.0_f64.sqrt() / 1000.0,
        }
    }
}

/// Flow bounds of one monitored side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowBound {
    /// Monitored side.
    pub side: Side,
    /// Lower flow bound, if any, in `unit`.
    pub min: Option<f64>,
    /// Upper flow bound, if any, in `unit`.
    pub max: Option<f64>,
    /// Unit of the bounds.
    pub unit: Unit,
}

/// A monitored flow element: a network branch side with physical bounds,
/// owned by an operator, attached to one optimization state.
///
/// Ordering is by identifier so that iteration over CNEC collections is
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowCnec {
    /// Unique identifier.
    pub id: CnecId,
    /// Underlying network element.
    pub network_element: NetworkElementId,
    /// State in which this element is monitored.
    pub state: State,
    /// Owning operator.
    pub operator: TsoId,
    /// Bounds per monitored side.
    pub bounds: Vec<FlowBound>,
    /// Nominal voltage (kV), used for ampere/megawatt conversion.
    pub nominal_voltage_kv: f64,
    /// Whether this element participates in the objective (margin
    /// optimization).
    pub optimized: bool,
    /// Whether this element is monitored: kept above its physical bounds by
    /// soft constraints instead of entering the margin objective.
    pub monitored: bool,
    /// Loop-flow threshold (MW), for elements under loop-flow control.
    pub loop_flow_threshold_mw: Option<f64>,
}

impl FlowCnec {
    /// Monitored sides, in deterministic order.
    pub fn monitored_sides(&self) -> impl Iterator<Item = Side> + '_ {
        let mut sides: Vec<Side> = self.bounds.iter().map(|b| b.side).collect();
        sides.sort();
        sides.dedup();
        sides.into_iter()
    }

    /// Bounds of the given side, if it is monitored.
    pub fn bound(&self, side: Side) -> Option<&FlowBound> {
        self.bounds.iter().find(|b| b.side == side)
    }

    /// Lower flow bound of a side converted to megawatts.
    pub fn min_flow_mw(&self, side: Side) -> Option<f64> {
        let bound = self.bound(side)?;
        let mult = bound.unit.flow_unit_multiplier(self.nominal_voltage_kv);
        bound.min.map(|v| v * mult)
    }

    /// Upper flow bound of a side converted to megawatts.
    pub fn max_flow_mw(&self, side: Side) -> Option<f64> {
        let bound = self.bound(side)?;
        let mult = bound.unit.flow_unit_multiplier(self.nominal_voltage_kv);
        bound.max.map(|v| v * mult)
    }

    /// Multiplier converting the margin of a side into the bound's unit.
    pub fn unit_multiplier(&self, side: Side) -> f64 {
        match self.bound(side) {
            Some(b) => b.unit.flow_unit_multiplier(self.nominal_voltage_kv),
            None => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cnec(bounds: Vec<FlowBound>) -> FlowCnec {
        FlowCnec {
            id: CnecId::from("cnec1"),
            network_element: NetworkElementId::from("line1"),
            state: State::preventive(),
            operator: TsoId::from("operator1"),
            bounds,
            nominal_voltage_kv: 380.0,
            optimized: true,
            monitored: false,
            loop_flow_threshold_mw: None,
        }
    }

    #[test]
    fn test_megawatt_bounds_pass_through() {
        let c = cnec(vec![FlowBound {
            side: Side::One,
            min: Some(-1000.0),
            max: Some(1000.0),
            unit: Unit::Megawatt,
        }]);
        assert_eq!(c.min_flow_mw(Side::One), Some(-1000.0));
        assert_eq!(c.max_flow_mw(Side::One), Some(1000.0));
        assert_eq!(c.min_flow_mw(Side::Two), None);
    }

    #[test]
    fn test_ampere_unit_multiplier() {
        // 380 kV: 380·√3/1000 ≈ 0.658179
        let mult = Unit::Ampere.flow_unit_multiplier(380.0);
        assert!((mult - 0.658_179).abs() < 1e-5);

        let c = cnec(vec![FlowBound {
            side: Side::Two,
            min: None,
            max: Some(1000.0),
            unit: Unit::Ampere,
        }]);
        let max_mw = c.max_flow_mw(Side::Two).unwrap();
        assert!((max_mw - 658.179).abs() < 1e-2);
    }

    #[test]
    fn test_monitored_sides_deterministic() {
        let c = cnec(vec![
            FlowBound { side: Side::Two, min: None, max: Some(10.0), unit: Unit::Megawatt },
            FlowBound { side: Side::One, min: Some(-10.0), max: None, unit: Unit::Megawatt },
        ]);
        let sides: Vec<Side> = c.monitored_sides().collect();
        assert_eq!(sides, vec![Side::One, Side::Two]);
    }
}
