//! Shared fixtures for the filler tests.

use crate::filler::FillerInputs;
use crate::inputs::OptimizationContext;
use rao_core::{
    ActionId, ActivationSnapshot, CnecId, FlowBound, FlowCnec, HvdcData, InjectionData,
    NetworkElementId, PstData, RangeAction, RangeActionKind, RangeType, SensitivitySnapshot,
    SetpointSnapshot, Side, StandardRange, State, TsoId, Unit,
};
use std::collections::BTreeMap;

pub(crate) fn inputs<'a>(
    sensitivities: &'a SensitivitySnapshot,
    activations: &'a ActivationSnapshot,
) -> FillerInputs<'a> {
    FillerInputs { sensitivities, activations }
}

/// Preventive CNEC monitored on side one, with megawatt bounds.
pub(crate) fn mw_cnec(id: &str, min: f64, max: f64) -> FlowCnec {
    FlowCnec {
        id: CnecId::from(id),
        network_element: NetworkElementId::from(format!("{id}_ne").as_str()),
        state: State::preventive(),
        operator: TsoId::from("operator1"),
        bounds: vec![FlowBound {
            side: Side::One,
            min: Some(min),
            max: Some(max),
            unit: Unit::Megawatt,
        }],
        nominal_voltage_kv: 380.0,
        optimized: true,
        monitored: false,
        loop_flow_threshold_mw: None,
    }
}

/// Monitored-only element (soft MNEC constraints, no margin objective).
pub(crate) fn monitored_cnec(id: &str, min: f64, max: f64) -> FlowCnec {
    let mut cnec = mw_cnec(id, min, max);
    cnec.optimized = false;
    cnec.monitored = true;
    cnec
}

/// Same monitored element with ampere bounds (380 kV nominal voltage).
pub(crate) fn ampere_cnec(id: &str, min: f64, max: f64) -> FlowCnec {
    let mut cnec = mw_cnec(id, min, max);
    cnec.bounds[0].unit = Unit::Ampere;
    cnec
}

/// Symmetric tap-to-angle map `-half..=half`, angle `tap · step` degrees,
/// no range clause (the whole map is admissible).
pub(crate) fn uniform_pst_data(half: i32, step: f64) -> PstData {
    PstData {
        tap_to_angle: (-half..=half).map(|t| (t, f64::from(t) * step)).collect(),
        ranges: vec![],
    }
}

pub(crate) fn pst_action(id: &str, data: PstData) -> RangeAction {
    RangeAction {
        id: ActionId::from(id),
        operator: TsoId::from("operator1"),
        group: None,
        activation_cost: None,
        upward_variation_cost: None,
        downward_variation_cost: None,
        network_elements: [NetworkElementId::from(format!("{id}_ne").as_str())]
            .into_iter()
            .collect(),
        kind: RangeActionKind::Pst(data),
    }
}

pub(crate) fn hvdc_action(id: &str, min: f64, max: f64) -> RangeAction {
    RangeAction {
        id: ActionId::from(id),
        operator: TsoId::from("operator1"),
        group: None,
        activation_cost: None,
        upward_variation_cost: None,
        downward_variation_cost: None,
        network_elements: [NetworkElementId::from(format!("{id}_ne").as_str())]
            .into_iter()
            .collect(),
        kind: RangeActionKind::Hvdc(HvdcData {
            ranges: vec![StandardRange { min, max, range_type: RangeType::Absolute }],
        }),
    }
}

pub(crate) fn injection_action(id: &str, min: f64, max: f64, key: f64) -> RangeAction {
    RangeAction {
        id: ActionId::from(id),
        operator: TsoId::from("operator1"),
        group: None,
        activation_cost: None,
        upward_variation_cost: None,
        downward_variation_cost: None,
        network_elements: [NetworkElementId::from(format!("{id}_ne").as_str())]
            .into_iter()
            .collect(),
        kind: RangeActionKind::Injection(InjectionData {
            ranges: vec![StandardRange { min, max, range_type: RangeType::Absolute }],
            distribution_keys: [(NetworkElementId::from(format!("{id}_ne").as_str()), key)]
                .into_iter()
                .collect(),
        }),
    }
}

pub(crate) fn simple_context(
    cnecs: Vec<FlowCnec>,
    actions_per_state: BTreeMap<State, Vec<RangeAction>>,
    pre_perimeter: SetpointSnapshot,
) -> OptimizationContext {
    OptimizationContext::new(cnecs, actions_per_state, pre_perimeter)
}
