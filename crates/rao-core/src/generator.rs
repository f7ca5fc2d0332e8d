//! Physical constraints of dispatchable generators.

use crate::id::{GeneratorId, NetworkElementId};
use serde::{Deserialize, Serialize};

/// Physical constraints of one dispatchable generator, used by the
/// commitment filler: power bounds, start/stop lead and lag times, and
/// ramp-rate gradients. Times are in hours, powers in MW, gradients in
/// MW per hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConstraints {
    /// Generator identifier.
    pub id: GeneratorId,
    /// Network element carrying the injection.
    pub network_element: NetworkElementId,
    /// Minimum stable power when on.
    pub p_min: f64,
    /// Maximum power.
    pub p_max: f64,
    /// Time needed to go from off to minimum stable power.
    pub lead_time: Option<f64>,
    /// Time needed to go from minimum stable power to off.
    pub lag_time: Option<f64>,
    /// Maximum upward power change per hour when on.
    pub upward_gradient: Option<f64>,
    /// Maximum downward power change per hour when on (positive value).
    pub downward_gradient: Option<f64>,
}

impl GeneratorConstraints {
    /// Whether the generator needs a ramp-up phase spanning several study
    /// periods when the gap to the next period is shorter than its lead
    /// time.
    pub fn needs_ramp_up(&self, gap_hours: f64) -> bool {
        self.lead_time.is_some_and(|lead| lead > gap_hours)
    }

    /// Symmetric check for the ramp-down phase.
    pub fn needs_ramp_down(&self, gap_hours: f64) -> bool {
        self.lag_time.is_some_and(|lag| lag > gap_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_phases_depend_on_gap() {
        let gen = GeneratorConstraints {
            id: GeneratorId::from("gen1"),
            network_element: NetworkElementId::from("gen1_ne"),
            p_min: 100.0,
            p_max: 1000.0,
            lead_time: Some(3.0),
            lag_time: None,
            upward_gradient: Some(200.0),
            downward_gradient: Some(200.0),
        };
        assert!(gen.needs_ramp_up(2.0));
        assert!(!gen.needs_ramp_up(3.0));
        assert!(!gen.needs_ramp_down(0.5));
    }
}
