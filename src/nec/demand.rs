use crate::domain::Phase;

use super::tables::{
    EV_MIN_LOAD_VA, MULTIFAMILY_DEMAND_FACTORS, OPTIONAL_METHOD_MIN_UNITS, PANEL_SPACES,
};

/// Optional-method demand factor for a multi-family building.
///
/// Below three units the optional method does not apply and the factor is 1.0.
/// Otherwise the first breakpoint whose upper bound is at least `units` wins.
pub fn demand_factor_for_unit_count(units: u32) -> f64 {
    if units < OPTIONAL_METHOD_MIN_UNITS {
        return 1.0;
    }
    MULTIFAMILY_DEMAND_FACTORS
        .iter()
        .find(|(max_units, _)| *max_units >= units)
        .map(|(_, factor)| *factor)
        .unwrap_or(0.23)
}

/// Branch-circuit load of one EVSE: nameplate VA with a 7200 VA floor
pub fn per_charger_load_va(nameplate_amps: f64, voltage: f64) -> f64 {
    (nameplate_amps * voltage).max(EV_MIN_LOAD_VA)
}

/// Line current for a load in VA
pub fn amps(va: f64, voltage: f64, phase: Phase) -> f64 {
    let denominator = voltage * phase.factor();
    if denominator <= 0.0 {
        return 0.0;
    }
    va / denominator
}

/// Apparent power capacity of a service or feeder
pub fn service_capacity_va(amps: f64, voltage: f64, phase: Phase) -> f64 {
    amps * voltage * phase.factor()
}

/// Smallest table entry at or above `amps`.
///
/// Returns the largest entry when nothing qualifies; callers treat that as a
/// ceiling signal rather than an error.
pub fn round_up_to_standard_size(amps: f64, table: &[u32]) -> u32 {
    table
        .iter()
        .copied()
        .find(|size| *size as f64 >= amps)
        .or_else(|| table.last().copied())
        .unwrap_or(0)
}

/// Whether `amps` exceeds every entry of `table`
pub fn exceeds_table(amps: f64, table: &[u32]) -> bool {
    table.last().map_or(true, |max| amps > *max as f64)
}

/// Panelboard space count that fits the poles in use plus roughly 20% spare
pub fn panel_spaces_for(poles_used: u32) -> u32 {
    let wanted = (poles_used as f64 * 1.2).ceil();
    round_up_to_standard_size(wanted, PANEL_SPACES)
}
