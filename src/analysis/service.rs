use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{BuildingProfile, ChargerClass, EvChargerRequest};
use crate::nec::tables::{EVEMS_SETPOINT_FRACTION, SERVICE_SIZES, SERVICE_SIZING_FACTOR};
use crate::nec::{amps, per_charger_load_va, round_up_to_standard_size, service_capacity_va};

/// Aggregate EV charging load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvLoad {
    pub charger_count: u32,
    pub amps_per_charger: f64,
    /// 208 V on three-phase services, 240 V otherwise
    pub ev_voltage: f64,
    pub charger_class: ChargerClass,
    pub per_charger_va: f64,
    pub total_connected_va: f64,
    /// Load counted against the service; equals connected unless load-managed
    pub demand_va: f64,
    pub load_managed: bool,
}

/// Existing service versus building + EV demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAnalysis {
    pub existing_service_amps: u32,
    pub capacity_va: f64,
    pub building_demand_va: f64,
    pub building_demand_amps: f64,
    pub ev_demand_va: f64,
    pub total_demand_va: f64,
    pub total_demand_amps: f64,
    /// May be negative when the building already exceeds its service
    pub available_capacity_va: f64,
    pub available_capacity_amps: f64,
    pub utilization_percent: f64,
    pub upgrade_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_service_amps: Option<u32>,
    pub verdict: String,
}

/// Capacity left for EV charging once the building demand is served
pub fn available_capacity_va(profile: &BuildingProfile, building_demand_va: f64) -> f64 {
    existing_capacity_va(profile) - building_demand_va
}

pub fn existing_capacity_va(profile: &BuildingProfile) -> f64 {
    service_capacity_va(
        profile.existing_service_amps as f64,
        profile.voltage.volts(),
        profile.phase,
    )
}

/// EV load with the full connected load counted, no demand factor.
///
/// With load management the counted demand is capped at the EVEMS setpoint
/// (90% of the capacity still available).
pub fn calculate_ev_load(
    profile: &BuildingProfile,
    request: &EvChargerRequest,
    load_management: bool,
    building_demand_va: f64,
) -> EvLoad {
    let ev_voltage = profile.branch_voltage();
    let amps_per_charger = request.amps();
    let per_charger_va = per_charger_load_va(amps_per_charger, ev_voltage);
    let total_connected_va = per_charger_va * request.charger_count as f64;

    let demand_va = if load_management {
        let setpoint =
            available_capacity_va(profile, building_demand_va).max(0.0) * EVEMS_SETPOINT_FRACTION;
        total_connected_va.min(setpoint)
    } else {
        total_connected_va
    };

    EvLoad {
        charger_count: request.charger_count,
        amps_per_charger,
        ev_voltage,
        charger_class: request.class(),
        per_charger_va,
        total_connected_va,
        demand_va,
        load_managed: load_management,
    }
}

/// Compare building + EV demand with the existing service
pub fn analyze_service(
    profile: &BuildingProfile,
    building_demand_va: f64,
    ev: &EvLoad,
) -> ServiceAnalysis {
    let voltage = profile.voltage.volts();
    let capacity_va = existing_capacity_va(profile);
    let available_va = capacity_va - building_demand_va;
    let total_demand_va = building_demand_va + ev.demand_va;
    let total_demand_amps = amps(total_demand_va, voltage, profile.phase);
    let utilization_percent = if capacity_va > 0.0 {
        total_demand_va / capacity_va * 100.0
    } else {
        0.0
    };

    let upgrade_required = utilization_percent > 100.0;
    let recommended_service_amps = upgrade_required.then(|| {
        round_up_to_standard_size(total_demand_amps * SERVICE_SIZING_FACTOR, SERVICE_SIZES)
    });

    let remaining_amps = profile.existing_service_amps as f64 - total_demand_amps;
    let verdict = capacity_verdict(utilization_percent, remaining_amps);

    debug!(
        capacity_va,
        total_demand_va, utilization_percent, upgrade_required, "service analysis complete"
    );

    ServiceAnalysis {
        existing_service_amps: profile.existing_service_amps,
        capacity_va,
        building_demand_va,
        building_demand_amps: amps(building_demand_va, voltage, profile.phase),
        ev_demand_va: ev.demand_va,
        total_demand_va,
        total_demand_amps,
        available_capacity_va: available_va,
        available_capacity_amps: amps(available_va, voltage, profile.phase),
        utilization_percent,
        upgrade_required,
        recommended_service_amps,
        verdict,
    }
}

/// Human-readable verdict on the service loading
pub fn capacity_verdict(utilization_percent: f64, remaining_amps: f64) -> String {
    if utilization_percent > 100.0 {
        format!(
            "REJECT - Service overloaded by {:.0}A. Service upgrade required.",
            remaining_amps.abs()
        )
    } else if utilization_percent > 80.0 {
        format!(
            "WARNING - Service at {:.0}% utilization. Only {:.0}A margin remaining. Consider upgrade.",
            utilization_percent, remaining_amps
        )
    } else if utilization_percent > 60.0 {
        format!(
            "APPROVE WITH CAUTION - Service at {:.0}% utilization. {:.0}A remaining.",
            utilization_percent, remaining_amps
        )
    } else {
        format!(
            "APPROVE - Service has adequate capacity. {:.0}A remaining after change.",
            remaining_amps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChargerLevel, Phase, ServiceVoltage};

    fn profile() -> BuildingProfile {
        BuildingProfile::new(20, 900.0, ServiceVoltage::V208, Phase::Three, 800)
    }

    #[test]
    fn test_ev_load_uses_full_connected_load() {
        let ev = calculate_ev_load(
            &profile(),
            &EvChargerRequest::new(20, ChargerLevel::Level2, 48.0),
            false,
            145_920.0,
        );
        assert_eq!(ev.ev_voltage, 208.0);
        assert_eq!(ev.per_charger_va, 9984.0);
        assert_eq!(ev.total_connected_va, 199_680.0);
        assert_eq!(ev.demand_va, ev.total_connected_va);
    }

    #[test]
    fn test_ev_load_single_phase_voltage_and_floor() {
        let p = BuildingProfile::new(6, 800.0, ServiceVoltage::V240, Phase::Single, 400);
        let ev = calculate_ev_load(&p, &EvChargerRequest::new(3, ChargerLevel::Level2, 24.0), false, 0.0);
        assert_eq!(ev.ev_voltage, 240.0);
        assert_eq!(ev.per_charger_va, 7200.0);
    }

    #[test]
    fn test_load_managed_ev_capped_at_setpoint() {
        let p = profile();
        let ev = calculate_ev_load(&p, &EvChargerRequest::new(20, ChargerLevel::Level2, 48.0), true, 145_920.0);
        let setpoint = (existing_capacity_va(&p) - 145_920.0) * 0.9;
        assert!((ev.demand_va - setpoint).abs() < 1e-6);
        assert!(ev.demand_va < ev.total_connected_va);
    }

    #[test]
    fn test_service_overloaded() {
        let p = profile();
        let ev = calculate_ev_load(&p, &EvChargerRequest::new(20, ChargerLevel::Level2, 48.0), false, 145_920.0);
        let service = analyze_service(&p, 145_920.0, &ev);
        assert!(service.utilization_percent > 100.0);
        assert!(service.upgrade_required);
        assert_eq!(service.recommended_service_amps, Some(1200));
        assert!(service.verdict.starts_with("REJECT"));
        let capacity = 800.0 * 208.0 * 3f64.sqrt();
        assert!((service.available_capacity_va - (capacity - 145_920.0)).abs() < 1e-6);
    }

    #[test]
    fn test_verdict_bands() {
        assert!(capacity_verdict(50.0, 300.0).starts_with("APPROVE -"));
        assert!(capacity_verdict(70.0, 100.0).starts_with("APPROVE WITH CAUTION"));
        assert!(capacity_verdict(85.0, 40.0).starts_with("WARNING"));
        assert!(capacity_verdict(120.0, -90.0).contains("90A"));
    }
}
