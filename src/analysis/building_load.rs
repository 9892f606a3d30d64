use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::common_area::aggregate_common_area;
use super::LoadBreakdownItem;
use crate::domain::{BuildingProfile, CommonAreaLoad, ExistingLoadMethod, MeasuredDemand};
use crate::nec::citations;
use crate::nec::demand_factor_for_unit_count;
use crate::nec::tables::{
    COOKING_NAMEPLATE_VA, ELECTRIC_HEAT_DEMAND_FACTOR, ELECTRIC_HEAT_VA,
    GENERAL_LIGHTING_VA_PER_SQFT, LAUNDRY_CIRCUIT_VA, OPTIONAL_METHOD_MIN_UNITS,
    SMALL_APPLIANCE_CIRCUITS_PER_UNIT, SMALL_APPLIANCE_CIRCUIT_VA,
};

/// Existing building demand and how it was derived
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingLoad {
    /// Method actually used (a measured request without data falls back to calculated)
    pub method: ExistingLoadMethod,
    pub items: Vec<LoadBreakdownItem>,
    /// Dwelling-unit load before the multi-family factor
    pub dwelling_subtotal_va: f64,
    pub demand_factor: f64,
    pub dwelling_demand_va: f64,
    pub common_area_connected_va: f64,
    pub common_area_demand_va: f64,
    pub total_connected_va: f64,
    pub total_demand_va: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measured: Option<MeasuredDemand>,
    /// Fallbacks taken while computing the load
    pub notes: Vec<String>,
}

/// Determine the existing building demand.
///
/// A measured peak (utility bill or load study) is taken as the whole building
/// demand at factor 1.0 and already contains the common areas. Otherwise the
/// dwelling load is calculated with the optional method and common-area load
/// is added on top, un-factored.
pub fn calculate_building_load(
    profile: &BuildingProfile,
    method: ExistingLoadMethod,
    measured: Option<&MeasuredDemand>,
) -> BuildingLoad {
    let mut notes = Vec::new();

    if method.is_measured() {
        match measured.filter(|m| m.peak_kw.is_finite() && m.peak_kw > 0.0) {
            Some(m) => return measured_building_load(method, m),
            None => {
                warn!(%method, "measured load method selected without a peak demand, calculating instead");
                notes.push(format!(
                    "Existing load method '{}' selected but no measured peak demand supplied; calculated method used",
                    method
                ));
            }
        }
    }

    let mut load = calculated_building_load(profile);
    notes.append(&mut load.notes);
    load.notes = notes;
    load
}

fn measured_building_load(method: ExistingLoadMethod, measured: &MeasuredDemand) -> BuildingLoad {
    let demand_va = measured.peak_kw * 1000.0;
    let source = match (&measured.utility_name, &measured.period) {
        (Some(utility), Some(period)) => format!(" ({}, {})", utility, period),
        (Some(utility), None) => format!(" ({})", utility),
        (None, Some(period)) => format!(" ({})", period),
        (None, None) => String::new(),
    };
    debug!(%method, demand_va, "using measured building demand");

    BuildingLoad {
        method,
        items: vec![LoadBreakdownItem {
            category: "Measured Demand".to_string(),
            description: format!("Measured peak demand {:.1} kW{}", measured.peak_kw, source),
            connected_va: demand_va,
            demand_va,
            demand_factor: 1.0,
            nec_reference: citations::MEASURED_DEMAND.to_string(),
        }],
        dwelling_subtotal_va: demand_va,
        demand_factor: 1.0,
        dwelling_demand_va: demand_va,
        common_area_connected_va: 0.0,
        common_area_demand_va: 0.0,
        total_connected_va: demand_va,
        total_demand_va: demand_va,
        measured: Some(measured.clone()),
        notes: Vec::new(),
    }
}

fn calculated_building_load(profile: &BuildingProfile) -> BuildingLoad {
    let units = profile.dwelling_units as f64;
    let factor = demand_factor_for_unit_count(profile.dwelling_units);
    let dwelling_reference = if profile.dwelling_units >= OPTIONAL_METHOD_MIN_UNITS {
        citations::OPTIONAL_METHOD
    } else {
        citations::STANDARD_METHOD
    };

    // (category, description, connected VA, VA counted toward the subtotal, citation)
    let mut lines: Vec<(&str, String, f64, f64, &str)> = Vec::new();

    let lighting = units * profile.avg_unit_sqft * GENERAL_LIGHTING_VA_PER_SQFT;
    lines.push((
        "General Lighting",
        format!(
            "{} units x {:.0} ft² x {} VA/ft²",
            profile.dwelling_units, profile.avg_unit_sqft, GENERAL_LIGHTING_VA_PER_SQFT
        ),
        lighting,
        lighting,
        citations::GENERAL_LIGHTING,
    ));

    let small_appliance = units * SMALL_APPLIANCE_CIRCUITS_PER_UNIT * SMALL_APPLIANCE_CIRCUIT_VA;
    lines.push((
        "Small Appliance",
        format!("{} units x 2 circuits x 1500 VA", profile.dwelling_units),
        small_appliance,
        small_appliance,
        citations::SMALL_APPLIANCE,
    ));

    let laundry = units * LAUNDRY_CIRCUIT_VA;
    lines.push((
        "Laundry",
        format!("{} units x 1500 VA", profile.dwelling_units),
        laundry,
        laundry,
        citations::SMALL_APPLIANCE,
    ));

    if profile.electric_cooking {
        let cooking = units * COOKING_NAMEPLATE_VA;
        lines.push((
            "Cooking",
            format!("{} units x 12 kW range nameplate", profile.dwelling_units),
            cooking,
            cooking,
            citations::COOKING,
        ));
    }

    if profile.electric_heat {
        let heat = units * ELECTRIC_HEAT_VA;
        lines.push((
            "Electric Heat",
            format!("{} units x 10 kW at 65%", profile.dwelling_units),
            heat,
            heat * ELECTRIC_HEAT_DEMAND_FACTOR,
            citations::ELECTRIC_HEAT,
        ));
    }

    let dwelling_connected: f64 = lines.iter().map(|l| l.2).sum();
    let dwelling_subtotal: f64 = lines.iter().map(|l| l.3).sum();
    let dwelling_demand = dwelling_subtotal * factor;

    let mut items: Vec<LoadBreakdownItem> = lines
        .into_iter()
        .map(|(category, description, connected, counted, reference)| {
            let demand = counted * factor;
            LoadBreakdownItem {
                category: category.to_string(),
                description,
                connected_va: connected,
                demand_va: demand,
                demand_factor: if connected > 0.0 { demand / connected } else { factor },
                nec_reference: format!("{} / {}", reference, dwelling_reference),
            }
        })
        .collect();

    let mut notes = Vec::new();
    let (common_connected, common_demand) = match &profile.common_area {
        CommonAreaLoad::None => (0.0, 0.0),
        CommonAreaLoad::Flat { va } => {
            items.push(LoadBreakdownItem {
                category: "Common Area".to_string(),
                description: "House load (flat VA at 100%)".to_string(),
                connected_va: *va,
                demand_va: *va,
                demand_factor: 1.0,
                nec_reference: citations::OTHER.to_string(),
            });
            (*va, *va)
        }
        CommonAreaLoad::Itemized(list) => {
            let summary = aggregate_common_area(list);
            notes.extend(summary.skipped);
            items.extend(summary.items);
            (summary.total_connected_va, summary.total_demand_va)
        }
    };

    debug!(
        units = profile.dwelling_units,
        factor, dwelling_subtotal, dwelling_demand, common_demand, "calculated building load"
    );

    BuildingLoad {
        method: ExistingLoadMethod::Calculated,
        items,
        dwelling_subtotal_va: dwelling_subtotal,
        demand_factor: factor,
        dwelling_demand_va: dwelling_demand,
        common_area_connected_va: common_connected,
        common_area_demand_va: common_demand,
        total_connected_va: dwelling_connected + common_connected,
        total_demand_va: dwelling_demand + common_demand,
        measured: None,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommonAreaItem, InputUnit, LoadCategory, Phase, ServiceVoltage};

    fn profile(units: u32) -> BuildingProfile {
        BuildingProfile::new(units, 900.0, ServiceVoltage::V208, Phase::Three, 800)
    }

    #[test]
    fn test_twenty_unit_calculated_load() {
        let load = calculate_building_load(&profile(20), ExistingLoadMethod::Calculated, None);
        // 54,000 lighting + 60,000 small appliance + 30,000 laundry + 240,000 cooking
        assert_eq!(load.dwelling_subtotal_va, 384_000.0);
        assert_eq!(load.demand_factor, 0.38);
        assert!((load.total_demand_va - 145_920.0).abs() < 1e-6);
        assert_eq!(load.items.len(), 4);
    }

    #[test]
    fn test_electric_heat_at_65_percent() {
        let mut p = profile(20);
        p.electric_cooking = false;
        p.electric_heat = true;
        let load = calculate_building_load(&p, ExistingLoadMethod::Calculated, None);
        assert_eq!(load.dwelling_subtotal_va, 144_000.0 + 130_000.0);
        assert_eq!(load.total_connected_va, 144_000.0 + 200_000.0);
    }

    #[test]
    fn test_small_building_uses_unity_factor() {
        let load = calculate_building_load(&profile(2), ExistingLoadMethod::Calculated, None);
        assert_eq!(load.demand_factor, 1.0);
        assert_eq!(load.total_demand_va, load.dwelling_subtotal_va);
    }

    #[test]
    fn test_flat_common_area_added_unfactored() {
        let mut p = profile(20);
        p.common_area = CommonAreaLoad::Flat { va: 20_000.0 };
        let load = calculate_building_load(&p, ExistingLoadMethod::Calculated, None);
        assert!((load.total_demand_va - 165_920.0).abs() < 1e-6);
        assert_eq!(load.common_area_demand_va, 20_000.0);
    }

    #[test]
    fn test_itemized_common_area() {
        let mut p = profile(20);
        p.common_area = CommonAreaLoad::Itemized(vec![
            CommonAreaItem::new(LoadCategory::Receptacles, "corridor", InputUnit::Va, 14_000.0),
        ]);
        let load = calculate_building_load(&p, ExistingLoadMethod::Calculated, None);
        assert_eq!(load.common_area_demand_va, 12_000.0);
        assert_eq!(load.common_area_connected_va, 14_000.0);
    }

    #[test]
    fn test_measured_demand_ignores_common_area() {
        let mut p = profile(20);
        p.common_area = CommonAreaLoad::Flat { va: 50_000.0 };
        let measured = MeasuredDemand {
            peak_kw: 120.0,
            period: Some("2025".to_string()),
            utility_name: Some("PG&E".to_string()),
        };
        let load = calculate_building_load(&p, ExistingLoadMethod::UtilityBill, Some(&measured));
        assert_eq!(load.total_demand_va, 120_000.0);
        assert_eq!(load.demand_factor, 1.0);
        assert_eq!(load.common_area_demand_va, 0.0);
        assert_eq!(load.method, ExistingLoadMethod::UtilityBill);
    }

    #[test]
    fn test_measured_without_data_falls_back() {
        let load = calculate_building_load(&profile(20), ExistingLoadMethod::LoadStudy, None);
        assert_eq!(load.method, ExistingLoadMethod::Calculated);
        assert_eq!(load.notes.len(), 1);
        assert_eq!(load.demand_factor, 0.38);
    }
}
