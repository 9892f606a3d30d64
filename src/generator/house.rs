use crate::analysis::common_area::item_demand_va;
use crate::domain::{BuildingProfile, CommonAreaItem, CommonAreaLoad, LoadCategory};
use crate::nec::tables::{
    BRANCH_CIRCUIT_VOLTAGE, HOUSE_MIN_VA, HOUSE_VA_PER_UNIT, LIGHTING_VA_PER_CIRCUIT,
    SINGLE_POLE_MAX_AMPS,
};

use super::graph::CircuitLoadType;
use super::panel_slots::CircuitSpec;

const LIGHTING_SHARE: f64 = 0.30;
const EXTERIOR_SHARE: f64 = 0.15;
const RECEPTACLE_SHARE: f64 = 0.10;
const ELEVATOR_SHARE: f64 = 0.25;
const FIRE_ALARM_VA: f64 = 1_200.0;
const LAUNDRY_ROOM_VA: f64 = 5_000.0;
/// Upper bound on circuits produced for one heuristic share
const MAX_SPLIT_CIRCUITS: usize = 12;

fn load_type_for(category: LoadCategory) -> CircuitLoadType {
    match category {
        LoadCategory::IndoorLighting | LoadCategory::OutdoorLighting => CircuitLoadType::Lighting,
        LoadCategory::Receptacles => CircuitLoadType::Receptacle,
        LoadCategory::Elevators | LoadCategory::Motors | LoadCategory::PoolSpa | LoadCategory::FirePump => {
            CircuitLoadType::Motor
        }
        LoadCategory::Hvac => CircuitLoadType::Hvac,
        LoadCategory::Other => CircuitLoadType::Other,
    }
}

fn item_circuit(item: &CommonAreaItem, three_phase: bool) -> CircuitSpec {
    let demand = item_demand_va(item);
    let poles = if item.category.is_polyphase_equipment() && three_phase {
        3
    } else if demand / BRANCH_CIRCUIT_VOLTAGE > SINGLE_POLE_MAX_AMPS {
        2
    } else {
        1
    };
    let description = if item.description.is_empty() {
        item.category.to_string()
    } else {
        item.description.clone()
    };
    let spec = CircuitSpec::new(description, demand, poles, load_type_for(item.category));
    if item.category.is_continuous() {
        spec.continuous()
    } else {
        spec
    }
}

/// Split `va` into 20 A single-pole circuits of at most 1800 VA
fn split_share(label: &str, va: f64, load_type: CircuitLoadType) -> Vec<CircuitSpec> {
    if va <= 0.0 {
        return Vec::new();
    }
    let count = ((va / LIGHTING_VA_PER_CIRCUIT).ceil() as usize).clamp(1, MAX_SPLIT_CIRCUITS);
    let per_circuit = va / count as f64;
    (1..=count)
        .map(|n| {
            let description = if count == 1 {
                label.to_string()
            } else {
                format!("{} {}", label, n)
            };
            CircuitSpec::new(description, per_circuit, 1, load_type).breaker(20)
        })
        .collect()
}

/// Common-area load used by the heuristic layout
pub fn house_load_va(profile: &BuildingProfile) -> f64 {
    match profile.common_area.flat_va() {
        va if va > 0.0 => va,
        _ => (profile.dwelling_units as f64 * HOUSE_VA_PER_UNIT).max(HOUSE_MIN_VA),
    }
}

fn heuristic_circuits(profile: &BuildingProfile) -> Vec<CircuitSpec> {
    let total = house_load_va(profile);
    let three_phase = profile.phase.is_three_phase();
    let mut specs = Vec::new();

    specs.extend(split_share("Common Area Lighting", total * LIGHTING_SHARE, CircuitLoadType::Lighting));
    specs.extend(split_share("Exterior Lighting", total * EXTERIOR_SHARE, CircuitLoadType::Lighting));
    specs.extend(split_share("Common Receptacles", total * RECEPTACLE_SHARE, CircuitLoadType::Receptacle));

    if profile.elevator_present() {
        let poles = if three_phase { 3 } else { 2 };
        specs.push(CircuitSpec::new("Elevator", total * ELEVATOR_SHARE, poles, CircuitLoadType::Motor));
    }

    specs.push(CircuitSpec::new("Fire Alarm Panel", FIRE_ALARM_VA, 1, CircuitLoadType::Control).breaker(20));

    if profile.common_laundry_room {
        specs.push(CircuitSpec::new("Common Laundry", LAUNDRY_ROOM_VA, 2, CircuitLoadType::Appliance));
    }

    specs
}

/// House panel branch circuits: one per itemized common-area load, or a
/// percentage split of the house load when nothing is itemized.
pub fn house_circuits(profile: &BuildingProfile) -> Vec<CircuitSpec> {
    match &profile.common_area {
        CommonAreaLoad::Itemized(items) if items.iter().any(usable) => {
            let three_phase = profile.phase.is_three_phase();
            items
                .iter()
                .filter(|item| usable(item))
                .map(|item| item_circuit(item, three_phase))
                .collect()
        }
        _ => heuristic_circuits(profile),
    }
}

fn usable(item: &CommonAreaItem) -> bool {
    item.quantity.is_finite() && item.quantity > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InputUnit, Phase, ServiceVoltage};

    fn profile() -> BuildingProfile {
        BuildingProfile::new(20, 900.0, ServiceVoltage::V208, Phase::Three, 800)
    }

    #[test]
    fn test_heuristic_layout() {
        let specs = house_circuits(&profile());
        // 10 kVA house load: lighting 3000 -> 2, exterior 1500 -> 1, receptacles 1000 -> 1
        assert_eq!(specs.iter().filter(|s| s.description.starts_with("Common Area Lighting")).count(), 2);
        assert!(specs.iter().any(|s| s.description == "Elevator" && s.poles == 3));
        assert!(specs.iter().any(|s| s.description == "Fire Alarm Panel"));
        assert!(!specs.iter().any(|s| s.description == "Common Laundry"));
    }

    #[test]
    fn test_heuristic_laundry_and_no_elevator() {
        let mut p = profile();
        p.has_elevator = Some(false);
        p.common_laundry_room = true;
        p.common_area = CommonAreaLoad::Flat { va: 40_000.0 };
        let specs = house_circuits(&p);
        assert!(!specs.iter().any(|s| s.description == "Elevator"));
        assert!(specs.iter().any(|s| s.description == "Common Laundry" && s.load_va == 5_000.0));
        let lighting: f64 = specs
            .iter()
            .filter(|s| s.description.starts_with("Common Area Lighting"))
            .map(|s| s.load_va)
            .sum();
        assert!((lighting - 12_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_itemized_layout() {
        let mut p = profile();
        p.common_area = CommonAreaLoad::Itemized(vec![
            CommonAreaItem::new(LoadCategory::IndoorLighting, "Corridor lights", InputUnit::Va, 1_200.0),
            CommonAreaItem::new(LoadCategory::Motors, "Booster pump", InputUnit::Horsepower, 10.0),
            CommonAreaItem::new(LoadCategory::Receptacles, "Lobby", InputUnit::Va, 3_000.0),
            CommonAreaItem::new(LoadCategory::Other, "Broken", InputUnit::Va, 0.0),
        ]);
        let specs = house_circuits(&p);
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].poles, 1);
        assert!(specs[0].continuous);
        assert_eq!(specs[1].poles, 3);
        assert_eq!(specs[1].load_va, 9_320.0 * 1.25);
        assert_eq!(specs[2].poles, 2);
    }
}
