use crate::domain::{BuildingProfile, UnitAppliances};
use crate::nec::tables::{
    COOKING_NAMEPLATE_VA, ELECTRIC_HEAT_VA, GENERAL_LIGHTING_VA_PER_SQFT, LAUNDRY_CIRCUIT_VA,
    LIGHTING_VA_PER_CIRCUIT, PANEL_BUS_RATINGS, SMALL_APPLIANCE_CIRCUIT_VA, UNIT_PANEL_FIRST_VA,
    UNIT_PANEL_MIN_AMPS, UNIT_PANEL_REMAINDER_FACTOR,
};
use crate::nec::round_up_to_standard_size;

use super::graph::CircuitLoadType;
use super::panel_slots::CircuitSpec;

// Nameplate defaults (W) when no real value is supplied
const DEFAULT_DRYER_W: f64 = 5_000.0;
const DEFAULT_AC_W: f64 = 3_500.0;
const DEFAULT_WATER_HEATER_W: f64 = 4_500.0;
const DEFAULT_DISHWASHER_W: f64 = 1_200.0;
const DEFAULT_DISPOSAL_W: f64 = 900.0;
const BATHROOM_VA: f64 = 1_500.0;

fn watts(supplied: Option<f64>, default: f64) -> f64 {
    supplied.filter(|w| w.is_finite() && *w > 0.0).unwrap_or(default)
}

/// Branch circuits of one dwelling unit panel
pub fn unit_circuits(profile: &BuildingProfile, appliances: &UnitAppliances) -> Vec<CircuitSpec> {
    let mut specs = vec![
        CircuitSpec::new("Small Appliance 1", SMALL_APPLIANCE_CIRCUIT_VA, 1, CircuitLoadType::Receptacle).breaker(20),
        CircuitSpec::new("Small Appliance 2", SMALL_APPLIANCE_CIRCUIT_VA, 1, CircuitLoadType::Receptacle).breaker(20),
        CircuitSpec::new("Laundry", LAUNDRY_CIRCUIT_VA, 1, CircuitLoadType::Receptacle).breaker(20),
        CircuitSpec::new("Bathroom", BATHROOM_VA, 1, CircuitLoadType::Receptacle).breaker(20),
    ];

    let lighting_va = profile.avg_unit_sqft.max(0.0) * GENERAL_LIGHTING_VA_PER_SQFT;
    let lighting_circuits = ((lighting_va / LIGHTING_VA_PER_CIRCUIT).ceil() as usize).max(1);
    specs.extend((1..=lighting_circuits).map(|n| {
        CircuitSpec::new(
            format!("Lighting {}", n),
            lighting_va / lighting_circuits as f64,
            1,
            CircuitLoadType::Lighting,
        )
        .breaker(15)
    }));

    let mut sized = |label: &str, load: f64, poles: u8, load_type: CircuitLoadType| {
        specs.push(CircuitSpec::new(label, load, poles, load_type).continuous());
    };

    if profile.electric_cooking {
        sized("Range", watts(appliances.range_watts, COOKING_NAMEPLATE_VA), 2, CircuitLoadType::Appliance);
    }
    if appliances.electric_dryer {
        sized("Dryer", watts(appliances.dryer_watts, DEFAULT_DRYER_W), 2, CircuitLoadType::Appliance);
    }
    if profile.electric_heat {
        sized("Electric Heat", watts(appliances.heat_watts, ELECTRIC_HEAT_VA), 2, CircuitLoadType::Hvac);
    }
    if appliances.air_conditioning {
        sized("Air Conditioning", watts(appliances.ac_watts, DEFAULT_AC_W), 2, CircuitLoadType::Hvac);
    }
    if appliances.electric_water_heater {
        sized(
            "Water Heater",
            watts(appliances.water_heater_watts, DEFAULT_WATER_HEATER_W),
            2,
            CircuitLoadType::Appliance,
        );
    }
    if appliances.dishwasher {
        sized("Dishwasher", watts(appliances.dishwasher_watts, DEFAULT_DISHWASHER_W), 1, CircuitLoadType::Appliance);
    }
    if appliances.disposal {
        sized("Disposal", watts(appliances.disposal_watts, DEFAULT_DISPOSAL_W), 1, CircuitLoadType::Motor);
    }

    specs
}

/// Unit panel rating from its connected load: first 10 kVA at 100%, rest at 40%
pub fn unit_panel_rating(connected_va: f64, voltage: f64) -> u32 {
    let first = connected_va.min(UNIT_PANEL_FIRST_VA);
    let demand = first + (connected_va - first) * UNIT_PANEL_REMAINDER_FACTOR;
    let demand_amps = if voltage > 0.0 { demand / voltage } else { 0.0 };
    round_up_to_standard_size(demand_amps.max(UNIT_PANEL_MIN_AMPS), PANEL_BUS_RATINGS)
}
