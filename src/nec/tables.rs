//! Regulatory lookup tables.
//!
//! Everything here is immutable data; the only lazily-built value is the
//! breaker-to-conductor map, constructed once on first use.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::domain::SpaceType;

/// NEC Table 220.84 optional-method demand factors as `(max units, factor)`,
/// ordered by ascending upper bound. The final row covers 62 units and above.
pub const MULTIFAMILY_DEMAND_FACTORS: &[(u32, f64)] = &[
    (5, 0.45),
    (7, 0.44),
    (10, 0.43),
    (11, 0.42),
    (13, 0.41),
    (15, 0.40),
    (17, 0.39),
    (20, 0.38),
    (21, 0.37),
    (23, 0.36),
    (25, 0.35),
    (27, 0.34),
    (30, 0.33),
    (31, 0.32),
    (33, 0.31),
    (36, 0.30),
    (38, 0.29),
    (42, 0.28),
    (45, 0.27),
    (50, 0.26),
    (55, 0.25),
    (61, 0.24),
    (u32::MAX, 0.23),
];

/// Minimum dwelling units for the optional calculation method
pub const OPTIONAL_METHOD_MIN_UNITS: u32 = 3;

/// Standard service entrance ratings (A)
pub const SERVICE_SIZES: &[u32] = &[
    100, 125, 150, 200, 225, 400, 600, 800, 1000, 1200, 1600, 2000, 2500, 3000, 4000,
];

/// Standard panelboard / switchboard bus ratings (A)
pub const PANEL_BUS_RATINGS: &[u32] = &[
    100, 125, 150, 200, 225, 400, 600, 800, 1000, 1200, 1600, 2000, 2500, 3000, 4000,
];

/// Standard overcurrent device ratings, NEC 240.6(A)
pub const BREAKER_SIZES: &[u32] = &[
    15, 20, 25, 30, 35, 40, 45, 50, 60, 70, 80, 90, 100, 110, 125, 150, 175, 200, 225, 250,
    300, 350, 400, 450, 500, 600,
];

/// Standard panelboard space counts
pub const PANEL_SPACES: &[u32] = &[12, 20, 24, 30, 42, 54, 66, 84];

/// Copper THHN/THWN-2 at 75°C: largest breaker each conductor may be protected by
static CONDUCTOR_BY_BREAKER: Lazy<BTreeMap<u32, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (15, "14 AWG"),
        (20, "12 AWG"),
        (30, "10 AWG"),
        (40, "8 AWG"),
        (60, "6 AWG"),
        (70, "4 AWG"),
        (90, "3 AWG"),
        (100, "3 AWG"),
        (110, "2 AWG"),
        (125, "1 AWG"),
        (150, "1/0 AWG"),
        (175, "2/0 AWG"),
        (200, "3/0 AWG"),
        (225, "4/0 AWG"),
        (250, "250 kcmil"),
        (300, "350 kcmil"),
        (350, "400 kcmil"),
        (400, "500 kcmil"),
        (600, "(2) 350 kcmil"),
    ])
});

/// Conductor for a breaker rating; oversize ratings fall back to the largest entry
pub fn conductor_for_breaker(breaker_amps: u32) -> &'static str {
    CONDUCTOR_BY_BREAKER
        .range(breaker_amps..)
        .next()
        .or_else(|| CONDUCTOR_BY_BREAKER.iter().next_back())
        .map(|(_, size)| *size)
        .unwrap_or("Per engineer")
}

// Dwelling-unit loads (optional method)
pub const GENERAL_LIGHTING_VA_PER_SQFT: f64 = 3.0;
pub const SMALL_APPLIANCE_CIRCUIT_VA: f64 = 1500.0;
pub const SMALL_APPLIANCE_CIRCUITS_PER_UNIT: f64 = 2.0;
pub const LAUNDRY_CIRCUIT_VA: f64 = 1500.0;
pub const COOKING_NAMEPLATE_VA: f64 = 12_000.0;
pub const ELECTRIC_HEAT_VA: f64 = 10_000.0;
pub const ELECTRIC_HEAT_DEMAND_FACTOR: f64 = 0.65;

// Common-area conversions
pub const VA_PER_HORSEPOWER: f64 = 932.0;
pub const VA_PER_TON: f64 = 1500.0;
pub const DEFAULT_LIGHTING_VA_PER_SQFT: f64 = 1.0;
pub const RECEPTACLE_FULL_DEMAND_VA: f64 = 10_000.0;
pub const RECEPTACLE_REMAINDER_FACTOR: f64 = 0.5;
pub const ELEVATOR_ADDITIONAL_FACTOR: f64 = 0.5;
pub const LARGEST_MOTOR_FACTOR: f64 = 1.25;

/// Lighting load density by space type (VA/ft²)
pub fn lighting_va_per_sqft(space: SpaceType) -> f64 {
    match space {
        SpaceType::Corridor => 0.5,
        SpaceType::Lobby => 2.0,
        SpaceType::Stairwell => 0.5,
        SpaceType::IndoorParking => 0.2,
        SpaceType::OutdoorParking => 0.1,
        SpaceType::Amenity | SpaceType::Laundry | SpaceType::Office => 1.5,
        SpaceType::PoolDeck => 1.0,
    }
}

// EV supply equipment
pub const EV_MIN_LOAD_VA: f64 = 7200.0;
pub const EVEMS_SETPOINT_FRACTION: f64 = 0.90;
pub const EVEMS_MIN_AMPS_PER_CHARGER: f64 = 12.0;

// Sizing
pub const CONTINUOUS_LOAD_FACTOR: f64 = 1.25;
pub const SERVICE_SIZING_FACTOR: f64 = 1.25;
pub const PHASE_IMBALANCE_LIMIT_PERCENT: f64 = 15.0;
pub const TRANSFORMER_ADEQUATE_PERCENT: f64 = 70.0;
pub const TRANSFORMER_CAUTION_PERCENT: f64 = 85.0;

// Layout
pub const MAX_UNIT_PANELS: usize = 20;
pub const MAX_METER_POSITIONS: u32 = 200;
pub const METER_SPARE_FRACTION: f64 = 0.10;
pub const LIGHTING_VA_PER_CIRCUIT: f64 = 1800.0;
pub const BRANCH_CIRCUIT_VOLTAGE: f64 = 120.0;
/// Largest load put on a single-pole 120 V circuit before going two-pole
pub const SINGLE_POLE_MAX_AMPS: f64 = 16.0;
/// Unit panel sizing (NEC 220.82): first 10 kVA at 100%, remainder at 40%
pub const UNIT_PANEL_FIRST_VA: f64 = 10_000.0;
pub const UNIT_PANEL_REMAINDER_FACTOR: f64 = 0.4;
pub const UNIT_PANEL_MIN_AMPS: f64 = 100.0;
/// House load estimate when no common-area figures were supplied
pub const HOUSE_VA_PER_UNIT: f64 = 500.0;
pub const HOUSE_MIN_VA: f64 = 10_000.0;

/// Code references quoted in breakdowns and the compliance rollup
pub mod citations {
    pub const GENERAL_LIGHTING: &str = "NEC 220.84(C)(1)";
    pub const SMALL_APPLIANCE: &str = "NEC 220.84(C)(2)";
    pub const COOKING: &str = "NEC 220.84(C)(3)";
    pub const ELECTRIC_HEAT: &str = "NEC 220.84(C)(5)";
    pub const OPTIONAL_METHOD: &str = "NEC Table 220.84";
    pub const STANDARD_METHOD: &str = "NEC 220.40";
    pub const MEASURED_DEMAND: &str = "NEC 220.87";
    pub const LIGHTING: &str = "NEC 220.12";
    pub const RECEPTACLES: &str = "NEC 220.44";
    pub const ELEVATORS: &str = "NEC 620.14";
    pub const MOTORS: &str = "NEC 430.24";
    pub const POOL: &str = "NEC 680.9";
    pub const HVAC: &str = "NEC 440.34";
    pub const FIRE_PUMP: &str = "NEC 695.6";
    pub const OTHER: &str = "NEC 220.14";
    pub const EV_LOAD: &str = "NEC 220.57";
    pub const EVSE_BRANCH: &str = "NEC 625.40";
    pub const EVEMS: &str = "NEC 625.42";
    pub const LOAD_MANAGEMENT: &str = "NEC 750.30";
    pub const SERVICE_RATING: &str = "NEC 230.79";
    pub const CONTINUOUS_LOAD: &str = "NEC 210.19(A)";
    pub const TRANSFORMER: &str = "NEC 450.3";
    pub const DWELLING_OPTIONAL: &str = "NEC 220.82";
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_demand_table_sorted_and_non_increasing() {
        for pair in MULTIFAMILY_DEMAND_FACTORS.windows(2) {
            assert!(pair[0].0 < pair[1].0);
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_size_tables_ascending() {
        for table in [SERVICE_SIZES, PANEL_BUS_RATINGS, BREAKER_SIZES, PANEL_SPACES] {
            assert!(table.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[rstest]
    #[case(15, "14 AWG")]
    #[case(20, "12 AWG")]
    #[case(25, "10 AWG")]
    #[case(30, "10 AWG")]
    #[case(50, "6 AWG")]
    #[case(60, "6 AWG")]
    #[case(200, "3/0 AWG")]
    #[case(1000, "(2) 350 kcmil")]
    fn test_conductor_for_breaker(#[case] breaker: u32, #[case] expected: &str) {
        assert_eq!(conductor_for_breaker(breaker), expected);
    }

    #[test]
    fn test_lighting_densities() {
        assert_eq!(lighting_va_per_sqft(SpaceType::Lobby), 2.0);
        assert_eq!(lighting_va_per_sqft(SpaceType::OutdoorParking), 0.1);
        assert_eq!(lighting_va_per_sqft(SpaceType::Laundry), 1.5);
    }
}
