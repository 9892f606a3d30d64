use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use validator::{Validate, ValidationError};

use super::types::{Phase, ServiceVoltage};

/// Building-level inputs for one capacity analysis
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_building_profile"))]
pub struct BuildingProfile {
    /// Number of dwelling units (the optional method needs at least 3)
    #[validate(range(min = 1, max = 10000, message = "at least one dwelling unit is required"))]
    pub dwelling_units: u32,

    /// Average conditioned floor area per unit (ft²)
    #[validate(range(min = 0.0, max = 20000.0))]
    pub avg_unit_sqft: f64,

    pub voltage: ServiceVoltage,
    pub phase: Phase,

    /// Rating of the existing service (A)
    #[validate(range(min = 1, max = 10000, message = "existing service rating is required"))]
    pub existing_service_amps: u32,

    #[serde(default = "default_true")]
    pub electric_cooking: bool,

    #[serde(default)]
    pub electric_heat: bool,

    #[serde(default)]
    pub common_area: CommonAreaLoad,

    /// Explicit elevator flag; inferred from unit count when absent
    #[serde(default)]
    pub has_elevator: Option<bool>,

    #[serde(default)]
    pub common_laundry_room: bool,
}

/// Upper bound on identical pieces of equipment in one common-area line
pub const MAX_ITEM_COUNT: u32 = 10_000;

fn default_true() -> bool {
    true
}

fn validate_building_profile(profile: &BuildingProfile) -> Result<(), ValidationError> {
    if !profile.avg_unit_sqft.is_finite() {
        return Err(ValidationError::new("avg_unit_sqft_not_finite"));
    }
    if !profile.voltage.supports(profile.phase) {
        let mut err = ValidationError::new("unsupported_service_configuration");
        err.message = Some(
            format!("{} {} is not a supported service", profile.voltage, profile.phase).into(),
        );
        return Err(err);
    }
    if let CommonAreaLoad::Flat { va } = profile.common_area {
        if !va.is_finite() || va < 0.0 {
            return Err(ValidationError::new("common_area_va_invalid"));
        }
    }
    if let Some(item) = profile
        .common_area
        .items()
        .iter()
        .find(|item| item.count > MAX_ITEM_COUNT)
    {
        let mut err = ValidationError::new("common_area_item_count_out_of_range");
        err.message = Some(
            format!(
                "common-area item '{}' lists {} units; at most {} allowed",
                item.description, item.count, MAX_ITEM_COUNT
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

impl BuildingProfile {
    pub fn new(
        dwelling_units: u32,
        avg_unit_sqft: f64,
        voltage: ServiceVoltage,
        phase: Phase,
        existing_service_amps: u32,
    ) -> Self {
        Self {
            dwelling_units,
            avg_unit_sqft,
            voltage,
            phase,
            existing_service_amps,
            electric_cooking: true,
            electric_heat: false,
            common_area: CommonAreaLoad::None,
            has_elevator: None,
            common_laundry_room: false,
        }
    }

    /// Mid-rise buildings above 12 units are assumed to carry an elevator
    pub fn elevator_present(&self) -> bool {
        self.has_elevator.unwrap_or(self.dwelling_units > 12)
    }

    /// Line-to-line voltage used for dwelling and EV branch circuits
    pub fn branch_voltage(&self) -> f64 {
        if self.phase.is_three_phase() {
            208.0
        } else {
            240.0
        }
    }
}

/// House (common-area) load, either a single figure or an itemized list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommonAreaLoad {
    #[default]
    None,
    Flat {
        va: f64,
    },
    Itemized(Vec<CommonAreaItem>),
}

impl CommonAreaLoad {
    pub fn items(&self) -> &[CommonAreaItem] {
        match self {
            CommonAreaLoad::Itemized(items) => items,
            _ => &[],
        }
    }

    pub fn flat_va(&self) -> f64 {
        match self {
            CommonAreaLoad::Flat { va } => *va,
            _ => 0.0,
        }
    }
}

/// One line of an itemized common-area load schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonAreaItem {
    pub category: LoadCategory,
    #[serde(default)]
    pub description: String,
    pub unit: InputUnit,
    /// Amount expressed in `unit` for a single piece of equipment
    pub quantity: f64,
    /// Identical pieces of equipment described by this line
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub space_type: Option<SpaceType>,
}

fn default_count() -> u32 {
    1
}

impl CommonAreaItem {
    pub fn new(category: LoadCategory, description: &str, unit: InputUnit, quantity: f64) -> Self {
        Self {
            category,
            description: description.to_string(),
            unit,
            quantity,
            count: 1,
            space_type: None,
        }
    }

    pub fn with_space_type(mut self, space_type: SpaceType) -> Self {
        self.space_type = Some(space_type);
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }
}

/// Common-area load category; each carries its own demand-factor policy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum LoadCategory {
    #[strum(to_string = "Indoor Lighting")]
    IndoorLighting,
    #[strum(to_string = "Outdoor Lighting")]
    OutdoorLighting,
    #[strum(to_string = "Receptacles")]
    Receptacles,
    #[strum(to_string = "Elevators")]
    Elevators,
    #[strum(to_string = "Motors")]
    Motors,
    #[strum(to_string = "Pool/Spa")]
    PoolSpa,
    #[strum(to_string = "HVAC")]
    Hvac,
    #[strum(to_string = "Fire Pump")]
    FirePump,
    #[strum(to_string = "Other")]
    Other,
}

impl LoadCategory {
    /// Loads expected to run three hours or more, sized at 125%
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            LoadCategory::IndoorLighting | LoadCategory::OutdoorLighting | LoadCategory::Hvac
        )
    }

    /// Equipment normally fed by a three-pole breaker on a three-phase service
    pub fn is_polyphase_equipment(&self) -> bool {
        matches!(
            self,
            LoadCategory::Elevators
                | LoadCategory::Motors
                | LoadCategory::PoolSpa
                | LoadCategory::Hvac
                | LoadCategory::FirePump
        )
    }
}

/// Unit the quantity of a common-area item is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputUnit {
    Va,
    SquareFeet,
    Horsepower,
    Tons,
}

/// Space type used for area-based lighting loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum SpaceType {
    Corridor,
    Lobby,
    Stairwell,
    IndoorParking,
    OutdoorParking,
    Amenity,
    Laundry,
    Office,
    PoolDeck,
}

/// How the existing building demand is determined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExistingLoadMethod {
    #[default]
    Calculated,
    UtilityBill,
    LoadStudy,
}

impl ExistingLoadMethod {
    pub fn is_measured(&self) -> bool {
        !matches!(self, ExistingLoadMethod::Calculated)
    }
}

/// Measured peak demand from utility billing or a 30-day load study
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasuredDemand {
    pub peak_kw: f64,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub utility_name: Option<String>,
}

/// Per-unit appliance nameplates used when laying out unit panels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitAppliances {
    #[serde(default)]
    pub range_watts: Option<f64>,
    #[serde(default = "default_true")]
    pub electric_dryer: bool,
    #[serde(default)]
    pub dryer_watts: Option<f64>,
    #[serde(default)]
    pub heat_watts: Option<f64>,
    #[serde(default = "default_true")]
    pub air_conditioning: bool,
    #[serde(default)]
    pub ac_watts: Option<f64>,
    #[serde(default = "default_true")]
    pub electric_water_heater: bool,
    #[serde(default)]
    pub water_heater_watts: Option<f64>,
    #[serde(default = "default_true")]
    pub dishwasher: bool,
    #[serde(default)]
    pub dishwasher_watts: Option<f64>,
    #[serde(default = "default_true")]
    pub disposal: bool,
    #[serde(default)]
    pub disposal_watts: Option<f64>,
}

impl Default for UnitAppliances {
    fn default() -> Self {
        Self {
            range_watts: None,
            electric_dryer: true,
            dryer_watts: None,
            heat_watts: None,
            air_conditioning: true,
            ac_watts: None,
            electric_water_heater: true,
            water_heater_watts: None,
            dishwasher: true,
            dishwasher_watts: None,
            disposal: true,
            disposal_watts: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> BuildingProfile {
        BuildingProfile::new(20, 900.0, ServiceVoltage::V208, Phase::Three, 800)
    }

    #[test]
    fn test_valid_profile_passes() {
        assert!(profile().validate().is_ok());
    }

    #[test]
    fn test_zero_units_rejected() {
        let mut p = profile();
        p.dwelling_units = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_480_single_phase_rejected() {
        let mut p = profile();
        p.voltage = ServiceVoltage::V480;
        p.phase = Phase::Single;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_nan_area_rejected() {
        let mut p = profile();
        p.avg_unit_sqft = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_itemized_count_capped() {
        let motors = |count| {
            CommonAreaLoad::Itemized(vec![CommonAreaItem::new(
                LoadCategory::Motors,
                "exhaust fans",
                InputUnit::Horsepower,
                2.0,
            )
            .with_count(count)])
        };
        let mut p = profile();
        p.common_area = motors(u32::MAX);
        assert!(p.validate().is_err());

        p.common_area = motors(MAX_ITEM_COUNT);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_defaults_from_json() {
        let p: BuildingProfile = serde_json::from_str(
            r#"{"dwelling_units":4,"avg_unit_sqft":700,"voltage":240,"phase":1,"existing_service_amps":400}"#,
        )
        .unwrap();
        assert!(p.electric_cooking);
        assert!(!p.electric_heat);
        assert!(matches!(p.common_area, CommonAreaLoad::None));
        assert!(!p.elevator_present());
        assert_eq!(p.branch_voltage(), 240.0);
    }

    #[test]
    fn test_itemized_common_area_from_json() {
        let load: CommonAreaLoad = serde_json::from_str(
            r#"{"itemized":[{"category":"elevators","unit":"horsepower","quantity":15,"count":2}]}"#,
        )
        .unwrap();
        assert_eq!(load.items().len(), 1);
        assert_eq!(load.items()[0].count, 2);
        assert_eq!(load.flat_va(), 0.0);
    }

    #[test]
    fn test_elevator_inference() {
        let mut p = profile();
        assert!(p.elevator_present());
        p.has_elevator = Some(false);
        assert!(!p.elevator_present());
    }

    #[test]
    fn test_existing_load_method_serde() {
        let m: ExistingLoadMethod = serde_json::from_str("\"utility_bill\"").unwrap();
        assert!(m.is_measured());
        assert_eq!(ExistingLoadMethod::LoadStudy.to_string(), "load_study");
    }
}
