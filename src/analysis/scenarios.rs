//! The three mutually exclusive ways of adding EV charging to a building:
//! direct connection, EVEMS load sharing and a service upgrade.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

use super::cost::{CostAssumptions, CostRange};
use super::service::EvLoad;
use crate::domain::BuildingProfile;
use crate::nec::tables::{
    EVEMS_MIN_AMPS_PER_CHARGER, EVEMS_SETPOINT_FRACTION, SERVICE_SIZES, SERVICE_SIZING_FACTOR,
};
use crate::nec::{amps, exceeds_table, round_up_to_standard_size};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
pub enum ScenarioKey {
    #[serde(rename = "noEVEMS")]
    #[strum(serialize = "noEVEMS")]
    NoEvems,
    #[serde(rename = "withEVEMS")]
    #[strum(serialize = "withEVEMS")]
    WithEvems,
    #[serde(rename = "withUpgrade")]
    #[strum(serialize = "withUpgrade")]
    WithUpgrade,
}

impl ScenarioKey {
    pub fn title(&self) -> &'static str {
        match self {
            ScenarioKey::NoEvems => "Direct Connection (No EVEMS)",
            ScenarioKey::WithEvems => "Managed Load Sharing (EVEMS)",
            ScenarioKey::WithUpgrade => "Service Upgrade",
        }
    }

    pub fn uses_load_management(&self) -> bool {
        matches!(self, ScenarioKey::WithEvems)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityScenario {
    pub key: ScenarioKey,
    pub name: String,
    pub max_chargers: u32,
    /// Chargers actually built and costed: `max_chargers` capped at the request
    pub installed_chargers: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_per_charger_kw: Option<f64>,
    pub cost: CostRange,
    pub requires_service_upgrade: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_service_amps: Option<u32>,
    /// Supports every requested charger
    pub satisfies_request: bool,
    /// False when a cheaper scenario already covers the request
    pub necessary: bool,
    pub notes: Vec<String>,
}

/// Always all three, never merged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    #[serde(rename = "noEVEMS")]
    pub no_evems: CapacityScenario,
    #[serde(rename = "withEVEMS")]
    pub with_evems: CapacityScenario,
    #[serde(rename = "withUpgrade")]
    pub with_upgrade: CapacityScenario,
}

impl ScenarioSet {
    pub fn get(&self, key: ScenarioKey) -> &CapacityScenario {
        match key {
            ScenarioKey::NoEvems => &self.no_evems,
            ScenarioKey::WithEvems => &self.with_evems,
            ScenarioKey::WithUpgrade => &self.with_upgrade,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapacityScenario> {
        [&self.no_evems, &self.with_evems, &self.with_upgrade].into_iter()
    }

    /// First scenario, in order of cost, that supports the full request
    pub fn recommended(&self) -> Option<ScenarioKey> {
        self.iter().find(|s| s.satisfies_request).map(|s| s.key)
    }
}

/// Everything the scenarios are derived from
#[derive(Debug, Clone, Copy)]
pub struct ScenarioInputs<'a> {
    pub profile: &'a BuildingProfile,
    pub ev: &'a EvLoad,
    pub building_demand_va: f64,
    pub available_capacity_va: f64,
}

impl ScenarioInputs<'_> {
    fn service_voltage(&self) -> f64 {
        self.profile.voltage.volts()
    }

    /// Charger contribution to service line current
    pub fn per_charger_service_amps(&self) -> f64 {
        amps(self.ev.per_charger_va, self.service_voltage(), self.profile.phase)
    }

    pub fn available_capacity_amps(&self) -> f64 {
        amps(
            self.available_capacity_va.max(0.0),
            self.service_voltage(),
            self.profile.phase,
        )
    }

    fn nameplate_va(&self) -> f64 {
        self.ev.amps_per_charger * self.ev.ev_voltage
    }
}

/// Chargers that fit in the available capacity with no load management
pub fn direct_max_chargers(available_amps: f64, per_charger_amps: f64) -> u32 {
    if available_amps <= 0.0 || per_charger_amps <= 0.0 {
        return 0;
    }
    (available_amps / per_charger_amps).floor() as u32
}

pub fn build_scenarios(inputs: &ScenarioInputs<'_>, costs: &CostAssumptions) -> ScenarioSet {
    let no_evems = direct_scenario(inputs, costs);
    let with_evems = managed_scenario(inputs, costs, no_evems.satisfies_request);
    let covered = no_evems.satisfies_request || with_evems.satisfies_request;
    let with_upgrade = upgrade_scenario(inputs, costs, covered);

    debug!(
        direct = no_evems.max_chargers,
        managed = with_evems.max_chargers,
        upgrade_amps = ?with_upgrade.recommended_service_amps,
        "scenarios built"
    );

    ScenarioSet {
        no_evems,
        with_evems,
        with_upgrade,
    }
}

fn direct_scenario(inputs: &ScenarioInputs<'_>, costs: &CostAssumptions) -> CapacityScenario {
    let requested = inputs.ev.charger_count;
    let per_amps = inputs.per_charger_service_amps();
    let available_amps = inputs.available_capacity_amps();
    let max_chargers = direct_max_chargers(available_amps, per_amps);
    let satisfies = max_chargers >= requested;

    let mut notes = vec![format!(
        "{:.0}A available after building demand; each charger draws {:.1}A of service capacity",
        available_amps, per_amps
    )];
    if inputs.available_capacity_va <= 0.0 {
        notes.push("Existing building demand already meets or exceeds the service rating".into());
    } else if !satisfies {
        notes.push(format!(
            "Only {} of {} requested chargers fit at full nameplate load",
            max_chargers, requested
        ));
    }

    CapacityScenario {
        key: ScenarioKey::NoEvems,
        name: ScenarioKey::NoEvems.title().to_string(),
        max_chargers,
        installed_chargers: max_chargers.min(requested),
        power_per_charger_kw: Some(inputs.nameplate_va() / 1000.0),
        cost: costs.direct(max_chargers.min(requested)),
        requires_service_upgrade: false,
        recommended_service_amps: None,
        satisfies_request: satisfies,
        necessary: true,
        notes,
    }
}

fn managed_scenario(
    inputs: &ScenarioInputs<'_>,
    costs: &CostAssumptions,
    direct_satisfies: bool,
) -> CapacityScenario {
    let requested = inputs.ev.charger_count;
    let setpoint_va = inputs.available_capacity_va.max(0.0) * EVEMS_SETPOINT_FRACTION;
    let nameplate_va = inputs.nameplate_va();
    let min_amps = EVEMS_MIN_AMPS_PER_CHARGER.min(inputs.ev.amps_per_charger);
    let min_va = min_amps * inputs.ev.ev_voltage;

    let max_chargers = if min_va > 0.0 {
        (setpoint_va / min_va).floor() as u32
    } else {
        0
    };
    let satisfies = max_chargers >= requested;

    let per_charger_va = if requested > 0 && satisfies {
        (setpoint_va / requested as f64).min(nameplate_va)
    } else {
        min_va.min(nameplate_va)
    };

    let mut notes = Vec::new();
    if direct_satisfies {
        notes.push("Not needed: direct connection already supports every requested charger".into());
    } else {
        notes.push(format!(
            "EVEMS setpoint {:.1} kVA (90% of available capacity) shared across chargers",
            setpoint_va / 1000.0
        ));
        notes.push(format!(
            "Minimum charge rate {:.0}A per charger; output never exceeds the {:.0}A nameplate",
            min_amps, inputs.ev.amps_per_charger
        ));
        if !satisfies {
            notes.push(format!(
                "Setpoint supports {} of {} requested chargers at the minimum rate",
                max_chargers, requested
            ));
        }
    }

    CapacityScenario {
        key: ScenarioKey::WithEvems,
        name: ScenarioKey::WithEvems.title().to_string(),
        max_chargers,
        installed_chargers: max_chargers.min(requested),
        power_per_charger_kw: (max_chargers > 0).then_some(per_charger_va / 1000.0),
        cost: if direct_satisfies {
            CostRange::ZERO
        } else {
            costs.managed(max_chargers.min(requested))
        },
        requires_service_upgrade: false,
        recommended_service_amps: None,
        satisfies_request: satisfies,
        necessary: !direct_satisfies,
        notes,
    }
}

fn upgrade_scenario(
    inputs: &ScenarioInputs<'_>,
    costs: &CostAssumptions,
    already_covered: bool,
) -> CapacityScenario {
    let requested = inputs.ev.charger_count;
    let sizing_va =
        (inputs.building_demand_va + inputs.ev.total_connected_va) * SERVICE_SIZING_FACTOR;
    let required_amps = amps(sizing_va, inputs.service_voltage(), inputs.profile.phase);
    let recommended = round_up_to_standard_size(required_amps, SERVICE_SIZES)
        .max(inputs.profile.existing_service_amps);
    let added_amps = recommended.saturating_sub(inputs.profile.existing_service_amps);

    let mut notes = vec![format!(
        "125% of building + EV demand requires {:.0}A; next standard size is {}A",
        required_amps, recommended
    )];
    if exceeds_table(required_amps, SERVICE_SIZES) {
        notes.push(format!(
            "Required capacity exceeds the largest standard service ({}A); multiple services or medium-voltage service needed",
            recommended
        ));
    }
    if already_covered {
        notes.push("Not needed: request can be met without a service upgrade".into());
    } else {
        notes.push("Requires utility coordination for the new service".into());
    }

    CapacityScenario {
        key: ScenarioKey::WithUpgrade,
        name: ScenarioKey::WithUpgrade.title().to_string(),
        max_chargers: requested,
        installed_chargers: requested,
        power_per_charger_kw: Some(inputs.nameplate_va() / 1000.0),
        cost: if already_covered {
            CostRange::ZERO
        } else {
            costs.upgrade(requested, added_amps)
        },
        requires_service_upgrade: true,
        recommended_service_amps: Some(recommended),
        satisfies_request: true,
        necessary: !already_covered,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::service::{available_capacity_va, calculate_ev_load};
    use crate::domain::{ChargerLevel, EvChargerRequest, Phase, ServiceVoltage};
    use proptest::prelude::*;

    fn build(
        profile: &BuildingProfile,
        request: &EvChargerRequest,
        building_demand_va: f64,
    ) -> ScenarioSet {
        let ev = calculate_ev_load(profile, request, false, building_demand_va);
        let inputs = ScenarioInputs {
            profile,
            ev: &ev,
            building_demand_va,
            available_capacity_va: available_capacity_va(profile, building_demand_va),
        };
        build_scenarios(&inputs, &CostAssumptions::default())
    }

    fn reference_building() -> BuildingProfile {
        BuildingProfile::new(20, 900.0, ServiceVoltage::V208, Phase::Three, 800)
    }

    #[test]
    fn test_reference_building_scenarios() {
        let set = build(
            &reference_building(),
            &EvChargerRequest::new(20, ChargerLevel::Level2, 48.0),
            145_920.0,
        );
        assert_eq!(set.no_evems.max_chargers, 14);
        assert!(!set.no_evems.satisfies_request);
        assert!(set.with_evems.satisfies_request);
        assert!(set.with_evems.necessary);
        assert_eq!(set.with_upgrade.recommended_service_amps, Some(1200));
        assert!(!set.with_upgrade.necessary);
        assert_eq!(set.with_upgrade.cost, CostRange::ZERO);
        assert_eq!(set.recommended(), Some(ScenarioKey::WithEvems));
    }

    #[test]
    fn test_evems_never_exceeds_nameplate() {
        let set = build(
            &reference_building(),
            &EvChargerRequest::new(15, ChargerLevel::Level2, 48.0),
            145_920.0,
        );
        let kw = set.with_evems.power_per_charger_kw.unwrap();
        assert!(kw <= 48.0 * 208.0 / 1000.0 + 1e-9);
    }

    #[test]
    fn test_direct_satisfies_marks_others_unnecessary() {
        let set = build(
            &reference_building(),
            &EvChargerRequest::new(4, ChargerLevel::Level2, 40.0),
            145_920.0,
        );
        assert!(set.no_evems.satisfies_request);
        assert!(!set.with_evems.necessary);
        assert_eq!(set.with_evems.cost, CostRange::ZERO);
        assert!(!set.with_upgrade.necessary);
        assert_eq!(set.recommended(), Some(ScenarioKey::NoEvems));
    }

    #[test]
    fn test_overloaded_building_requires_upgrade() {
        let profile = BuildingProfile::new(10, 900.0, ServiceVoltage::V240, Phase::Single, 100);
        let set = build(&profile, &EvChargerRequest::new(10, ChargerLevel::Level2, 48.0), 60_000.0);
        assert_eq!(set.no_evems.max_chargers, 0);
        assert_eq!(set.with_evems.max_chargers, 0);
        assert_eq!(set.with_evems.power_per_charger_kw, None);
        assert!(set.with_upgrade.necessary);
        assert!(set.with_upgrade.cost.low > 0.0);
        assert_eq!(set.recommended(), Some(ScenarioKey::WithUpgrade));
    }

    #[test]
    fn test_upgrade_beyond_ladder_notes_ceiling() {
        let profile = BuildingProfile::new(200, 1200.0, ServiceVoltage::V208, Phase::Three, 800);
        let set = build(&profile, &EvChargerRequest::new(400, ChargerLevel::Level2, 80.0), 500_000.0);
        assert_eq!(set.with_upgrade.recommended_service_amps, Some(4000));
        assert!(set.with_upgrade.notes.iter().any(|n| n.contains("largest standard service")));
    }

    #[test]
    fn test_scenario_key_wire_names() {
        assert_eq!(serde_json::to_string(&ScenarioKey::NoEvems).unwrap(), "\"noEVEMS\"");
        assert_eq!(ScenarioKey::WithUpgrade.to_string(), "withUpgrade");
        assert_eq!("withEVEMS".parse::<ScenarioKey>().unwrap(), ScenarioKey::WithEvems);
    }

    proptest! {
        #[test]
        fn prop_direct_floor_division(available in 0.0f64..5000.0, per in 1.0f64..200.0) {
            let n = direct_max_chargers(available, per);
            prop_assert!(n as f64 * per <= available + 1e-9);
            prop_assert!((n as f64 + 1.0) * per > available);
        }
    }
}
