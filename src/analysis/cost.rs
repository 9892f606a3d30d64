use serde::{Deserialize, Serialize};

use super::scenarios::{CapacityScenario, ScenarioKey};

/// Low/high dollar range
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostRange {
    pub low: f64,
    pub high: f64,
}

impl CostRange {
    pub const ZERO: CostRange = CostRange { low: 0.0, high: 0.0 };

    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.low * factor, self.high * factor)
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}

impl std::ops::Add for CostRange {
    type Output = CostRange;

    fn add(self, rhs: CostRange) -> CostRange {
        CostRange::new(self.low + rhs.low, self.high + rhs.high)
    }
}

/// Budgetary unit costs used for scenario ranges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostAssumptions {
    /// Installed cost of one charger and its branch circuit
    pub charger_install: CostRange,
    /// New EV sub-panel and feeder
    pub ev_panel: CostRange,
    /// EVEMS controller, metering and commissioning
    pub evems_system: CostRange,
    /// Networking premium per managed charger
    pub evems_per_charger: CostRange,
    /// Service upgrade cost per added amp
    pub upgrade_per_amp: CostRange,
    /// Utility engineering and coordination fees for a new service
    pub utility_coordination: CostRange,
}

impl Default for CostAssumptions {
    fn default() -> Self {
        Self {
            charger_install: CostRange::new(2_000.0, 4_500.0),
            ev_panel: CostRange::new(4_000.0, 8_000.0),
            evems_system: CostRange::new(8_000.0, 20_000.0),
            evems_per_charger: CostRange::new(300.0, 800.0),
            upgrade_per_amp: CostRange::new(60.0, 120.0),
            utility_coordination: CostRange::new(10_000.0, 35_000.0),
        }
    }
}

impl CostAssumptions {
    pub fn direct(&self, chargers: u32) -> CostRange {
        if chargers == 0 {
            return CostRange::ZERO;
        }
        self.charger_install.scale(chargers as f64) + self.ev_panel
    }

    pub fn managed(&self, chargers: u32) -> CostRange {
        if chargers == 0 {
            return CostRange::ZERO;
        }
        self.direct(chargers) + self.evems_system + self.evems_per_charger.scale(chargers as f64)
    }

    pub fn upgrade(&self, chargers: u32, added_amps: u32) -> CostRange {
        self.direct(chargers)
            + self.upgrade_per_amp.scale(added_amps as f64)
            + self.utility_coordination
    }
}

/// One row of the side-by-side cost table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostComparisonRow {
    pub scenario: ScenarioKey,
    pub name: String,
    pub chargers: u32,
    pub total: CostRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_charger: Option<CostRange>,
    pub necessary: bool,
    pub satisfies_request: bool,
    pub recommended: bool,
}

pub fn cost_comparison<'a>(
    scenarios: impl IntoIterator<Item = &'a CapacityScenario>,
    recommended: Option<ScenarioKey>,
) -> Vec<CostComparisonRow> {
    scenarios
        .into_iter()
        .map(|s| CostComparisonRow {
            scenario: s.key,
            name: s.name.clone(),
            chargers: s.installed_chargers,
            total: s.cost,
            per_charger: (s.installed_chargers > 0 && s.necessary)
                .then(|| s.cost.scale(1.0 / s.installed_chargers as f64)),
            necessary: s.necessary,
            satisfies_request: s.satisfies_request,
            recommended: recommended == Some(s.key),
        })
        .collect()
}
