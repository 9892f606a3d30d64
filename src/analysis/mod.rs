//! Scenario analyzer.
//!
//! `analyze` is a pure function of its inputs: it determines the existing
//! building demand (calculated or measured), the EV load, the service
//! utilization, and the three capacity scenarios, then rolls up the optional
//! phase-balance and transformer checks into a compliance summary and a cost
//! comparison.

pub mod building_load;
pub mod common_area;
pub mod compliance;
pub mod cost;
pub mod error;
pub mod phase_balance;
pub mod scenarios;
pub mod service;
pub mod transformer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

pub use building_load::{calculate_building_load, BuildingLoad};
pub use common_area::{aggregate_common_area, CommonAreaSummary};
pub use compliance::{ComplianceSummary, ComplianceWarning};
pub use cost::{CostAssumptions, CostComparisonRow, CostRange};
pub use error::{AnalysisError, AnalysisResult};
pub use phase_balance::{balance_phases, PhaseBalance};
pub use scenarios::{CapacityScenario, ScenarioKey, ScenarioSet};
pub use service::{EvLoad, ServiceAnalysis};
pub use transformer::{TransformerCheck, TransformerStatus};

use crate::domain::{BuildingProfile, EvChargerRequest, ExistingLoadMethod, MeasuredDemand};

/// One line of a load explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBreakdownItem {
    pub category: String,
    pub description: String,
    pub connected_va: f64,
    pub demand_va: f64,
    pub demand_factor: f64,
    pub nec_reference: String,
}

/// Optional analysis inputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Utility transformer rating; the transformer check runs only when set
    pub transformer_kva: Option<f64>,
    /// Count EV demand at the EVEMS setpoint instead of full nameplate
    pub load_management: bool,
    pub existing_load_method: ExistingLoadMethod,
    pub measured_demand: Option<MeasuredDemand>,
    /// Built-in cost assumptions apply when unset
    pub costs: Option<CostAssumptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityAnalysis {
    pub generated_at: DateTime<Utc>,
    pub building_load: BuildingLoad,
    pub ev_load: EvLoad,
    pub service: ServiceAnalysis,
    pub scenarios: ScenarioSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_scenario: Option<ScenarioKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_balance: Option<PhaseBalance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformer: Option<TransformerCheck>,
    pub compliance: ComplianceSummary,
    pub cost_comparison: Vec<CostComparisonRow>,
}

impl CapacityAnalysis {
    pub fn scenario(&self, key: ScenarioKey) -> &CapacityScenario {
        self.scenarios.get(key)
    }
}

fn check_inputs(
    profile: &BuildingProfile,
    request: &EvChargerRequest,
    options: &AnalysisOptions,
) -> AnalysisResult<()> {
    profile.validate()?;
    request.validate()?;

    if request.amps_per_charger.is_some_and(|a| !a.is_finite()) {
        return Err(AnalysisError::InvalidInput(
            "amps_per_charger must be a finite number".to_string(),
        ));
    }
    if let Some(kva) = options.transformer_kva {
        if !kva.is_finite() || kva <= 0.0 {
            return Err(AnalysisError::InvalidInput(format!(
                "transformer_kva must be positive, got {}",
                kva
            )));
        }
    }
    Ok(())
}

/// Run the full capacity analysis for one building and charger request
#[instrument(skip_all, fields(units = profile.dwelling_units, chargers = request.charger_count))]
pub fn analyze(
    profile: &BuildingProfile,
    request: &EvChargerRequest,
    options: &AnalysisOptions,
) -> AnalysisResult<CapacityAnalysis> {
    check_inputs(profile, request, options)?;

    let building_load = calculate_building_load(
        profile,
        options.existing_load_method,
        options.measured_demand.as_ref(),
    );
    let building_demand_va = building_load.total_demand_va;

    let ev_load =
        service::calculate_ev_load(profile, request, options.load_management, building_demand_va);
    let service = service::analyze_service(profile, building_demand_va, &ev_load);

    let costs = options.costs.clone().unwrap_or_default();
    let scenario_set = scenarios::build_scenarios(
        &scenarios::ScenarioInputs {
            profile,
            ev: &ev_load,
            building_demand_va,
            available_capacity_va: service.available_capacity_va,
        },
        &costs,
    );
    let recommended_scenario = scenario_set.recommended();

    let phase_balance = (profile.phase.is_three_phase() && request.charger_count > 0).then(|| {
        balance_phases(
            request.charger_count,
            ev_load.amps_per_charger,
            service.building_demand_amps,
        )
    });

    let transformer = options
        .transformer_kva
        .map(|kva| transformer::check_transformer(kva, service.total_demand_va));

    let compliance = compliance::compliance_summary(&compliance::ComplianceInputs {
        dwelling_units: profile.dwelling_units,
        breakdown: &building_load.items,
        service: &service,
        scenarios: &scenario_set,
        recommended: recommended_scenario,
        phase_balance: phase_balance.as_ref(),
        transformer: transformer.as_ref(),
    });

    let cost_comparison = cost::cost_comparison(scenario_set.iter(), recommended_scenario);

    info!(
        demand_factor = building_load.demand_factor,
        utilization = service.utilization_percent,
        recommended = ?recommended_scenario,
        "capacity analysis complete"
    );

    Ok(CapacityAnalysis {
        generated_at: Utc::now(),
        building_load,
        ev_load,
        service,
        scenarios: scenario_set,
        recommended_scenario,
        phase_balance,
        transformer,
        compliance,
        cost_comparison,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChargerLevel, Phase, ServiceVoltage};

    fn reference() -> (BuildingProfile, EvChargerRequest) {
        (
            BuildingProfile::new(20, 900.0, ServiceVoltage::V208, Phase::Three, 800),
            EvChargerRequest::new(20, ChargerLevel::Level2, 48.0),
        )
    }

    #[test]
    fn test_reference_building() {
        let (profile, request) = reference();
        let result = analyze(&profile, &request, &AnalysisOptions::default()).unwrap();

        assert_eq!(result.building_load.demand_factor, 0.38);
        assert!(result.scenarios.no_evems.max_chargers < 20);
        assert_eq!(result.recommended_scenario, Some(ScenarioKey::WithEvems));
        assert_eq!(result.cost_comparison.len(), 3);
        assert!(result
            .cost_comparison
            .iter()
            .all(|row| row.total.low >= 0.0 && row.total.high >= row.total.low));
        assert!(result.phase_balance.as_ref().unwrap().acceptable);
        assert!(result.transformer.is_none());
    }

    #[test]
    fn test_single_phase_skips_phase_balance() {
        let profile = BuildingProfile::new(8, 750.0, ServiceVoltage::V240, Phase::Single, 400);
        let request = EvChargerRequest::new(4, ChargerLevel::Level2, 40.0);
        let result = analyze(&profile, &request, &AnalysisOptions::default()).unwrap();
        assert!(result.phase_balance.is_none());
    }

    #[test]
    fn test_transformer_check_runs_when_rated() {
        let (profile, request) = reference();
        let options = AnalysisOptions {
            transformer_kva: Some(300.0),
            ..Default::default()
        };
        let result = analyze(&profile, &request, &options).unwrap();
        let check = result.transformer.unwrap();
        assert_eq!(check.status, TransformerStatus::UpgradeRequired);
    }

    #[test]
    fn test_load_management_reduces_utilization() {
        let (profile, request) = reference();
        let plain = analyze(&profile, &request, &AnalysisOptions::default()).unwrap();
        let managed = analyze(
            &profile,
            &request,
            &AnalysisOptions {
                load_management: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(managed.service.utilization_percent < plain.service.utilization_percent);
        assert!(managed.service.utilization_percent <= 100.0);
    }

    #[test]
    fn test_invalid_configuration_is_an_error() {
        let (mut profile, request) = reference();
        profile.voltage = ServiceVoltage::V480;
        profile.phase = Phase::Single;
        assert!(matches!(
            analyze(&profile, &request, &AnalysisOptions::default()),
            Err(AnalysisError::Validation(_))
        ));

        let (profile, _) = reference();
        let options = AnalysisOptions {
            transformer_kva: Some(-5.0),
            ..Default::default()
        };
        assert!(matches!(
            analyze(&profile, &request, &options),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_cost_comparison_uses_installed_chargers() {
        let (profile, request) = reference();
        let result = analyze(&profile, &request, &AnalysisOptions::default()).unwrap();
        let managed = &result.cost_comparison[1];
        assert_eq!(managed.scenario, ScenarioKey::WithEvems);
        assert!(result.scenarios.with_evems.max_chargers > 20);
        assert_eq!(managed.chargers, 20);
        let per = managed.per_charger.unwrap();
        assert!((per.low - 58_000.0 / 20.0).abs() < 1e-6);

        let small = EvChargerRequest::new(4, ChargerLevel::Level2, 48.0);
        let result = analyze(&profile, &small, &AnalysisOptions::default()).unwrap();
        let direct = &result.cost_comparison[0];
        assert_eq!(result.scenarios.no_evems.max_chargers, 14);
        assert_eq!(direct.chargers, 4);
        assert_eq!(direct.total.low, 12_000.0);
        assert!((direct.per_charger.unwrap().low - 3_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: AnalysisOptions =
            serde_json::from_str(r#"{"existing_load_method":"utility_bill","measured_demand":{"peak_kw":150}}"#)
                .unwrap();
        assert!(options.existing_load_method.is_measured());
        assert!(!options.load_management);
        assert!(options.costs.is_none());
    }
}
