use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::phase_balance::PhaseBalance;
use super::scenarios::{ScenarioKey, ScenarioSet};
use super::service::ServiceAnalysis;
use super::transformer::{TransformerCheck, TransformerStatus};
use super::LoadBreakdownItem;
use crate::nec::citations;
use crate::nec::tables::{OPTIONAL_METHOD_MIN_UNITS, PHASE_IMBALANCE_LIMIT_PERCENT};

/// Findings raised while reviewing an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComplianceWarning {
    /// Total demand exceeds the service rating
    ServiceOverloaded { utilization_percent: f64 },
    /// Above 90%
    ServiceNearCapacity { utilization_percent: f64 },
    /// Above 80%
    ServiceHighUtilization { utilization_percent: f64 },
    /// Optional method inapplicable, factor 1.0 used
    OptionalMethodNotApplicable { dwelling_units: u32 },
    PhaseImbalance { imbalance_percent: f64, limit_percent: f64 },
    TransformerLoading {
        utilization_percent: f64,
        status: TransformerStatus,
    },
}

impl ComplianceWarning {
    pub fn message(&self) -> String {
        match self {
            ComplianceWarning::ServiceOverloaded { utilization_percent } => format!(
                "Service utilization {:.1}% exceeds 100% of the existing rating",
                utilization_percent
            ),
            ComplianceWarning::ServiceNearCapacity { utilization_percent } => format!(
                "Service utilization {:.1}% is above 90%",
                utilization_percent
            ),
            ComplianceWarning::ServiceHighUtilization { utilization_percent } => format!(
                "Service utilization {:.1}% is above 80%",
                utilization_percent
            ),
            ComplianceWarning::OptionalMethodNotApplicable { dwelling_units } => format!(
                "{} dwelling unit(s): optional method requires at least {}; 100% demand factor applied",
                dwelling_units, OPTIONAL_METHOD_MIN_UNITS
            ),
            ComplianceWarning::PhaseImbalance {
                imbalance_percent,
                limit_percent,
            } => format!(
                "Phase imbalance {:.1}% exceeds {:.0}% limit",
                imbalance_percent, limit_percent
            ),
            ComplianceWarning::TransformerLoading {
                utilization_percent,
                status,
            } => format!(
                "Transformer at {:.1}% of rating ({})",
                utilization_percent, status
            ),
        }
    }

    /// Blocks approval of the design as submitted
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            ComplianceWarning::ServiceOverloaded { .. }
                | ComplianceWarning::TransformerLoading {
                    status: TransformerStatus::UpgradeRequired,
                    ..
                }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub nec_citations: Vec<String>,
    pub warnings: Vec<ComplianceWarning>,
    pub recommendations: Vec<String>,
    pub compliant: bool,
}

impl ComplianceSummary {
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ComplianceWarning::message).collect()
    }
}

/// Everything the rollup looks at
pub struct ComplianceInputs<'a> {
    pub dwelling_units: u32,
    pub breakdown: &'a [LoadBreakdownItem],
    pub service: &'a ServiceAnalysis,
    pub scenarios: &'a ScenarioSet,
    pub recommended: Option<ScenarioKey>,
    pub phase_balance: Option<&'a PhaseBalance>,
    pub transformer: Option<&'a TransformerCheck>,
}

pub fn compliance_summary(inputs: &ComplianceInputs<'_>) -> ComplianceSummary {
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();
    let utilization = inputs.service.utilization_percent;

    if utilization > 100.0 {
        warnings.push(ComplianceWarning::ServiceOverloaded {
            utilization_percent: utilization,
        });
    } else if utilization > 90.0 {
        warnings.push(ComplianceWarning::ServiceNearCapacity {
            utilization_percent: utilization,
        });
    } else if utilization > 80.0 {
        warnings.push(ComplianceWarning::ServiceHighUtilization {
            utilization_percent: utilization,
        });
    }

    if inputs.dwelling_units < OPTIONAL_METHOD_MIN_UNITS {
        warnings.push(ComplianceWarning::OptionalMethodNotApplicable {
            dwelling_units: inputs.dwelling_units,
        });
    }

    if let Some(balance) = inputs.phase_balance.filter(|b| !b.acceptable) {
        warnings.push(ComplianceWarning::PhaseImbalance {
            imbalance_percent: balance.imbalance_percent,
            limit_percent: PHASE_IMBALANCE_LIMIT_PERCENT,
        });
        recommendations.push("Rebalance charger circuits across phases A, B and C".to_string());
    }

    if let Some(check) = inputs
        .transformer
        .filter(|t| t.status != TransformerStatus::Adequate)
    {
        warnings.push(ComplianceWarning::TransformerLoading {
            utilization_percent: check.utilization_percent,
            status: check.status,
        });
        recommendations.push(match check.status {
            TransformerStatus::UpgradeRequired => {
                "Request a transformer upgrade from the serving utility".to_string()
            }
            _ => "Confirm transformer loading with the serving utility".to_string(),
        });
    }

    match inputs.recommended {
        Some(ScenarioKey::NoEvems) => recommendations
            .push("Connect chargers directly; existing service has sufficient capacity".to_string()),
        Some(ScenarioKey::WithEvems) => {
            recommendations.push(format!(
                "Install an EVEMS to share capacity across {} chargers",
                inputs.requested_chargers()
            ));
        }
        Some(ScenarioKey::WithUpgrade) => {
            if let Some(amps) = inputs.scenarios.with_upgrade.recommended_service_amps {
                recommendations.push(format!("Upgrade the service to {}A", amps));
            }
        }
        None => {}
    }

    let nec_citations = citations_for(inputs);
    let compliant = !warnings.iter().any(ComplianceWarning::is_violation);

    ComplianceSummary {
        nec_citations,
        warnings,
        recommendations,
        compliant,
    }
}

impl ComplianceInputs<'_> {
    /// The upgrade scenario always carries the full request
    fn requested_chargers(&self) -> u32 {
        self.scenarios.with_upgrade.max_chargers
    }
}

fn citations_for(inputs: &ComplianceInputs<'_>) -> Vec<String> {
    let mut refs: Vec<String> = inputs
        .breakdown
        .iter()
        .flat_map(|item| item.nec_reference.split(" / "))
        .map(str::to_string)
        .collect();

    refs.push(citations::EV_LOAD.to_string());
    refs.push(citations::EVSE_BRANCH.to_string());
    refs.push(citations::SERVICE_RATING.to_string());
    if inputs.recommended == Some(ScenarioKey::WithEvems) {
        refs.push(citations::EVEMS.to_string());
        refs.push(citations::LOAD_MANAGEMENT.to_string());
    }
    if inputs.transformer.is_some() {
        refs.push(citations::TRANSFORMER.to_string());
    }

    refs.into_iter().unique().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cost::CostAssumptions;
    use crate::analysis::phase_balance::balance_phases;
    use crate::analysis::scenarios::{build_scenarios, ScenarioInputs};
    use crate::analysis::service::{analyze_service, available_capacity_va, calculate_ev_load};
    use crate::analysis::transformer::check_transformer;
    use crate::domain::{BuildingProfile, ChargerLevel, EvChargerRequest, Phase, ServiceVoltage};

    fn fixture(units: u32) -> (ServiceAnalysis, ScenarioSet) {
        let profile = BuildingProfile::new(units, 900.0, ServiceVoltage::V208, Phase::Three, 800);
        let ev = calculate_ev_load(
            &profile,
            &EvChargerRequest::new(20, ChargerLevel::Level2, 48.0),
            false,
            145_920.0,
        );
        let service = analyze_service(&profile, 145_920.0, &ev);
        let scenarios = build_scenarios(
            &ScenarioInputs {
                profile: &profile,
                ev: &ev,
                building_demand_va: 145_920.0,
                available_capacity_va: available_capacity_va(&profile, 145_920.0),
            },
            &CostAssumptions::default(),
        );
        (service, scenarios)
    }

    fn breakdown() -> Vec<LoadBreakdownItem> {
        vec![
            LoadBreakdownItem {
                category: "General Lighting".into(),
                description: String::new(),
                connected_va: 1.0,
                demand_va: 1.0,
                demand_factor: 1.0,
                nec_reference: "NEC 220.84(C)(1) / NEC Table 220.84".into(),
            },
            LoadBreakdownItem {
                category: "Laundry".into(),
                description: String::new(),
                connected_va: 1.0,
                demand_va: 1.0,
                demand_factor: 1.0,
                nec_reference: "NEC 220.84(C)(2) / NEC Table 220.84".into(),
            },
        ]
    }

    #[test]
    fn test_overloaded_service_not_compliant() {
        let (service, scenarios) = fixture(20);
        let items = breakdown();
        let summary = compliance_summary(&ComplianceInputs {
            dwelling_units: 20,
            breakdown: &items,
            service: &service,
            scenarios: &scenarios,
            recommended: scenarios.recommended(),
            phase_balance: None,
            transformer: None,
        });
        assert!(!summary.compliant);
        assert!(matches!(summary.warnings[0], ComplianceWarning::ServiceOverloaded { .. }));
        assert!(summary.recommendations.iter().any(|r| r.contains("EVEMS")));
    }

    #[test]
    fn test_citations_deduplicated() {
        let (service, scenarios) = fixture(20);
        let items = breakdown();
        let summary = compliance_summary(&ComplianceInputs {
            dwelling_units: 20,
            breakdown: &items,
            service: &service,
            scenarios: &scenarios,
            recommended: scenarios.recommended(),
            phase_balance: None,
            transformer: None,
        });
        let table_refs = summary
            .nec_citations
            .iter()
            .filter(|c| c.as_str() == "NEC Table 220.84")
            .count();
        assert_eq!(table_refs, 1);
        assert!(summary.nec_citations.contains(&citations::EVEMS.to_string()));
    }

    #[test]
    fn test_small_building_phase_and_transformer_warnings() {
        let (service, scenarios) = fixture(2);
        let balance = balance_phases(4, 48.0, 0.0);
        let transformer = check_transformer(300.0, 240_000.0);
        let summary = compliance_summary(&ComplianceInputs {
            dwelling_units: 2,
            breakdown: &[],
            service: &service,
            scenarios: &scenarios,
            recommended: None,
            phase_balance: Some(&balance),
            transformer: Some(&transformer),
        });
        let kinds: Vec<_> = summary.warning_messages();
        assert!(kinds.iter().any(|m| m.contains("optional method")));
        assert!(kinds.iter().any(|m| m.contains("Phase imbalance")));
        assert!(kinds.iter().any(|m| m.contains("Transformer")));
        assert!(summary.nec_citations.contains(&citations::TRANSFORMER.to_string()));
    }
}
