//! Analyze, generate, populate and clear against the in-memory store.

use ev_capacity_planner::analysis::{analyze, AnalysisOptions, CapacityAnalysis, ScenarioKey};
use ev_capacity_planner::config::PopulationConfig;
use ev_capacity_planner::domain::{
    BuildingProfile, ChargerLevel, EvChargerRequest, Phase, ServiceVoltage, UnitAppliances,
};
use ev_capacity_planner::generator::{generate_entities, EntityGraph, GenerationRequest};
use ev_capacity_planner::population::{
    clear_project, ElectricalRepository, MemoryRepository, PopulateOptions,
    PopulationOrchestrator, PopulationStep, Table,
};
use uuid::Uuid;

fn reference_building() -> (BuildingProfile, CapacityAnalysis) {
    let profile = BuildingProfile::new(20, 900.0, ServiceVoltage::V208, Phase::Three, 800);
    let request = EvChargerRequest::new(20, ChargerLevel::Level2, 48.0);
    let analysis = analyze(&profile, &request, &AnalysisOptions::default())
        .expect("reference building analyzes");
    (profile, analysis)
}

fn generate(profile: &BuildingProfile, analysis: &CapacityAnalysis, scenario: ScenarioKey) -> EntityGraph {
    generate_entities(&GenerationRequest {
        analysis,
        scenario,
        building: profile,
        appliances: &UnitAppliances::default(),
    })
}

#[test]
fn reference_building_scenarios() {
    let (_, analysis) = reference_building();

    assert_eq!(analysis.scenarios.no_evems.max_chargers, 14);
    assert!(!analysis.scenarios.no_evems.satisfies_request);
    assert!(analysis.scenarios.with_evems.satisfies_request);
    assert_eq!(analysis.recommended_scenario, Some(ScenarioKey::WithEvems));
    assert_eq!(analysis.scenarios.with_upgrade.recommended_service_amps, Some(1200));
    assert!(analysis.phase_balance.is_some());
    assert!(analysis.compliance.nec_citations.iter().any(|c| c.contains("625")));
}

#[tokio::test]
async fn clear_then_regenerate_is_deterministic() {
    let (profile, analysis) = reference_building();
    let repo = MemoryRepository::new();
    let project = Uuid::new_v4();
    let orchestrator = PopulationOrchestrator::new(&repo, PopulationConfig::default());

    let first_graph = generate(&profile, &analysis, ScenarioKey::WithEvems);
    let first = orchestrator
        .populate(project, &first_graph, PopulateOptions::default(), |_| {})
        .await
        .unwrap();
    assert!(first.success);

    let cleared = clear_project(&repo, project).await.unwrap();
    assert_eq!(cleared.panels as usize, first.summary.total_panels);
    assert_eq!(cleared.meters as usize, first.summary.total_meters);
    assert_eq!(cleared.circuits as usize, first.summary.total_circuits);
    assert_eq!(cleared.meter_stacks, 1);
    for table in [Table::Panels, Table::Meters, Table::Circuits, Table::MeterStacks] {
        assert_eq!(repo.count(table, project).await.unwrap(), 0);
    }

    let second_graph = generate(&profile, &analysis, ScenarioKey::WithEvems);
    let second = orchestrator
        .populate(project, &second_graph, PopulateOptions::default(), |_| {})
        .await
        .unwrap();
    assert!(second.success);
    assert_eq!(first.summary, second.summary);
    assert_eq!(first_graph.summary().total_panels, second.summary.total_panels);
}

#[tokio::test]
async fn failed_meter_batch_reports_committed_rows() {
    let (profile, analysis) = reference_building();
    let repo = MemoryRepository::new();
    repo.fail_after(Table::Meters, 10);
    let graph = generate(&profile, &analysis, ScenarioKey::WithEvems);

    let result = PopulationOrchestrator::new(&repo, PopulationConfig::default())
        .populate(Uuid::new_v4(), &graph, PopulateOptions::default(), |_| {})
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.failed_step, Some(PopulationStep::Meters));
    assert_eq!(result.created.unit_panel_ids.len(), 20);
    assert_eq!(result.created.meter_ids.len(), 10);
    assert!(result.created.circuit_ids.is_empty());
    assert!(result.created.feeder_ids.is_empty());
    assert_eq!(repo.rows(Table::Meters).len(), 10);
}

#[tokio::test]
async fn projects_are_isolated() {
    let (profile, analysis) = reference_building();
    let repo = MemoryRepository::new();
    let graph = generate(&profile, &analysis, ScenarioKey::NoEvems);
    let orchestrator = PopulationOrchestrator::new(&repo, PopulationConfig::default());

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    for project in [a, b] {
        orchestrator
            .populate(project, &graph, PopulateOptions::default(), |_| {})
            .await
            .unwrap();
    }

    clear_project(&repo, a).await.unwrap();
    assert_eq!(repo.count(Table::Panels, a).await.unwrap(), 0);
    assert_eq!(
        repo.count(Table::Panels, b).await.unwrap() as usize,
        graph.summary().total_panels
    );
}
