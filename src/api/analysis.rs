use std::time::Instant;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ApiError;
use super::response::ApiResponse;
use crate::analysis::{analyze, AnalysisOptions, CapacityAnalysis, ScenarioKey};
use crate::app_state::AppState;
use crate::config::Config;
use crate::domain::{BuildingProfile, EvChargerRequest, UnitAppliances};
use crate::generator::{
    generate_entities, utilization_report, EntityGraph, GenerationRequest, GraphSummary,
    PanelUtilization,
};

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub building: BuildingProfile,
    pub ev_chargers: EvChargerRequest,
    /// Missing options, or options without `costs`, use the configured cost assumptions
    #[serde(default)]
    pub options: Option<AnalysisOptions>,
}

impl AnalysisRequest {
    pub fn run(&self, cfg: &Config) -> Result<CapacityAnalysis, ApiError> {
        let mut options = self.options.clone().unwrap_or_default();
        options.costs.get_or_insert_with(|| cfg.costs.clone());
        Ok(analyze(&self.building, &self.ev_chargers, &options)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityRequest {
    #[serde(flatten)]
    pub analysis: AnalysisRequest,
    /// Defaults to the recommended scenario, or the upgrade when none satisfies the request
    #[serde(default)]
    pub scenario: Option<ScenarioKey>,
    #[serde(default)]
    pub appliances: UnitAppliances,
}

/// Analysis, chosen scenario and generated graph for one request
pub struct Plan {
    pub analysis: CapacityAnalysis,
    pub scenario: ScenarioKey,
    pub graph: EntityGraph,
    pub utilization: Vec<PanelUtilization>,
}

impl EntityRequest {
    pub fn plan(&self, cfg: &Config) -> Result<Plan, ApiError> {
        let analysis = self.analysis.run(cfg)?;
        let scenario = self
            .scenario
            .or(analysis.recommended_scenario)
            .unwrap_or(ScenarioKey::WithUpgrade);

        let request = GenerationRequest {
            analysis: &analysis,
            scenario,
            building: &self.analysis.building,
            appliances: &self.appliances,
        };
        let graph = generate_entities(&request);
        let utilization = utilization_report(&graph, request.design_demand_va());

        Ok(Plan {
            analysis,
            scenario,
            graph,
            utilization,
        })
    }
}

/// POST /api/v1/analysis
pub async fn run_analysis(
    State(state): State<AppState>,
    Json(body): Json<AnalysisRequest>,
) -> Result<ApiResponse<CapacityAnalysis>, ApiError> {
    let start = Instant::now();
    let analysis = body.run(&state.cfg)?;
    info!(
        units = body.building.dwelling_units,
        chargers = body.ev_chargers.charger_count,
        recommended = ?analysis.recommended_scenario,
        "capacity analysis complete"
    );
    Ok(ApiResponse::success(analysis).with_duration(start.elapsed().as_millis() as u64))
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub scenario: ScenarioKey,
    pub summary: GraphSummary,
    pub graph: EntityGraph,
    pub utilization: Vec<PanelUtilization>,
}

/// POST /api/v1/entities/preview
pub async fn preview_entities(
    State(state): State<AppState>,
    Json(body): Json<EntityRequest>,
) -> Result<ApiResponse<PreviewResponse>, ApiError> {
    let start = Instant::now();
    let plan = body.plan(&state.cfg)?;
    let summary = plan.graph.summary();
    Ok(ApiResponse::success(PreviewResponse {
        scenario: plan.scenario,
        summary,
        graph: plan.graph,
        utilization: plan.utilization,
    })
    .with_count(summary.total_panels)
    .with_duration(start.elapsed().as_millis() as u64))
}
