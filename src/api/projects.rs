use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::analysis::EntityRequest;
use super::error::ApiError;
use super::response::ApiResponse;
use crate::analysis::ScenarioKey;
use crate::app_state::AppState;
use crate::population::{
    clear_project, ClearSummary, PopulateOptions, PopulationOrchestrator, PopulationResult,
};

#[derive(Debug, Deserialize)]
pub struct PopulateRequest {
    #[serde(flatten)]
    pub entities: EntityRequest,
    /// Clear existing electrical data first instead of refusing
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Serialize)]
pub struct PopulateResponse {
    pub project_id: Uuid,
    pub scenario: ScenarioKey,
    #[serde(flatten)]
    pub result: PopulationResult,
}

/// POST /api/v1/projects/:project_id/electrical
pub async fn populate_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<PopulateRequest>,
) -> Result<ApiResponse<PopulateResponse>, ApiError> {
    let plan = body.entities.plan(&state.cfg)?;
    let orchestrator = PopulationOrchestrator::new(state.repo.as_ref(), state.cfg.population);

    let result = orchestrator
        .populate(
            project_id,
            &plan.graph,
            PopulateOptions {
                replace_existing: body.replace,
            },
            |progress| {
                debug!(
                    %project_id,
                    step = %progress.step,
                    current = progress.current,
                    total = progress.total,
                    "population progress"
                )
            },
        )
        .await?;

    let response = PopulateResponse {
        project_id,
        scenario: plan.scenario,
        result,
    };
    if let Some(message) = response.result.error.clone() {
        return Ok(ApiResponse::failure(response, message));
    }

    info!(%project_id, scenario = %plan.scenario, "project electrical data populated");
    Ok(ApiResponse::success(response).with_status(StatusCode::CREATED))
}

/// DELETE /api/v1/projects/:project_id/electrical
pub async fn clear_project_data(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ApiResponse<ClearSummary>, ApiError> {
    let summary = clear_project(state.repo.as_ref(), project_id).await?;
    Ok(ApiResponse::success(summary))
}
