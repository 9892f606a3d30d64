pub mod analysis;
pub mod error;
pub mod health;
pub mod projects;
pub mod response;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::app_state::AppState;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

fn v1() -> Router<AppState> {
    Router::new()
        .route("/analysis", post(analysis::run_analysis))
        .route("/entities/preview", post(analysis::preview_entities))
        .route(
            "/projects/:project_id/electrical",
            post(projects::populate_project).delete(projects::clear_project_data),
        )
}

pub fn router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.cfg.server.request_timeout_secs);
    let enable_cors = state.cfg.server.enable_cors;

    let mut router = Router::new()
        .route("/healthz", get(health::healthz))
        .nest("/api/v1", v1())
        .with_state(state);

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(BODY_LIMIT_BYTES))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    timeout,
                )),
        )
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CostRange;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app() -> Router {
        router(AppState::in_memory(Config::default()))
    }

    fn building() -> Value {
        json!({
            "building": {
                "dwelling_units": 20,
                "avg_unit_sqft": 900.0,
                "voltage": 208,
                "phase": 3,
                "existing_service_amps": 800
            },
            "ev_chargers": { "charger_count": 20, "level": "level2", "amps_per_charger": 48.0 }
        })
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_healthz() {
        let (status, body) = send(app(), Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"]["kind"], "memory");
    }

    #[tokio::test]
    async fn test_analysis_endpoint() {
        let (status, body) = send(app(), Method::POST, "/api/v1/analysis", Some(building())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["recommended_scenario"], "withEVEMS");
        assert_eq!(body["data"]["scenarios"]["noEVEMS"]["max_chargers"], 14);
    }

    #[tokio::test]
    async fn test_analysis_options_keep_configured_costs() {
        let mut cfg = Config::default();
        cfg.costs.charger_install = CostRange::new(9_000.0, 9_000.0);
        let app = router(AppState::in_memory(cfg));

        let mut body = building();
        body["options"] = json!({ "load_management": true });
        let (status, body) = send(app, Method::POST, "/api/v1/analysis", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        let no_evems = &body["data"]["scenarios"]["noEVEMS"];
        let installed = no_evems["installed_chargers"].as_f64().unwrap();
        let expected = installed * 9_000.0 + 4_000.0;
        assert_eq!(no_evems["cost"]["low"].as_f64().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_analysis_rejects_invalid_building() {
        let mut body = building();
        body["building"]["dwelling_units"] = json!(0);
        let (status, body) = send(app(), Method::POST, "/api/v1/analysis", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "ValidationError");
    }

    #[tokio::test]
    async fn test_preview_defaults_to_recommended_scenario() {
        let (status, body) =
            send(app(), Method::POST, "/api/v1/entities/preview", Some(building())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["scenario"], "withEVEMS");
        assert_eq!(body["data"]["summary"]["total_meters"], 22);
    }

    #[tokio::test]
    async fn test_populate_conflict_then_clear() {
        let app = app();
        let uri = format!("/api/v1/projects/{}/electrical", Uuid::new_v4());

        let (status, body) = send(app.clone(), Method::POST, &uri, Some(building())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["success"], true);
        assert_eq!(body["data"]["summary"]["total_panels"], 23);

        let (status, _) = send(app.clone(), Method::POST, &uri, Some(building())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(app.clone(), Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["panels"], 23);
    }
}
