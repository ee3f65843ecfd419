//! axum HTTP surface.
//!
//! Modeled on `api.rs`: an `AppState` wrapping a job store,
//! a CORS-permissive router, and a thin handler per route.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::demo_data::generate_demo_request;
use crate::domain::RouteRequest;
use crate::export;
use crate::job::{JobStatus, JobStore};
use crate::provider::MapProvider;

pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub provider: Arc<dyn MapProvider>,
    pub config: Config,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/demo-data", get(demo_data))
        .route("/route-plans", post(create_route_plan))
        .route("/route-plans/{id}", get(get_route_plan))
        .route("/route-plans/{id}", delete(cancel_route_plan))
        .route("/route-plans/{id}/export/{format}", get(export_route_plan))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn demo_data() -> Json<RouteRequest> {
    Json(generate_demo_request())
}

#[derive(Serialize)]
struct CreateJobResponse {
    job_id: String,
}

async fn create_route_plan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RouteRequest>,
) -> Json<CreateJobResponse> {
    let job_id = state.jobs.start(request, state.provider.clone(), state.config.clone());
    Json(CreateJobResponse { job_id })
}

#[derive(Serialize)]
struct JobStatusResponse {
    job_id: String,
    status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<crate::domain::RoutePlanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn get_route_plan(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<JobStatusResponse>, (StatusCode, String)> {
    let job = state.jobs.get(&id).ok_or((StatusCode::NOT_FOUND, "job not found".to_string()))?;
    let guard = job.read();
    Ok(Json(JobStatusResponse {
        job_id: guard.id.clone(),
        status: guard.status,
        result: guard.result.clone(),
        error: guard.error.clone(),
    }))
}

async fn cancel_route_plan(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> StatusCode {
    if state.jobs.cancel(&id) || state.jobs.remove(&id).is_some() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn export_route_plan(
    State(state): State<Arc<AppState>>,
    Path((id, format)): Path<(String, String)>,
) -> Result<([(&'static str, String); 2], String), (StatusCode, String)> {
    let job = state.jobs.get(&id).ok_or((StatusCode::NOT_FOUND, "job not found".to_string()))?;
    let guard = job.read();
    let result = guard
        .result
        .as_ref()
        .ok_or((StatusCode::NOT_FOUND, "job has no completed result".to_string()))?;

    let (content_type, filename, body) = match format.as_str() {
        "gpx" => ("application/gpx+xml", "routes.gpx", export::generate_gpx(&result.routes)),
        "kml" => (
            "application/vnd.google-earth.kml+xml",
            "routes.kml",
            export::generate_kml(&result.routes),
        ),
        "geojson" => ("application/geo+json", "routes.geojson", export::generate_geojson(&result.routes)),
        "google-maps-url" => {
            // One URL per route (each already built from its own waypoints
            // and the job's real travel mode), not a single URL merging
            // every route's waypoints together.
            let body = result
                .routes
                .iter()
                .map(|r| r.google_maps_url.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            ("text/plain", "routes.urls.txt", body)
        }
        other => return Err((StatusCode::BAD_REQUEST, format!("unknown export format: {other}"))),
    };

    Ok((
        [
            ("content-type", content_type.to_string()),
            ("content-disposition", format!("attachment; filename={filename}")),
        ],
        body,
    ))
}
