//! REST API for the shift optimizer.
//!
//! Provides endpoints for:
//! - Solving a shift-assignment problem (`POST /api/optimize`)
//! - Health and info
//! - Demo data retrieval
//! - Swagger UI at /q/swagger-ui

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::cache::SolveCache;
use crate::config::OptimizerConfig;
use crate::demo_data::{self, DemoData};
use crate::dto::{EmployeeDto, OptimizeRequest, OptimizeResponse, PreferenceDto, ShiftDto, SolutionDto, SolutionMetricsDto};
use crate::error::{OptimizeError, ValidationError};
use crate::ranker;
use crate::solver::{self, CancelToken, Termination};

/// Application state shared across handlers.
pub struct AppState {
    pub config: OptimizerConfig,
    pub cache: SolveCache,
}

impl AppState {
    pub fn new(config: OptimizerConfig) -> Self {
        let cache = SolveCache::new(config.cache.capacity);
        Self { config, cache }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

/// Creates the API router with Swagger UI enabled.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health & Info
        .route("/api/health", get(health))
        .route("/api/info", get(info))
        // Demo data
        .route("/api/demo-data", get(list_demo_data))
        .route("/api/demo-data/{id}", get(get_demo_data))
        // Solving
        .route("/api/optimize", post(optimize))
        .merge(SwaggerUi::new("/q/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

// ============================================================================
// Health & Info
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /api/health - Health check endpoint.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Application info response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub solver_engine: &'static str,
}

/// GET /api/info - Application info endpoint.
#[utoipa::path(
    get,
    path = "/api/info",
    responses((status = 200, description = "Application info", body = InfoResponse))
)]
async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Shift Optimizer",
        version: env!("CARGO_PKG_VERSION"),
        solver_engine: "branch-and-bound + late acceptance",
    })
}

// ============================================================================
// Demo Data
// ============================================================================

/// GET /api/demo-data - List available demo data sets.
#[utoipa::path(
    get,
    path = "/api/demo-data",
    responses((status = 200, description = "List of demo data sets", body = Vec<String>))
)]
async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(demo_data::list_demo_data())
}

/// GET /api/demo-data/{id} - Get a demo problem as an optimize request.
#[utoipa::path(
    get,
    path = "/api/demo-data/{id}",
    params(("id" = String, Path, description = "Demo data set ID")),
    responses(
        (status = 200, description = "Demo data retrieved", body = OptimizeRequest),
        (status = 404, description = "Demo data set not found")
    )
)]
async fn get_demo_data(Path(id): Path<String>) -> Result<Json<OptimizeRequest>, StatusCode> {
    match id.parse::<DemoData>() {
        Ok(demo) => Ok(Json(OptimizeRequest::from_domain(&demo_data::generate(demo)))),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

// ============================================================================
// Optimize
// ============================================================================

/// Cancels the solve when the request future is dropped before it finished.
struct CancelOnDrop {
    token: CancelToken,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.token.cancel();
        }
    }
}

/// POST /api/optimize - Solve a shift-assignment problem.
///
/// Every outcome, including malformed input, is reported through the
/// response envelope with HTTP 200.
#[utoipa::path(
    post,
    path = "/api/optimize",
    request_body = OptimizeRequest,
    responses((status = 200, description = "Solutions best first, or the failure reason", body = OptimizeResponse))
)]
async fn optimize(State(state): State<Arc<AppState>>, body: Bytes) -> Json<OptimizeResponse> {
    let request_id = Uuid::new_v4();
    let span = info_span!("optimize", %request_id);
    Json(handle_optimize(state, body).instrument(span).await)
}

async fn handle_optimize(state: Arc<AppState>, body: Bytes) -> OptimizeResponse {
    let request: OptimizeRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let error = OptimizeError::from(ValidationError::MalformedRequest(e.to_string()));
            warn!(error = %error, "Rejected request body");
            return OptimizeResponse::failure(error.to_string());
        }
    };

    let cache_key = SolveCache::key(&request);
    if let Some(cached) = cache_key.as_deref().and_then(|key| state.cache.get(key)) {
        info!(success = cached.success, "Served from cache");
        return cached;
    }

    let problem = match request.to_domain() {
        Ok(problem) => problem,
        Err(e) => {
            let error = OptimizeError::from(e);
            warn!(error = %error, "Rejected problem");
            return OptimizeResponse::failure(error.to_string());
        }
    };

    let token = CancelToken::new();
    let mut guard = CancelOnDrop {
        token: token.clone(),
        armed: true,
    };
    let termination = Termination::new(state.config.solver.time_limit(), token);

    let started = Instant::now();
    let solve_state = state.clone();
    let span = tracing::Span::current();
    let joined = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        solver::optimize(&problem, &solve_state.config, &termination)
    })
    .await;
    guard.armed = false;

    let result = match joined {
        Ok(result) => result,
        Err(e) => Err(OptimizeError::Internal(format!("solver task failed: {}", e))),
    };

    let deterministic = match &result {
        Ok(output) => output.deterministic,
        Err(e) => e.is_deterministic(),
    };
    let response = ranker::package(result.map(|output| output.solutions));
    info!(
        success = response.success,
        solutions = response.solutions.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Optimize finished"
    );

    if deterministic {
        if let Some(key) = cache_key {
            state.cache.insert(key, response.clone());
        }
    }
    response
}

// ============================================================================
// OpenAPI Documentation
// ============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(health, info, list_demo_data, get_demo_data, optimize),
    components(schemas(
        HealthResponse,
        InfoResponse,
        OptimizeRequest,
        EmployeeDto,
        ShiftDto,
        PreferenceDto,
        OptimizeResponse,
        SolutionDto,
        SolutionMetricsDto,
    ))
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_optimize() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/optimize"));
        assert!(doc.paths.paths.contains_key("/api/demo-data/{id}"));
    }

    #[test]
    fn test_cancel_on_drop() {
        let token = CancelToken::new();
        drop(CancelOnDrop {
            token: token.clone(),
            armed: false,
        });
        assert!(!token.is_cancelled());
        drop(CancelOnDrop {
            token: token.clone(),
            armed: true,
        });
        assert!(token.is_cancelled());
    }
}
