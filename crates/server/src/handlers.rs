//! # Route Handlers

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use jobwatch::{execute_run, RunRequest, RunResult};
use tracing::info;

/// The handler for the root (`/`) endpoint.
pub async fn root() -> &'static str {
    "jobwatch server is running."
}

/// The handler for the health check (`/health`) endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Runs the pipeline for the posted request and returns its `RunResult`.
///
/// Both 200 and 304 results are delivered with HTTP 200, since a 304 response
/// cannot carry a body; the run status is in `statusCode`. Failures use 500.
pub async fn run_handler(
    State(app_state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> (StatusCode, Json<RunResult>) {
    info!("Received run request for URL: {}", request.url);

    let result = {
        let _lease = app_state
            .run_locks
            .acquire(&request.store_location())
            .await;
        execute_run(&app_state.config, &request).await
    };

    let status = if result.is_failure() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(result))
}
