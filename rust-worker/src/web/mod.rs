//! Web server module exposing the job queue over HTTP.
//!
//! This module provides a thin web layer that:
//! - Accepts send jobs and enqueues them in memory
//! - Serves live progress for polling clients
//! - Forwards cancellation requests to the queue
//!
//! All sending happens in the background dispatch worker.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    cancel_job, get_job, health, list_jobs, submit_job, AppState, CancelJobResponse,
    HealthResponse, JobListResponse, JobView, SubmitJobRequest, SubmitJobResponse,
    API_TOKEN_HEADER,
};

/// Build the router with all routes and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", post(submit_job).get(list_jobs))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/cancel", post(cancel_job))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
