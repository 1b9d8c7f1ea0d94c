//! Job endpoint handlers.
//!
//! These handlers only touch the in-memory queue:
//! 1. Verify the API token (if configured)
//! 2. Submit, look up or cancel a job
//! 3. Return immediately
//!
//! All sending happens in the background dispatch worker.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::model::{AttachmentCatalog, RecipientRecord, Template, TransportConfig};
use crate::queue::{Job, JobInputs, JobQueue, JobStatus, SendSummary};
use crate::Config;

/// Header carrying the shared API token.
pub const API_TOKEN_HEADER: &str = "X-Api-Token";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: JobQueue,
}

impl AppState {
    pub fn new(config: Config, queue: JobQueue) -> Self {
        Self {
            config: Arc::new(config),
            queue,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Responses
// =============================================================================

/// Error body.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

fn error_response(code: StatusCode, status: &'static str, message: impl Into<String>) -> Response {
    (
        code,
        Json(ErrorResponse {
            status,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Progress view of a job; never includes recipients or credentials.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_groups: usize,
    pub sent_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub current_group: String,
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<SendSummary>,
}

impl JobView {
    fn summary(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            total_groups: job.total_groups,
            sent_count: job.sent_count(),
            failed_count: job.failed_count(),
            skipped_count: job.skipped_count(),
            current_group: job.current_group.clone(),
            error_message: job.error_message.clone(),
            results: None,
        }
    }

    fn detailed(job: &Job) -> Self {
        Self {
            results: Some(job.results.clone()),
            ..Self::summary(job)
        }
    }
}

// =============================================================================
// Authentication
// =============================================================================

/// Check the API token header against the configured token.
fn check_token(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let provided = headers.get(API_TOKEN_HEADER).and_then(|v| v.to_str().ok());

    match (provided, state.config.api_token.as_deref()) {
        (Some(provided), Some(expected)) if provided == expected => Ok(()),
        (None, Some(_)) => {
            warn!("api_token_missing");
            Err(error_response(StatusCode::UNAUTHORIZED, "unauthorized", "missing API token"))
        }
        (Some(_), Some(_)) => {
            warn!("api_token_invalid");
            Err(error_response(StatusCode::UNAUTHORIZED, "unauthorized", "invalid API token"))
        }
        // No token configured, allow through
        (_, None) => Ok(()),
    }
}

// =============================================================================
// Submit
// =============================================================================

/// Send request body.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub recipients: Vec<RecipientRecord>,
    #[serde(default)]
    pub catalog: AttachmentCatalog,
    pub template: Template,
    /// Falls back to the server's SMTP settings when omitted
    #[serde(default)]
    pub transport: Option<TransportConfig>,
}

/// Submit response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_groups: usize,
}

/// Submit a send job.
pub async fn submit_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SubmitJobRequest>,
) -> Response {
    if let Err(response) = check_token(&state, &headers) {
        return response;
    }

    if request.recipients.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "invalid_request", "recipient list is empty");
    }

    let transport = request
        .transport
        .unwrap_or_else(|| state.config.smtp.clone());

    info!(
        recipients = request.recipients.len(),
        catalog_entries = request.catalog.len(),
        template_kind = ?request.template.kind,
        smtp_host = %transport.host,
        "job_submit_received"
    );

    let job = Job::new(JobInputs {
        recipients: request.recipients,
        catalog: request.catalog,
        template: request.template,
        transport,
    });
    let total_groups = job.total_groups;
    let job_id = state.queue.submit(job).await;

    (
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id,
            status: JobStatus::Queued,
            total_groups,
        }),
    )
        .into_response()
}

// =============================================================================
// Query
// =============================================================================

/// Job listing response.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobListResponse {
    pub queued: usize,
    pub jobs: Vec<JobView>,
}

/// List all jobs, newest first.
pub async fn list_jobs(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = check_token(&state, &headers) {
        return response;
    }

    let jobs = state.queue.list().await;
    Json(JobListResponse {
        queued: state.queue.queued_count().await,
        jobs: jobs.iter().map(JobView::summary).collect(),
    })
    .into_response()
}

/// Progress and results of one job.
pub async fn get_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<Uuid>,
) -> Response {
    if let Err(response) = check_token(&state, &headers) {
        return response;
    }

    match state.queue.get(job_id).await {
        Some(job) => Json(JobView::detailed(&job)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "not_found", format!("job {} not found", job_id)),
    }
}

// =============================================================================
// Cancel
// =============================================================================

/// Cancel response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelJobResponse {
    pub job_id: Uuid,
    pub cancelled: bool,
}

/// Request cancellation of a queued or running job.
pub async fn cancel_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<Uuid>,
) -> Response {
    if let Err(response) = check_token(&state, &headers) {
        return response;
    }

    let cancelled = state.queue.cancel(job_id).await;
    info!(job_id = %job_id, cancelled = cancelled, "job_cancel_handled");

    Json(CancelJobResponse { job_id, cancelled }).into_response()
}
