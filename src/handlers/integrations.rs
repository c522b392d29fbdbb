//! Integration and sync job HTTP handlers.
//!
//! - POST /api/v1/integrations
//! - GET /api/v1/integrations
//! - GET /api/v1/integrations/{id}
//! - PATCH /api/v1/integrations/{id} - `is_enabled` and/or `config`
//! - POST /api/v1/sync-jobs
//! - GET /api/v1/sync-jobs (`?integration_id=&status=`)
//! - GET /api/v1/sync-jobs/{id}
//! - POST /api/v1/sync-jobs/{id}/run - 202, the job finishes in the background
//! - POST /api/v1/sync-jobs/{id}/cancel

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::integration::{
        CreateIntegrationRequest, CreateSyncJobRequest, Integration, SyncJob, SyncJobFilter,
        UpdateIntegrationRequest,
    },
    services::{integration_service, sync_job_service},
    state::AppState,
};

pub async fn create_integration(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateIntegrationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let integration =
        integration_service::create_integration(&state.pool, auth.api_key_id, request).await?;
    Ok((StatusCode::CREATED, Json(integration)))
}

pub async fn list_integrations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Integration>>, AppError> {
    let integrations = integration_service::list_integrations(&state.pool, auth.api_key_id).await?;
    Ok(Json(integrations))
}

pub async fn get_integration(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(integration_id): Path<Uuid>,
) -> Result<Json<Integration>, AppError> {
    let integration =
        integration_service::get_integration(&state.pool, auth.api_key_id, integration_id).await?;
    Ok(Json(integration))
}

pub async fn update_integration(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(integration_id): Path<Uuid>,
    Json(request): Json<UpdateIntegrationRequest>,
) -> Result<Json<Integration>, AppError> {
    let integration = integration_service::update_integration(
        &state.pool,
        auth.api_key_id,
        integration_id,
        request,
    )
    .await?;
    Ok(Json(integration))
}

/// Queue a sync job. Returns 409 when the integration is disabled.
pub async fn create_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateSyncJobRequest>,
) -> Result<impl IntoResponse, AppError> {
    let job = sync_job_service::create_job(&state.pool, auth.api_key_id, request).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<SyncJobFilter>,
) -> Result<Json<Vec<SyncJob>>, AppError> {
    let jobs = sync_job_service::list_jobs(&state.pool, auth.api_key_id, filter).await?;
    Ok(Json(jobs))
}

pub async fn get_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<SyncJob>, AppError> {
    let job = sync_job_service::get_job(&state.pool, auth.api_key_id, job_id).await?;
    Ok(Json(job))
}

/// Start a pending job.
///
/// # Response
///
/// - **202 Accepted**: the job, now `running`; poll `GET /api/v1/sync-jobs/{id}`
///   or subscribe to `sync_job.completed` / `sync_job.failed`
/// - **409**: the job is not pending
pub async fn run_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let job = sync_job_service::run_job(&state.pool, &state.events, auth.api_key_id, job_id).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<SyncJob>, AppError> {
    let job = sync_job_service::cancel_job(&state.pool, auth.api_key_id, job_id).await?;
    Ok(Json(job))
}
