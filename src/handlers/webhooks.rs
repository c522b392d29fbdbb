//! Webhook subscription HTTP handlers.
//!
//! - POST /api/v1/webhooks - 201, the only response that carries the signing secret
//! - GET /api/v1/webhooks - active endpoints, secrets omitted
//! - DELETE /api/v1/webhooks/{id} - 204, deactivates and keeps the delivery log
//! - GET /api/v1/webhooks/{id}/events - delivery log, newest first

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::webhook::{WebhookEndpointRequest, WebhookEndpointResponse, WebhookEvent},
    services::webhook_service,
};

/// Subscribe a URL to domain events.
///
/// ```json
/// { "url": "https://erp.example.com/hooks", "event_types": ["invoice.paid"] }
/// ```
///
/// Omitting `event_types` subscribes to every event. Plain HTTP is only
/// accepted for localhost; unknown event names are a 400.
pub async fn create_webhook(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<WebhookEndpointRequest>,
) -> Result<impl IntoResponse, AppError> {
    let endpoint = webhook_service::create_webhook_endpoint(&pool, auth.api_key_id, request).await?;
    Ok((StatusCode::CREATED, Json(endpoint)))
}

pub async fn list_webhooks(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<WebhookEndpointResponse>>, AppError> {
    let endpoints = webhook_service::list_webhook_endpoints(&pool, auth.api_key_id).await?;
    Ok(Json(endpoints))
}

pub async fn delete_webhook(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    webhook_service::delete_webhook_endpoint(&pool, auth.api_key_id, webhook_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// At most 100 attempts. `response_status` is absent when the request
/// never got an HTTP response.
pub async fn list_webhook_events(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(webhook_id): Path<Uuid>,
) -> Result<Json<Vec<WebhookEvent>>, AppError> {
    let events = webhook_service::list_webhook_events(&pool, auth.api_key_id, webhook_id).await?;
    Ok(Json(events))
}
