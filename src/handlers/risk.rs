//! Supplier risk (TPRM) HTTP handlers.
//!
//! - POST /api/v1/tprm/assessments - Score and store an assessment
//! - GET /api/v1/tprm/assessments/{id} - Get assessment
//! - GET /api/v1/tprm/suppliers/{supplier_ref}/assessments - History, newest first

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::risk::{RiskAssessment, RiskAssessmentRequest},
    services::risk_service,
    state::AppState,
};

/// Score a supplier.
///
/// # Response
///
/// - **201 Created**: the stored assessment with `score`, `tier`, the
///   per-factor `components` and `recommended_actions`
/// - **400**: a score or count is out of range
pub async fn create_assessment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<RiskAssessmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let assessment =
        risk_service::create_assessment(&state.pool, &state.events, auth.api_key_id, request)
            .await?;

    Ok((StatusCode::CREATED, Json(assessment)))
}

pub async fn get_assessment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(assessment_id): Path<Uuid>,
) -> Result<Json<RiskAssessment>, AppError> {
    let assessment =
        risk_service::get_assessment(&state.pool, auth.api_key_id, assessment_id).await?;
    Ok(Json(assessment))
}

pub async fn list_supplier_assessments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(supplier_ref): Path<String>,
) -> Result<Json<Vec<RiskAssessment>>, AppError> {
    let assessments =
        risk_service::list_supplier_assessments(&state.pool, auth.api_key_id, &supplier_ref)
            .await?;
    Ok(Json(assessments))
}
