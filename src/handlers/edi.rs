//! EDI X12 HTTP handlers.
//!
//! - POST /api/v1/edi/inbound - Raw X12 interchange in, stored documents and 997 out
//! - POST /api/v1/edi/outbound - JSON warehouse document in, X12 interchange out
//! - GET /api/v1/edi/documents - Stored documents (`?direction=inbound&transaction_set=940`)
//! - GET /api/v1/edi/documents/{id} - Stored document

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
    models::edi::{EdiDocumentFilter, EdiDocumentRecord, OutboundEdiRequest},
    services::edi_service,
    state::AppState,
};

/// Receive an interchange from a trading partner.
///
/// The body is the interchange text exactly as received, e.g.
///
/// ```text
/// ISA*00*          *00*          *ZZ*3PLWAREHOUSE   *ZZ*ERPSERVICES    *250301*1200*U*00401*000000001*0*P*>~
/// GS*RE*3PLWAREHOUSE*ERPSERVICES*20250301*1200*1*X*004010~
/// ST*944*0001~
/// W17*F*20250301*RCV-1*SO-1001~
/// W07*12*EA**VN*SKU-1~
/// SE*4*0001~
/// GE*1*1~
/// IEA*1*000000001~
/// ```
///
/// # Response
///
/// - **201 Created**: `{"documents": [...], "acknowledgement": "ISA*...997..."}`
/// - **422**: envelope or segment errors, or an unsupported transaction set
pub async fn receive_interchange(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    if body.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "Request body must contain an X12 interchange".to_string(),
        ));
    }

    let response = edi_service::receive_interchange(
        &state.pool,
        &state.events,
        auth.api_key_id,
        &state.config.edi_sender_id,
        &body,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Generate an interchange for a warehouse document.
pub async fn send_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<OutboundEdiRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = edi_service::send_document(
        &state.pool,
        auth.api_key_id,
        &state.config.edi_sender_id,
        request,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_documents(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<EdiDocumentFilter>,
) -> Result<Json<Vec<EdiDocumentRecord>>, AppError> {
    let documents = edi_service::list_documents(&state.pool, auth.api_key_id, filter).await?;
    Ok(Json(documents))
}

pub async fn get_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<EdiDocumentRecord>, AppError> {
    let document = edi_service::get_document(&state.pool, auth.api_key_id, document_id).await?;
    Ok(Json(document))
}
