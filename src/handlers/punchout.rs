//! PunchOut HTTP handlers.
//!
//! - POST /api/v1/punchout/sessions - Set up a session
//! - GET /api/v1/punchout/sessions/{id} - Session with cart
//! - POST /api/v1/punchout/sessions/{id}/items - Add to cart
//! - POST /api/v1/punchout/sessions/{id}/checkout - Return the cart (`?format=cxml|oci`)
//! - GET /punchout/{token} - Start page lookup (public, the token is the credential)

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
    models::punchout::{
        AddCartItemRequest, CheckoutQuery, CheckoutResponse, SessionWithCart, SetupSessionRequest,
    },
    services::punchout_service,
    state::AppState,
};

/// Set up a PunchOut session.
///
/// # Request Body
///
/// ```json
/// {
///   "buyer_cookie": "a1b2c3",
///   "user_email": "buyer@acme.example",
///   "return_url": "https://procurement.acme.example/punchout/return",
///   "operation": "create"
/// }
/// ```
///
/// # Response
///
/// **201 Created** with the session, its `start_url` and a cXML
/// `PunchOutSetupResponse` pointing at the same URL.
pub async fn setup_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<SetupSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response =
        punchout_service::setup_session(&state.pool, &state.config, auth.api_key_id, request)
            .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionWithCart>, AppError> {
    let session = punchout_service::get_session(&state.pool, auth.api_key_id, session_id).await?;
    Ok(Json(session))
}

/// Add an item to the cart. Returns 409 for expired, submitted or inspect sessions.
pub async fn add_cart_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<AddCartItemRequest>,
) -> Result<Json<SessionWithCart>, AppError> {
    let session =
        punchout_service::add_cart_item(&state.pool, auth.api_key_id, session_id, request).await?;
    Ok(Json(session))
}

pub async fn checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<CheckoutQuery>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let response = punchout_service::checkout(
        &state.pool,
        &state.events,
        auth.api_key_id,
        session_id,
        query.format,
    )
    .await?;

    Ok(Json(response))
}

pub async fn start_page(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SessionWithCart>, AppError> {
    let session = punchout_service::get_session_by_token(&state.pool, &token).await?;
    Ok(Json(session))
}
