//! Procurement controls that need no storage.
//!
//! - POST /api/v1/procurement/three-way-match
//! - POST /api/v1/procurement/requisitions/evaluate

use axum::{Extension, Json, extract::State};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::event::{DomainEvent, EventType},
    models::matching::{MatchStatus, ThreeWayMatchRequest, ThreeWayMatchResult, Tolerance},
    services::guided_buying::{self, RequisitionEvaluation, RequisitionRequest},
    services::matching_service,
    state::AppState,
};

/// Compare a purchase order, its goods receipts and the supplier invoice.
///
/// Tolerances default to the configured `MATCH_QUANTITY_TOLERANCE_BP` and
/// `MATCH_PRICE_TOLERANCE_BP` unless the request carries its own.
///
/// # Response
///
/// ```json
/// {
///   "po_number": "PO-4711",
///   "status": "exception",
///   "payment_blocked": true,
///   "tolerance": {"quantity_bp": 0, "price_bp": 200},
///   "po_total_cents": 120000,
///   "invoice_total_cents": 126000,
///   "expected_invoice_cents": 120000,
///   "variance_cents": 6000,
///   "discrepancies": [
///     {"line_number": 1, "kind": "price_variance", "severity": "high", ...}
///   ]
/// }
/// ```
///
/// An `exception` result is also published as `match.exception`.
pub async fn three_way_match(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<ThreeWayMatchRequest>,
) -> Result<Json<ThreeWayMatchResult>, AppError> {
    let default_tolerance = Tolerance {
        quantity_bp: state.config.match_quantity_tolerance_bp,
        price_bp: state.config.match_price_tolerance_bp,
    };
    let result = matching_service::evaluate(&request, default_tolerance)?;

    if result.status == MatchStatus::Exception {
        tracing::info!(
            po_number = ?result.po_number,
            discrepancies = result.discrepancies.len(),
            "Three-way match exception"
        );
        state.events.publish(DomainEvent::new(
            auth.api_key_id,
            EventType::MatchException,
            &result,
        ));
    }

    Ok(Json(result))
}

/// Approval tier and policy warnings for a purchase requisition.
pub async fn evaluate_requisition(
    Json(request): Json<RequisitionRequest>,
) -> Result<Json<RequisitionEvaluation>, AppError> {
    Ok(Json(guided_buying::evaluate(&request)?))
}
