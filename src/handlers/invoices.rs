//! Accounts receivable HTTP handlers.
//!
//! - POST /api/v1/invoices - Create draft invoice
//! - GET /api/v1/invoices - List (`?status=open&customer_id=`)
//! - GET /api/v1/invoices/{id} - Invoice with lines
//! - POST /api/v1/invoices/{id}/issue - draft → open
//! - POST /api/v1/invoices/{id}/cancel - draft|open → cancelled
//! - POST /api/v1/invoices/{id}/payments - Record a payment
//! - GET /api/v1/invoices/{id}/payments - Payments of an invoice

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
    models::invoice::{
        ArInvoice, ArPayment, CreateInvoiceRequest, InvoiceFilter, InvoiceResponse,
        RecordPaymentRequest,
    },
    services::invoice_service,
    state::AppState,
};

/// Create a draft invoice.
///
/// # Request Body
///
/// ```json
/// {
///   "customer_id": "550e8400-e29b-41d4-a716-446655440000",
///   "invoice_number": "INV-2025-0001",
///   "currency": "EUR",
///   "issue_date": "2025-03-01",
///   "due_date": "2025-03-31",
///   "lines": [
///     {"description": "Consulting", "quantity": 10, "unit_price_cents": 12000, "tax_rate_bp": 1900}
///   ]
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: invoice with computed totals and lines
/// - **400**: no lines, bad quantities or dates
/// - **409**: customer is not active, or invoice number already used
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = invoice_service::create_invoice(&state.pool, auth.api_key_id, request).await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<InvoiceFilter>,
) -> Result<Json<Vec<ArInvoice>>, AppError> {
    let invoices = invoice_service::list_invoices(&state.pool, auth.api_key_id, filter).await?;
    Ok(Json(invoices))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = invoice_service::get_invoice(&state.pool, auth.api_key_id, invoice_id).await?;
    Ok(Json(invoice))
}

pub async fn issue_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<ArInvoice>, AppError> {
    let invoice =
        invoice_service::issue_invoice(&state.pool, &state.events, auth.api_key_id, invoice_id)
            .await?;
    Ok(Json(invoice))
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<ArInvoice>, AppError> {
    let invoice =
        invoice_service::cancel_invoice(&state.pool, &state.events, auth.api_key_id, invoice_id)
            .await?;
    Ok(Json(invoice))
}

/// Record a customer payment.
///
/// The payment is booked as a journal entry (debit cash, credit receivables)
/// in the same database transaction as the invoice update.
///
/// # Request Body
///
/// ```json
/// {
///   "amount_cents": 50000,
///   "cash_account_id": "...",
///   "receivable_account_id": "...",
///   "idempotency_key": "bank-ref-88123"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the updated invoice (`partially_paid` or `paid`)
/// - **409**: invoice is draft, paid or cancelled
/// - **422**: amount exceeds the outstanding balance
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = invoice_service::record_payment(
        &state.pool,
        &state.events,
        auth.api_key_id,
        invoice_id,
        request,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Vec<ArPayment>>, AppError> {
    let payments = invoice_service::list_payments(&state.pool, auth.api_key_id, invoice_id).await?;
    Ok(Json(payments))
}
