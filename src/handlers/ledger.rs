//! Finance ledger HTTP handlers.
//!
//! - POST /api/v1/ledger/accounts - Create ledger account
//! - GET /api/v1/ledger/accounts - List accounts by account number
//! - GET /api/v1/ledger/accounts/{id} - Get account
//! - POST /api/v1/ledger/journal-entries - Post a double-entry journal entry
//! - GET /api/v1/ledger/journal-entries - List entries (`?account_id=`)
//! - GET /api/v1/ledger/journal-entries/{id} - Get entry
//! - GET /api/v1/ledger/trial-balance - Balances per account type

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
    models::ledger::{
        CreateLedgerAccountRequest, JournalEntry, JournalFilter, LedgerAccountResponse,
        PostJournalEntryRequest, TrialBalance,
    },
    services::ledger_service,
    state::AppState,
};

/// Create a ledger account.
///
/// # Request Body
///
/// ```json
/// {
///   "account_number": "1200",
///   "name": "Accounts receivable",
///   "account_type": "asset",
///   "currency": "EUR"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the account with a zero balance
/// - **409**: account number already used
pub async fn create_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateLedgerAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = ledger_service::create_account(&state.pool, auth.api_key_id, request).await?;

    Ok((StatusCode::CREATED, Json(LedgerAccountResponse::from(account))))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<LedgerAccountResponse>>, AppError> {
    let accounts = ledger_service::list_accounts(&state.pool, auth.api_key_id).await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

pub async fn get_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<LedgerAccountResponse>, AppError> {
    let account = ledger_service::get_account(&state.pool, auth.api_key_id, account_id).await?;
    Ok(Json(account.into()))
}

/// Post a journal entry.
///
/// # Request Body
///
/// ```json
/// {
///   "debit_account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "credit_account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount_cents": 25000,
///   "description": "Office rent March",
///   "idempotency_key": "rent-2025-03"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the entry (a replayed `idempotency_key` returns the
///   original entry and leaves balances untouched)
/// - **400**: non-positive amount, same account twice, or currency mismatch
/// - **404**: an account does not belong to this business
pub async fn post_journal_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<PostJournalEntryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let entry =
        ledger_service::post_journal_entry(&state.pool, &state.events, auth.api_key_id, request)
            .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_journal_entries(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<JournalFilter>,
) -> Result<Json<Vec<JournalEntry>>, AppError> {
    let entries = ledger_service::list_journal_entries(&state.pool, auth.api_key_id, filter).await?;
    Ok(Json(entries))
}

pub async fn get_journal_entry(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<JournalEntry>, AppError> {
    let entry = ledger_service::get_journal_entry(&state.pool, auth.api_key_id, entry_id).await?;
    Ok(Json(entry))
}

/// Sum of debit-positive balances per account type; `balanced` is true when
/// the grand total is zero.
pub async fn trial_balance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<TrialBalance>, AppError> {
    let balance = ledger_service::trial_balance(&state.pool, auth.api_key_id).await?;
    Ok(Json(balance))
}
