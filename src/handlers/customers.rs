//! CRM customer HTTP handlers.
//!
//! - POST /api/v1/customers - Create customer
//! - GET /api/v1/customers - List customers (`?status=active&search=acme`)
//! - GET /api/v1/customers/{id} - Get customer
//! - PATCH /api/v1/customers/{id} - Partial update
//! - DELETE /api/v1/customers/{id} - Delete customer without live invoices

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
    models::customer::{CreateCustomerRequest, Customer, CustomerFilter, UpdateCustomerRequest},
    services::customer_service,
    state::AppState,
};

/// Create a customer.
///
/// # Request Body
///
/// ```json
/// {
///   "customer_number": "C-10001",
///   "name": "Müller GmbH",
///   "email": "einkauf@mueller.example",
///   "credit_limit_cents": 5000000
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the stored customer
/// - **400**: validation failed
/// - **409**: `customer_number` already in use
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let customer =
        customer_service::create_customer(&state.pool, &state.events, auth.api_key_id, request)
            .await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

/// List customers, newest first.
pub async fn list_customers(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<CustomerFilter>,
) -> Result<Json<Vec<Customer>>, AppError> {
    let customers = customer_service::list_customers(&state.pool, auth.api_key_id, filter).await?;
    Ok(Json(customers))
}

/// Returns 404 when the customer does not exist or belongs to another business.
pub async fn get_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    let customer = customer_service::get_customer(&state.pool, auth.api_key_id, customer_id).await?;
    Ok(Json(customer))
}

/// Apply a partial update; omitted fields are left unchanged.
pub async fn update_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(customer_id): Path<Uuid>,
    Json(request): Json<UpdateCustomerRequest>,
) -> Result<Json<Customer>, AppError> {
    let customer = customer_service::update_customer(
        &state.pool,
        &state.events,
        auth.api_key_id,
        customer_id,
        request,
    )
    .await?;

    Ok(Json(customer))
}

/// Delete a customer.
///
/// # Response
///
/// - **204 No Content**: deleted, together with any cancelled invoices
/// - **404**: no such customer
/// - **409**: the customer still has invoices that are not cancelled
pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(customer_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    customer_service::delete_customer(&state.pool, &state.events, auth.api_key_id, customer_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
