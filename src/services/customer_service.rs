//! Customer service - CRM master data.
//!
//! All queries are scoped by `api_key_id`. Changes are announced on the
//! event bus after the database write succeeds.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::customer::{CreateCustomerRequest, Customer, CustomerFilter, UpdateCustomerRequest},
    models::event::{DomainEvent, EventType},
    services::event_bus::EventBus,
};

const CUSTOMER_COLUMNS: &str = "id, api_key_id, customer_number, name, email, phone, status, credit_limit_cents, created_at, updated_at";

/// Create a customer.
///
/// # Errors
///
/// - `InvalidRequest`: validation failed
/// - `Conflict`: `customer_number` already used by this business
pub async fn create_customer(
    pool: &DbPool,
    events: &EventBus,
    api_key_id: Uuid,
    request: CreateCustomerRequest,
) -> Result<Customer, AppError> {
    request.validate()?;

    let customer = sqlx::query_as::<_, Customer>(&format!(
        r#"
        INSERT INTO customers (api_key_id, customer_number, name, email, phone, credit_limit_cents)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {CUSTOMER_COLUMNS}
        "#
    ))
    .bind(api_key_id)
    .bind(request.customer_number.trim())
    .bind(request.name.trim())
    .bind(request.email)
    .bind(request.phone)
    .bind(request.credit_limit_cents)
    .fetch_one(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "Customer number '{}' already exists",
            request.customer_number.trim()
        )),
        other => other,
    })?;

    tracing::info!(customer_id = %customer.id, "Customer created");
    events.publish(DomainEvent::new(
        api_key_id,
        EventType::CustomerCreated,
        &customer,
    ));

    Ok(customer)
}

/// List customers, newest first, optionally filtered by status and a
/// case-insensitive search over name and customer number.
pub async fn list_customers(
    pool: &DbPool,
    api_key_id: Uuid,
    filter: CustomerFilter,
) -> Result<Vec<Customer>, AppError> {
    let pattern = filter
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(&s)));

    let customers = sqlx::query_as::<_, Customer>(&format!(
        r#"
        SELECT {CUSTOMER_COLUMNS}
        FROM customers
        WHERE api_key_id = $1
          AND ($2::TEXT IS NULL OR status = $2)
          AND ($3::TEXT IS NULL OR name ILIKE $3 OR customer_number ILIKE $3)
        ORDER BY created_at DESC
        "#
    ))
    .bind(api_key_id)
    .bind(filter.status.map(|s| s.as_str()))
    .bind(pattern)
    .fetch_all(pool)
    .await?;

    Ok(customers)
}

pub async fn get_customer(
    pool: &DbPool,
    api_key_id: Uuid,
    customer_id: Uuid,
) -> Result<Customer, AppError> {
    sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1 AND api_key_id = $2"
    ))
    .bind(customer_id)
    .bind(api_key_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("customer"))
}

/// Apply a partial update. Absent fields keep their stored value.
pub async fn update_customer(
    pool: &DbPool,
    events: &EventBus,
    api_key_id: Uuid,
    customer_id: Uuid,
    request: UpdateCustomerRequest,
) -> Result<Customer, AppError> {
    request.validate()?;

    let customer = sqlx::query_as::<_, Customer>(&format!(
        r#"
        UPDATE customers
        SET name = COALESCE($3, name),
            email = COALESCE($4, email),
            phone = COALESCE($5, phone),
            status = COALESCE($6, status),
            credit_limit_cents = COALESCE($7, credit_limit_cents),
            updated_at = NOW()
        WHERE id = $1 AND api_key_id = $2
        RETURNING {CUSTOMER_COLUMNS}
        "#
    ))
    .bind(customer_id)
    .bind(api_key_id)
    .bind(request.name.map(|n| n.trim().to_string()))
    .bind(request.email)
    .bind(request.phone)
    .bind(request.status.map(|s| s.as_str()))
    .bind(request.credit_limit_cents)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("customer"))?;

    events.publish(DomainEvent::new(
        api_key_id,
        EventType::CustomerUpdated,
        &customer,
    ));

    Ok(customer)
}

/// Delete a customer that has no live invoices.
///
/// # Errors
///
/// - `NotFound`: no such customer for this business
/// - `Conflict`: the customer still has invoices that are not cancelled
pub async fn delete_customer(
    pool: &DbPool,
    events: &EventBus,
    api_key_id: Uuid,
    customer_id: Uuid,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1 AND api_key_id = $2 FOR UPDATE)",
    )
    .bind(customer_id)
    .bind(api_key_id)
    .fetch_one(&mut *tx)
    .await?;

    if !exists {
        tx.rollback().await?;
        return Err(AppError::NotFound("customer"));
    }

    let open_invoices: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ar_invoices WHERE customer_id = $1 AND status <> 'cancelled'",
    )
    .bind(customer_id)
    .fetch_one(&mut *tx)
    .await?;

    if open_invoices > 0 {
        tx.rollback().await?;
        return Err(AppError::Conflict(format!(
            "Customer has {} invoice(s) that are not cancelled",
            open_invoices
        )));
    }

    // Cancelled invoices go with the customer
    sqlx::query("DELETE FROM ar_invoices WHERE customer_id = $1")
        .bind(customer_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM customers WHERE id = $1")
        .bind(customer_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(customer_id = %customer_id, "Customer deleted");
    events.publish(DomainEvent::new(
        api_key_id,
        EventType::CustomerDeleted,
        serde_json::json!({ "id": customer_id }),
    ));

    Ok(())
}

/// Escape `%`, `_` and `\` so user input is matched literally by ILIKE.
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
