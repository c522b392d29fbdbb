use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::catalog::{CatalogItem, CatalogSearch, CreateCatalogItemRequest},
    services::customer_service::escape_like,
    services::ledger_service::normalize_currency,
};

/// Add an item to the catalog.
///
/// # Errors
///
/// - `InvalidRequest`: validation failed
/// - `Conflict`: the supplier already lists this part number
pub async fn create_item(
    pool: &DbPool,
    api_key_id: Uuid,
    request: CreateCatalogItemRequest,
) -> Result<CatalogItem, AppError> {
    request.validate()?;
    let currency = normalize_currency(&request.currency)?;

    let item = sqlx::query_as::<_, CatalogItem>(
        r#"
        INSERT INTO catalog_items (
            api_key_id, supplier, supplier_part_id, description,
            unit_price_cents, currency, uom, category, lead_time_days
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(api_key_id)
    .bind(request.supplier.trim())
    .bind(request.supplier_part_id.trim())
    .bind(request.description.trim())
    .bind(request.unit_price_cents)
    .bind(currency)
    .bind(request.uom.trim().to_ascii_uppercase())
    .bind(request.category.as_deref().map(str::trim))
    .bind(request.lead_time_days)
    .fetch_one(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "{} already lists part '{}'",
            request.supplier.trim(),
            request.supplier_part_id.trim()
        )),
        other => other,
    })?;

    tracing::info!(item_id = %item.id, supplier = %item.supplier, "Catalog item created");

    Ok(item)
}

/// Search active items by free text over description and part number.
pub async fn search_items(
    pool: &DbPool,
    api_key_id: Uuid,
    search: CatalogSearch,
) -> Result<Vec<CatalogItem>, AppError> {
    let limit = search.limit();
    let pattern = search
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", escape_like(&q)));

    let items = sqlx::query_as::<_, CatalogItem>(
        r#"
        SELECT * FROM catalog_items
        WHERE api_key_id = $1
          AND is_active
          AND ($2::TEXT IS NULL OR description ILIKE $2 OR supplier_part_id ILIKE $2)
          AND ($3::TEXT IS NULL OR supplier = $3)
          AND ($4::TEXT IS NULL OR category = $4)
        ORDER BY description, supplier_part_id
        LIMIT $5
        "#,
    )
    .bind(api_key_id)
    .bind(pattern)
    .bind(search.supplier)
    .bind(search.category)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(items)
}

pub async fn get_item(
    pool: &DbPool,
    api_key_id: Uuid,
    item_id: Uuid,
) -> Result<CatalogItem, AppError> {
    let mut conn = pool.acquire().await?;
    fetch_item(&mut conn, api_key_id, item_id).await
}

/// Load an item on a connection the caller already holds, e.g. inside a
/// transaction.
pub async fn fetch_item(
    conn: &mut PgConnection,
    api_key_id: Uuid,
    item_id: Uuid,
) -> Result<CatalogItem, AppError> {
    sqlx::query_as::<_, CatalogItem>(
        "SELECT * FROM catalog_items WHERE id = $1 AND api_key_id = $2",
    )
    .bind(item_id)
    .bind(api_key_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("catalog_item"))
}

/// Hide an item from search and PunchOut. Idempotent.
pub async fn deactivate_item(
    pool: &DbPool,
    api_key_id: Uuid,
    item_id: Uuid,
) -> Result<CatalogItem, AppError> {
    let item = sqlx::query_as::<_, CatalogItem>(
        r#"
        UPDATE catalog_items SET is_active = FALSE
        WHERE id = $1 AND api_key_id = $2
        RETURNING *
        "#,
    )
    .bind(item_id)
    .bind(api_key_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("catalog_item"))?;

    tracing::info!(item_id = %item.id, "Catalog item deactivated");

    Ok(item)
}
