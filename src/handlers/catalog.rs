//! Catalog HTTP handlers.
//!
//! - POST /api/v1/catalog/items
//! - GET /api/v1/catalog/items (`?q=pallet&supplier=&category=&limit=`)
//! - GET /api/v1/catalog/items/{id}
//! - POST /api/v1/catalog/items/{id}/deactivate

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
    models::catalog::{CatalogItem, CatalogSearch, CreateCatalogItemRequest},
    services::catalog_service,
    state::AppState,
};

pub async fn create_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateCatalogItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    let item = catalog_service::create_item(&state.pool, auth.api_key_id, request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Search active items. `limit` defaults to 50 and is capped at 100.
pub async fn search_items(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(search): Query<CatalogSearch>,
) -> Result<Json<Vec<CatalogItem>>, AppError> {
    let items = catalog_service::search_items(&state.pool, auth.api_key_id, search).await?;
    Ok(Json(items))
}

pub async fn get_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<CatalogItem>, AppError> {
    let item = catalog_service::get_item(&state.pool, auth.api_key_id, item_id).await?;
    Ok(Json(item))
}

pub async fn deactivate_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<CatalogItem>, AppError> {
    let item = catalog_service::deactivate_item(&state.pool, auth.api_key_id, item_id).await?;
    Ok(Json(item))
}
