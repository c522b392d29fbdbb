use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::integration::{CreateIntegrationRequest, Integration, UpdateIntegrationRequest},
};

pub async fn create_integration(
    pool: &DbPool,
    api_key_id: Uuid,
    request: CreateIntegrationRequest,
) -> Result<Integration, AppError> {
    request.validate()?;

    let integration = sqlx::query_as::<_, Integration>(
        r#"
        INSERT INTO integrations (api_key_id, name, kind, config, is_enabled)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(api_key_id)
    .bind(request.name.trim())
    .bind(request.kind.as_str())
    .bind(&request.config)
    .bind(request.is_enabled)
    .fetch_one(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "Integration '{}' already exists",
            request.name.trim()
        )),
        other => other,
    })?;

    tracing::info!(
        integration_id = %integration.id,
        kind = %integration.kind,
        "Integration created"
    );

    Ok(integration)
}

pub async fn list_integrations(
    pool: &DbPool,
    api_key_id: Uuid,
) -> Result<Vec<Integration>, AppError> {
    let integrations = sqlx::query_as::<_, Integration>(
        "SELECT * FROM integrations WHERE api_key_id = $1 ORDER BY name",
    )
    .bind(api_key_id)
    .fetch_all(pool)
    .await?;

    Ok(integrations)
}

pub async fn get_integration(
    pool: &DbPool,
    api_key_id: Uuid,
    integration_id: Uuid,
) -> Result<Integration, AppError> {
    sqlx::query_as::<_, Integration>(
        "SELECT * FROM integrations WHERE id = $1 AND api_key_id = $2",
    )
    .bind(integration_id)
    .bind(api_key_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("integration"))
}

/// Enable or disable an integration and/or replace its config.
pub async fn update_integration(
    pool: &DbPool,
    api_key_id: Uuid,
    integration_id: Uuid,
    request: UpdateIntegrationRequest,
) -> Result<Integration, AppError> {
    request.validate()?;

    let integration = sqlx::query_as::<_, Integration>(
        r#"
        UPDATE integrations
        SET is_enabled = COALESCE($3, is_enabled),
            config = COALESCE($4, config),
            updated_at = NOW()
        WHERE id = $1 AND api_key_id = $2
        RETURNING *
        "#,
    )
    .bind(integration_id)
    .bind(api_key_id)
    .bind(request.is_enabled)
    .bind(request.config)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("integration"))?;

    tracing::info!(
        integration_id = %integration.id,
        is_enabled = integration.is_enabled,
        "Integration updated"
    );

    Ok(integration)
}
