//! Webhook subscriptions and delivery of domain events.
//!
//! Every business registers its own endpoints; the event dispatcher calls
//! [`dispatch_event`] for each published event and the outcome of each
//! attempt lands in `webhook_events`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::event::{DomainEvent, EventType};
use crate::models::webhook::{
    WebhookEndpoint, WebhookEndpointRequest, WebhookEndpointResponse, WebhookEvent,
    WebhookPayload,
};

type HmacSha256 = Hmac<Sha256>;

/// Create a new webhook endpoint.
///
/// # Process
///
/// 1. Validate URL format and event type names
/// 2. Generate cryptographically secure secret (32 bytes)
/// 3. Store endpoint in database
/// 4. Return endpoint with secret (only shown once)
pub async fn create_webhook_endpoint(
    pool: &DbPool,
    api_key_id: Uuid,
    request: WebhookEndpointRequest,
) -> Result<WebhookEndpointResponse, AppError> {
    validate_webhook_url(&request.url)?;
    validate_event_types(&request.event_types)?;

    let secret = generate_secret();

    let endpoint = sqlx::query_as::<_, WebhookEndpoint>(
        r#"
        INSERT INTO webhook_endpoints (api_key_id, url, secret, event_types)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(api_key_id)
    .bind(&request.url)
    .bind(&secret)
    .bind(&request.event_types)
    .fetch_one(pool)
    .await?;

    tracing::info!(endpoint_id = %endpoint.id, "Webhook endpoint registered");

    Ok(WebhookEndpointResponse::from(endpoint).with_secret(secret))
}

/// List all active webhook endpoints for an API key (secrets excluded).
pub async fn list_webhook_endpoints(
    pool: &DbPool,
    api_key_id: Uuid,
) -> Result<Vec<WebhookEndpointResponse>, AppError> {
    let endpoints = sqlx::query_as::<_, WebhookEndpoint>(
        "SELECT * FROM webhook_endpoints WHERE api_key_id = $1 AND is_active = true ORDER BY created_at DESC",
    )
    .bind(api_key_id)
    .fetch_all(pool)
    .await?;

    Ok(endpoints.into_iter().map(Into::into).collect())
}

/// Delete a webhook endpoint (soft delete, preserves delivery history).
pub async fn delete_webhook_endpoint(
    pool: &DbPool,
    api_key_id: Uuid,
    endpoint_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE webhook_endpoints SET is_active = false WHERE id = $1 AND api_key_id = $2 AND is_active = true",
    )
    .bind(endpoint_id)
    .bind(api_key_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("webhook"));
    }

    Ok(())
}

/// Delivery attempts for one endpoint, newest first (at most 100).
pub async fn list_webhook_events(
    pool: &DbPool,
    api_key_id: Uuid,
    endpoint_id: Uuid,
) -> Result<Vec<WebhookEvent>, AppError> {
    let owned: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM webhook_endpoints WHERE id = $1 AND api_key_id = $2)",
    )
    .bind(endpoint_id)
    .bind(api_key_id)
    .fetch_one(pool)
    .await?;

    if !owned {
        return Err(AppError::NotFound("webhook"));
    }

    let events = sqlx::query_as::<_, WebhookEvent>(
        r#"
        SELECT id, webhook_endpoint_id, event_type, payload, sent_at, response_status, response_body
        FROM webhook_events
        WHERE webhook_endpoint_id = $1
        ORDER BY sent_at DESC
        LIMIT 100
        "#,
    )
    .bind(endpoint_id)
    .fetch_all(pool)
    .await?;

    Ok(events)
}

/// Deliver one domain event to every subscribed endpoint of its business.
///
/// Individual delivery failures are logged and recorded but do not stop
/// delivery to the remaining endpoints.
pub async fn dispatch_event(
    pool: &DbPool,
    client: &reqwest::Client,
    event: &DomainEvent,
) -> Result<(), AppError> {
    let endpoints = sqlx::query_as::<_, WebhookEndpoint>(
        "SELECT * FROM webhook_endpoints WHERE api_key_id = $1 AND is_active = true",
    )
    .bind(event.api_key_id)
    .fetch_all(pool)
    .await?;

    let subscribed = endpoints
        .iter()
        .filter(|endpoint| endpoint.is_subscribed_to(event.event_type));

    for endpoint in subscribed {
        if let Err(e) = send_webhook(pool, client, endpoint, event).await {
            tracing::error!(
                endpoint_id = %endpoint.id,
                event_id = %event.id,
                error = %e,
                "Failed to record webhook delivery"
            );
        }
    }

    Ok(())
}

/// POST one event to one endpoint and append the outcome to its delivery log.
///
/// The body is signed with the endpoint secret and sent with
/// `X-Webhook-Signature: sha256=<hex>`, `X-Webhook-Event-Id` and
/// `X-Webhook-Event-Type`. A receiver that answers with any status counts
/// as delivered; transport errors are logged with no status.
async fn send_webhook(
    pool: &DbPool,
    client: &reqwest::Client,
    endpoint: &WebhookEndpoint,
    event: &DomainEvent,
) -> Result<(), AppError> {
    let payload = serde_json::to_value(WebhookPayload::from(event))
        .map_err(|e| AppError::InvalidRequest(format!("Failed to encode payload: {}", e)))?;
    let body = payload.to_string();
    let signature = generate_signature(&endpoint.secret, &body)?;

    let outcome = client
        .post(&endpoint.url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header("X-Webhook-Signature", signature)
        .header("X-Webhook-Event-Id", event.id.to_string())
        .header("X-Webhook-Event-Type", event.event_type.as_str())
        .body(body)
        .send()
        .await;

    let (response_status, response_body) = match outcome {
        Ok(response) => (
            Some(i32::from(response.status().as_u16())),
            response.text().await.ok(),
        ),
        Err(e) => {
            tracing::warn!(endpoint_id = %endpoint.id, error = %e, "Webhook request failed");
            (None, Some(format!("Request failed: {}", e)))
        }
    };

    sqlx::query(
        r#"
        INSERT INTO webhook_events (
            webhook_endpoint_id, event_type, payload, response_status, response_body
        )
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(endpoint.id)
    .bind(event.event_type.as_str())
    .bind(payload)
    .bind(response_status)
    .bind(response_body)
    .execute(pool)
    .await?;

    Ok(())
}

/// `sha256=` followed by the hex HMAC-SHA256 of `payload` keyed with `secret`.
///
/// Receivers recompute it over the raw request body and compare in
/// constant time.
pub fn generate_signature(secret: &str, payload: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::InvalidRequest(format!("Invalid webhook secret: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// 32 random bytes, hex encoded.
pub fn generate_secret() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

fn validate_event_types(event_types: &[String]) -> Result<(), AppError> {
    match event_types.iter().find(|name| EventType::parse(name).is_none()) {
        Some(unknown) => Err(AppError::InvalidRequest(format!(
            "Unknown event type '{}'",
            unknown
        ))),
        None => Ok(()),
    }
}

const MAX_URL_LENGTH: usize = 2048;

/// HTTPS anywhere, plain HTTP only for local development hosts.
fn validate_webhook_url(raw: &str) -> Result<(), AppError> {
    let invalid = |reason: &str| AppError::InvalidWebhookUrl(reason.to_string());

    if raw.len() > MAX_URL_LENGTH {
        return Err(invalid("URL exceeds 2048 characters"));
    }

    let parsed = url::Url::parse(raw).map_err(|_| invalid("Invalid URL format"))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if is_local_host(&parsed) => Ok(()),
        "http" => Err(invalid(
            "HTTP is only allowed for localhost. Use HTTPS for production.",
        )),
        _ => Err(invalid("URL must use HTTP or HTTPS")),
    }
}

fn is_local_host(url: &url::Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "0.0.0.0"))
}
