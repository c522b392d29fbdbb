//! HTTP routing table.

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers, middleware, state::AppState};

/// Build the application router.
///
/// `/health` and the PunchOut start page are public; everything under
/// `/api/v1` requires an API key.
pub fn build_router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        // CRM
        .route(
            "/api/v1/customers",
            post(handlers::customers::create_customer).get(handlers::customers::list_customers),
        )
        .route(
            "/api/v1/customers/{id}",
            get(handlers::customers::get_customer)
                .patch(handlers::customers::update_customer)
                .delete(handlers::customers::delete_customer),
        )
        // Finance
        .route(
            "/api/v1/ledger/accounts",
            post(handlers::ledger::create_account).get(handlers::ledger::list_accounts),
        )
        .route(
            "/api/v1/ledger/accounts/{id}",
            get(handlers::ledger::get_account),
        )
        .route(
            "/api/v1/ledger/journal-entries",
            post(handlers::ledger::post_journal_entry).get(handlers::ledger::list_journal_entries),
        )
        .route(
            "/api/v1/ledger/journal-entries/{id}",
            get(handlers::ledger::get_journal_entry),
        )
        .route(
            "/api/v1/ledger/trial-balance",
            get(handlers::ledger::trial_balance),
        )
        .route(
            "/api/v1/invoices",
            post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
        )
        .route(
            "/api/v1/invoices/{id}",
            get(handlers::invoices::get_invoice),
        )
        .route(
            "/api/v1/invoices/{id}/issue",
            post(handlers::invoices::issue_invoice),
        )
        .route(
            "/api/v1/invoices/{id}/cancel",
            post(handlers::invoices::cancel_invoice),
        )
        .route(
            "/api/v1/invoices/{id}/payments",
            post(handlers::invoices::record_payment).get(handlers::invoices::list_payments),
        )
        // Procurement
        .route(
            "/api/v1/procurement/three-way-match",
            post(handlers::procurement::three_way_match),
        )
        .route(
            "/api/v1/procurement/requisitions/evaluate",
            post(handlers::procurement::evaluate_requisition),
        )
        .route(
            "/api/v1/tprm/assessments",
            post(handlers::risk::create_assessment),
        )
        .route(
            "/api/v1/tprm/assessments/{id}",
            get(handlers::risk::get_assessment),
        )
        .route(
            "/api/v1/tprm/suppliers/{supplier_ref}/assessments",
            get(handlers::risk::list_supplier_assessments),
        )
        .route(
            "/api/v1/catalog/items",
            post(handlers::catalog::create_item).get(handlers::catalog::search_items),
        )
        .route(
            "/api/v1/catalog/items/{id}",
            get(handlers::catalog::get_item),
        )
        .route(
            "/api/v1/catalog/items/{id}/deactivate",
            post(handlers::catalog::deactivate_item),
        )
        .route(
            "/api/v1/punchout/sessions",
            post(handlers::punchout::setup_session),
        )
        .route(
            "/api/v1/punchout/sessions/{id}",
            get(handlers::punchout::get_session),
        )
        .route(
            "/api/v1/punchout/sessions/{id}/items",
            post(handlers::punchout::add_cart_item),
        )
        .route(
            "/api/v1/punchout/sessions/{id}/checkout",
            post(handlers::punchout::checkout),
        )
        // Warehouse EDI
        .route(
            "/api/v1/edi/inbound",
            post(handlers::edi::receive_interchange),
        )
        .route(
            "/api/v1/edi/outbound",
            post(handlers::edi::send_document),
        )
        .route(
            "/api/v1/edi/documents",
            get(handlers::edi::list_documents),
        )
        .route(
            "/api/v1/edi/documents/{id}",
            get(handlers::edi::get_document),
        )
        // Integration
        .route(
            "/api/v1/integrations",
            post(handlers::integrations::create_integration)
                .get(handlers::integrations::list_integrations),
        )
        .route(
            "/api/v1/integrations/{id}",
            get(handlers::integrations::get_integration)
                .patch(handlers::integrations::update_integration),
        )
        .route(
            "/api/v1/sync-jobs",
            post(handlers::integrations::create_job).get(handlers::integrations::list_jobs),
        )
        .route(
            "/api/v1/sync-jobs/{id}",
            get(handlers::integrations::get_job),
        )
        .route(
            "/api/v1/sync-jobs/{id}/run",
            post(handlers::integrations::run_job),
        )
        .route(
            "/api/v1/sync-jobs/{id}/cancel",
            post(handlers::integrations::cancel_job),
        )
        .route(
            "/api/v1/webhooks",
            post(handlers::webhooks::create_webhook).get(handlers::webhooks::list_webhooks),
        )
        .route(
            "/api/v1/webhooks/{id}",
            delete(handlers::webhooks::delete_webhook),
        )
        .route(
            "/api/v1/webhooks/{id}/events",
            get(handlers::webhooks::list_webhook_events),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let cors = cors_layer(&state.config.cors_allowed_origins);

    let router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/punchout/{token}", get(handlers::punchout::start_page))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// CORS for browser-based procurement front ends.
///
/// Origins that are not valid header values are skipped with a warning.
/// Returns `None` when no usable origin is configured.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, services::event_bus::EventBus};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// A router whose pool never connects; only paths that stop before the
    /// database can be exercised.
    fn router() -> Router {
        let config = Config::from_pairs([(
            "DATABASE_URL".to_string(),
            "postgres://nobody@127.0.0.1:1/none".to_string(),
        )])
        .unwrap();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy(&config.database_url)
            .unwrap();
        let (events, _receiver) = EventBus::new(8);
        build_router(AppState::new(pool, events, config))
    }

    async fn error_code(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["error"]["code"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn missing_api_key_is_rejected() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/customers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "invalid_api_key");
    }

    #[tokio::test]
    async fn non_bearer_authorization_is_rejected() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/edi/inbound")
                    .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
                    .body(Body::from("ISA*00"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/api/v2/anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_unreachable_database() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], "unavailable");
    }

    #[test]
    fn cors_is_disabled_without_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["  ".to_string()]).is_none());
    }

    #[test]
    fn cors_skips_invalid_origins() {
        let origins = vec!["bad\norigin".to_string(), "https://buyer.example.com".to_string()];
        assert!(cors_layer(&origins).is_some());
    }
}
