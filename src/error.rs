//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::db::is_unique_violation;
use crate::services::edi::EdiError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Invalid or missing API keys
/// - **Resource Errors**: Requested resources not found
/// - **Business Logic Errors**: Conflicts and illegal status transitions
/// - **Validation Errors**: Invalid request data or malformed EDI
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// API key is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Requested resource does not exist or belongs to another business.
    ///
    /// The payload is the resource name (`"customer"`, `"invoice"`, ...).
    /// Returns HTTP 404 Not Found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Webhook URL failed validation.
    #[error("Invalid webhook URL")]
    InvalidWebhookUrl(String),

    /// Resource already exists or is still referenced.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Conflict")]
    Conflict(String),

    /// A status change the resource's lifecycle does not allow.
    #[error("Cannot move from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// A payment would exceed the outstanding amount.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Payment exceeds the outstanding amount")]
    Overpayment,

    /// Inbound EDI could not be parsed or failed envelope checks.
    #[error("EDI error: {0}")]
    Edi(#[from] EdiError),
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        if is_unique_violation(&error) {
            return AppError::Conflict("Resource already exists".to_string());
        }
        AppError::Database(error)
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, String) {
        match self {
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key".into()),
            AppError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, format!("{}_not_found", resource))
            }
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request".into()),
            AppError::InvalidWebhookUrl(_) => {
                (StatusCode::BAD_REQUEST, "invalid_webhook_url".into())
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict".into()),
            AppError::InvalidStateTransition { .. } => {
                (StatusCode::CONFLICT, "invalid_state_transition".into())
            }
            AppError::Overpayment => (StatusCode::UNPROCESSABLE_ENTITY, "overpayment".into()),
            AppError::Edi(_) => (StatusCode::UNPROCESSABLE_ENTITY, "edi_parse_error".into()),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error".into()),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Database errors are logged and hidden from the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match self {
            AppError::InvalidRequest(msg)
            | AppError::InvalidWebhookUrl(msg)
            | AppError::Conflict(msg) => msg,
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_code_is_derived_from_resource_name() {
        let (status, code) = AppError::NotFound("invoice").status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "invoice_not_found");
    }

    #[test]
    fn state_transition_maps_to_conflict() {
        let error = AppError::InvalidStateTransition {
            from: "paid".into(),
            to: "cancelled".into(),
        };
        assert_eq!(error.to_string(), "Cannot move from paid to cancelled");
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn database_errors_are_internal() {
        let response = AppError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn row_not_found_is_not_mistaken_for_conflict() {
        let error: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(error, AppError::Database(_)));
    }
}
