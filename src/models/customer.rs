//! CRM customer models and API request types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Customer record from the `customers` table.
///
/// `customer_number` is unique per business. `credit_limit_cents` is the
/// largest open receivable the business is willing to carry for this customer.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Customer {
    pub id: Uuid,
    #[serde(skip)]
    pub api_key_id: Uuid,
    pub customer_number: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub credit_limit_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Blocked,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "active",
            CustomerStatus::Inactive => "inactive",
            CustomerStatus::Blocked => "blocked",
        }
    }
}

/// Request body for `POST /api/v1/customers`.
///
/// ```json
/// {
///   "customer_number": "C-10001",
///   "name": "Müller GmbH",
///   "email": "einkauf@mueller.example",
///   "credit_limit_cents": 5000000
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub customer_number: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub credit_limit_cents: i64,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<CustomerStatus>,
    pub credit_limit_cents: Option<i64>,
}

/// Query string for `GET /api/v1/customers`.
#[derive(Debug, Default, Deserialize)]
pub struct CustomerFilter {
    pub status: Option<CustomerStatus>,
    pub search: Option<String>,
}

const MAX_NAME_LEN: usize = 200;

impl CreateCustomerRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.customer_number.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "customer_number must not be blank".to_string(),
            ));
        }
        validate_name(&self.name)?;
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        validate_credit_limit(self.credit_limit_cents)
    }
}

impl UpdateCustomerRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(limit) = self.credit_limit_cents {
            validate_credit_limit(limit)?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidRequest("name must not be blank".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(AppError::InvalidRequest(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<(), AppError> {
    let mut parts = email.split('@');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => !local.is_empty() && !domain.is_empty(),
        _ => false,
    };
    if !valid {
        return Err(AppError::InvalidRequest(format!(
            "'{}' is not a valid email address",
            email
        )));
    }
    Ok(())
}

fn validate_credit_limit(limit: i64) -> Result<(), AppError> {
    if limit < 0 {
        return Err(AppError::InvalidRequest(
            "credit_limit_cents must not be negative".to_string(),
        ));
    }
    Ok(())
}
