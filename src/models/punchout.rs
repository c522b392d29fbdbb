//! PunchOut sessions: a buyer's procurement system opens our catalog, fills a
//! cart and receives it back as a cXML order message or OCI form fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunchOutOperation {
    #[default]
    Create,
    Edit,
    Inspect,
}

impl PunchOutOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PunchOutOperation::Create => "create",
            PunchOutOperation::Edit => "edit",
            PunchOutOperation::Inspect => "inspect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Submitted,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Submitted => "submitted",
            SessionStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PunchOutSession {
    pub id: Uuid,
    #[serde(skip)]
    pub api_key_id: Uuid,
    pub buyer_cookie: String,
    pub user_email: String,
    pub return_url: String,
    pub operation: String,
    pub status: String,
    #[serde(skip)]
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Cart line. Price, description and unit are copied from the catalog item
/// when it is added, so later catalog edits do not change an open cart.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CartItem {
    pub id: Uuid,
    pub session_id: Uuid,
    pub catalog_item_id: Uuid,
    pub supplier_part_id: String,
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub currency: String,
    pub uom: String,
}

impl CartItem {
    /// `None` when quantity times price leaves `i64`.
    pub fn line_total_cents(&self) -> Option<i64> {
        self.unit_price_cents.checked_mul(i64::from(self.quantity))
    }
}

/// Largest quantity of one item a cart may hold.
pub const MAX_CART_QUANTITY: i32 = 1_000_000;

/// Sum of all line totals.
pub fn cart_total_cents(items: &[CartItem]) -> Result<i64, AppError> {
    items
        .iter()
        .try_fold(0i64, |total, item| {
            item.line_total_cents()
                .and_then(|line| total.checked_add(line))
        })
        .ok_or_else(|| AppError::InvalidRequest("Cart total is too large".to_string()))
}

/// Body of `POST /api/v1/punchout/sessions`.
#[derive(Debug, Deserialize)]
pub struct SetupSessionRequest {
    pub buyer_cookie: String,
    pub user_email: String,
    pub return_url: String,
    #[serde(default)]
    pub operation: PunchOutOperation,
}

#[derive(Debug, Serialize)]
pub struct SetupSessionResponse {
    pub session: PunchOutSession,
    pub start_url: String,
    /// cXML `PunchOutSetupResponse` for cXML buyers
    pub cxml: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub catalog_item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct SessionWithCart {
    #[serde(flatten)]
    pub session: PunchOutSession,
    pub items: Vec<CartItem>,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutFormat {
    #[default]
    Cxml,
    Oci,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutQuery {
    #[serde(default)]
    pub format: CheckoutFormat,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: Uuid,
    pub format: CheckoutFormat,
    pub return_url: String,
    pub total_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cxml: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oci_fields: Option<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, unit_price_cents: i64) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            session_id: Uuid::nil(),
            catalog_item_id: Uuid::new_v4(),
            supplier_part_id: "P-1".into(),
            description: "Toner".into(),
            quantity,
            unit_price_cents,
            currency: "EUR".into(),
            uom: "EA".into(),
        }
    }

    #[test]
    fn cart_total_sums_lines() {
        assert_eq!(cart_total_cents(&[line(2, 1_450), line(1, 99)]).unwrap(), 2_999);
        assert_eq!(cart_total_cents(&[]).unwrap(), 0);
    }

    #[test]
    fn oversized_lines_do_not_wrap() {
        let huge = line(1_000, 100_000_000_000_000_000);
        assert_eq!(huge.line_total_cents(), None);
        assert!(matches!(
            cart_total_cents(&[huge]),
            Err(AppError::InvalidRequest(_))
        ));

        let half = line(1, i64::MAX / 2 + 1);
        assert!(cart_total_cents(&[half.clone(), half]).is_err());
    }

    #[test]
    fn capped_cart_cannot_overflow() {
        let largest = line(MAX_CART_QUANTITY, crate::models::catalog::MAX_UNIT_PRICE_CENTS);
        assert!(largest.line_total_cents().is_some());
    }
}
