//! Supplier catalog items offered to buyers through guided buying and PunchOut.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CatalogItem {
    pub id: Uuid,
    #[serde(skip)]
    pub api_key_id: Uuid,
    pub supplier: String,
    pub supplier_part_id: String,
    pub description: String,
    pub unit_price_cents: i64,
    pub currency: String,
    pub uom: String,
    pub category: Option<String>,
    pub lead_time_days: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/v1/catalog/items`.
///
/// ```json
/// {
///   "supplier": "Nordic Pallets AB",
///   "supplier_part_id": "EUR-PAL-1200",
///   "description": "EUR pallet 1200x800",
///   "unit_price_cents": 1450,
///   "uom": "EA",
///   "category": "packaging"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateCatalogItemRequest {
    pub supplier: String,
    pub supplier_part_id: String,
    pub description: String,
    pub unit_price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_uom")]
    pub uom: String,
    pub category: Option<String>,
    pub lead_time_days: Option<i32>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_uom() -> String {
    "EA".to_string()
}

impl CreateCatalogItemRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("supplier", &self.supplier),
            ("supplier_part_id", &self.supplier_part_id),
            ("description", &self.description),
            ("uom", &self.uom),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::InvalidRequest(format!(
                    "{} must not be blank",
                    field
                )));
            }
        }
        if !(0..=MAX_UNIT_PRICE_CENTS).contains(&self.unit_price_cents) {
            return Err(AppError::InvalidRequest(format!(
                "unit_price_cents must be between 0 and {}",
                MAX_UNIT_PRICE_CENTS
            )));
        }
        if self.lead_time_days.is_some_and(|d| d < 0) {
            return Err(AppError::InvalidRequest(
                "lead_time_days must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// 100 million in major units. Together with the cart quantity cap this
/// keeps every cart total inside `i64`.
pub const MAX_UNIT_PRICE_CENTS: i64 = 10_000_000_000;

pub const DEFAULT_SEARCH_LIMIT: i64 = 50;
pub const MAX_SEARCH_LIMIT: i64 = 100;

/// Query string for `GET /api/v1/catalog/items`.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSearch {
    pub q: Option<String>,
    pub supplier: Option<String>,
    pub category: Option<String>,
    pub limit: Option<i64>,
}

impl CatalogSearch {
    /// Requested limit clamped to `1..=MAX_SEARCH_LIMIT`.
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateCatalogItemRequest {
        serde_json::from_value(serde_json::json!({
            "supplier": "Nordic Pallets AB",
            "supplier_part_id": "EUR-PAL-1200",
            "description": "EUR pallet",
            "unit_price_cents": 1450
        }))
        .unwrap()
    }

    #[test]
    fn defaults_apply() {
        let r = request();
        assert_eq!(r.currency, "USD");
        assert_eq!(r.uom, "EA");
        assert!(r.validate().is_ok());
    }

    #[test]
    fn blank_and_negative_values_are_rejected() {
        let mut r = request();
        r.supplier_part_id = " ".into();
        assert!(r.validate().is_err());

        let mut r = request();
        r.unit_price_cents = -1;
        assert!(r.validate().is_err());

        let mut r = request();
        r.lead_time_days = Some(-3);
        assert!(r.validate().is_err());

        let mut r = request();
        r.unit_price_cents = MAX_UNIT_PRICE_CENTS + 1;
        assert!(r.validate().is_err());
        r.unit_price_cents = MAX_UNIT_PRICE_CENTS;
        assert!(r.validate().is_ok());
    }

    #[test]
    fn search_limit_is_clamped() {
        assert_eq!(CatalogSearch::default().limit(), 50);
        let search = CatalogSearch {
            limit: Some(1000),
            ..Default::default()
        };
        assert_eq!(search.limit(), 100);
        let search = CatalogSearch {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(search.limit(), 1);
    }
}
