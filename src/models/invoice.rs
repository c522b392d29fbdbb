//! Accounts receivable invoice models.
//!
//! An invoice moves through a small lifecycle:
//!
//! ```text
//! draft ──issue──▶ open ──pay──▶ partially_paid ──pay──▶ paid
//!   │               │  └──────────────pay (full)─────────▲
//!   └──cancel──▶ cancelled ◀──cancel (no payments)──┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Open,
    PartiallyPaid,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Open,
        InvoiceStatus::PartiallyPaid,
        InvoiceStatus::Paid,
        InvoiceStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Open => "open",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Open)
                | (Draft, Cancelled)
                | (Open, Cancelled)
                | (Open, PartiallyPaid)
                | (Open, Paid)
                | (PartiallyPaid, PartiallyPaid)
                | (PartiallyPaid, Paid)
        )
    }

    /// Check a transition, producing the API error when it is not allowed.
    pub fn transition_to(&self, next: InvoiceStatus) -> Result<InvoiceStatus, AppError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

/// Invoice header from the `ar_invoices` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ArInvoice {
    pub id: Uuid,
    #[serde(skip)]
    pub api_key_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub status: String,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArInvoice {
    pub fn status(&self) -> Result<InvoiceStatus, AppError> {
        InvoiceStatus::parse(&self.status).ok_or_else(|| {
            AppError::InvalidRequest(format!("Unknown invoice status '{}'", self.status))
        })
    }

    pub fn outstanding_cents(&self) -> i64 {
        self.total_cents - self.paid_cents
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ArInvoiceLine {
    pub id: Uuid,
    #[serde(skip)]
    pub invoice_id: Uuid,
    pub line_number: i32,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_rate_bp: i32,
    pub line_total_cents: i64,
}

/// Invoice with its lines, as returned by the API.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: ArInvoice,
    pub outstanding_cents: i64,
    pub lines: Vec<ArInvoiceLine>,
}

impl InvoiceResponse {
    pub fn new(invoice: ArInvoice, lines: Vec<ArInvoiceLine>) -> Self {
        Self {
            outstanding_cents: invoice.outstanding_cents(),
            invoice,
            lines,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLineRequest {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// VAT / sales tax rate in basis points (1900 = 19 %)
    #[serde(default)]
    pub tax_rate_bp: i32,
}

/// Request body for `POST /api/v1/invoices`.
///
/// ```json
/// {
///   "customer_id": "550e8400-e29b-41d4-a716-446655440000",
///   "invoice_number": "RE-2025-0001",
///   "currency": "EUR",
///   "issue_date": "2025-03-01",
///   "due_date": "2025-03-31",
///   "lines": [
///     { "description": "Pallet racking", "quantity": 4, "unit_price_cents": 25000, "tax_rate_bp": 1900 }
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub customer_id: Uuid,
    pub invoice_number: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub lines: Vec<InvoiceLineRequest>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Request body for `POST /api/v1/invoices/{id}/payments`.
///
/// The payment is posted to the ledger as debit `cash_account_id`,
/// credit `receivable_account_id`.
#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount_cents: i64,
    pub cash_account_id: Uuid,
    pub receivable_account_id: Uuid,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ArPayment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount_cents: i64,
    pub journal_entry_id: Uuid,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
}

/// Computed money amounts for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub net_cents: i64,
    pub tax_cents: i64,
    /// Net plus tax
    pub total_cents: i64,
}

/// Computed invoice totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub lines: Vec<LineAmounts>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

fn checked_sum(values: impl Iterator<Item = i64>) -> Option<i64> {
    values.into_iter().try_fold(0i64, i64::checked_add)
}

/// Tax on a net amount, rounded half up to the cent.
pub fn line_tax(net_cents: i64, tax_rate_bp: i32) -> i64 {
    let product = net_cents as i128 * tax_rate_bp as i128;
    ((product + 5_000) / 10_000) as i64
}

impl InvoiceTotals {
    /// Validate lines and compute net, tax and grand totals.
    pub fn compute(lines: &[InvoiceLineRequest]) -> Result<Self, AppError> {
        if lines.is_empty() {
            return Err(AppError::InvalidRequest(
                "An invoice needs at least one line".to_string(),
            ));
        }

        let mut amounts = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            if line.description.trim().is_empty() {
                return Err(AppError::InvalidRequest(format!(
                    "Line {} has no description",
                    index + 1
                )));
            }
            if line.quantity <= 0 {
                return Err(AppError::InvalidRequest(format!(
                    "Line {} quantity must be positive",
                    index + 1
                )));
            }
            if line.unit_price_cents < 0 || !(0..=10_000).contains(&line.tax_rate_bp) {
                return Err(AppError::InvalidRequest(format!(
                    "Line {} has a negative price or a tax rate outside 0..=10000 bp",
                    index + 1
                )));
            }
            let net_cents = line
                .quantity
                .checked_mul(line.unit_price_cents)
                .ok_or_else(|| {
                    AppError::InvalidRequest(format!("Line {} amount overflows", index + 1))
                })?;
            let tax_cents = line_tax(net_cents, line.tax_rate_bp);
            let total_cents = net_cents.checked_add(tax_cents).ok_or_else(|| {
                AppError::InvalidRequest(format!("Line {} amount overflows", index + 1))
            })?;
            amounts.push(LineAmounts {
                net_cents,
                tax_cents,
                total_cents,
            });
        }

        let overflow = || AppError::InvalidRequest("Invoice total overflows".to_string());
        let subtotal_cents = checked_sum(amounts.iter().map(|a| a.net_cents)).ok_or_else(overflow)?;
        let tax_cents = checked_sum(amounts.iter().map(|a| a.tax_cents)).ok_or_else(overflow)?;
        let total_cents = subtotal_cents.checked_add(tax_cents).ok_or_else(overflow)?;
        Ok(Self {
            lines: amounts,
            subtotal_cents,
            tax_cents,
            total_cents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i64, unit_price_cents: i64, tax_rate_bp: i32) -> InvoiceLineRequest {
        InvoiceLineRequest {
            description: "Item".into(),
            quantity,
            unit_price_cents,
            tax_rate_bp,
        }
    }

    #[test]
    fn totals_sum_net_and_tax() {
        let totals = InvoiceTotals::compute(&[line(4, 25_000, 1_900), line(1, 999, 700)]).unwrap();
        assert_eq!(totals.subtotal_cents, 100_999);
        // 100000 * 19% = 19000; 999 * 7% = 69.93 -> 70
        assert_eq!(totals.tax_cents, 19_070);
        assert_eq!(totals.total_cents, 120_069);
    }

    #[test]
    fn tax_rounds_half_up() {
        assert_eq!(line_tax(50, 1_000), 5);
        assert_eq!(line_tax(5, 1_000), 1); // 0.5 -> 1
        assert_eq!(line_tax(4, 1_000), 0); // 0.4 -> 0
    }

    #[test]
    fn invalid_lines_are_rejected() {
        assert!(InvoiceTotals::compute(&[]).is_err());
        assert!(InvoiceTotals::compute(&[line(0, 100, 0)]).is_err());
        assert!(InvoiceTotals::compute(&[line(1, -100, 0)]).is_err());
        assert!(InvoiceTotals::compute(&[line(1, 100, 10_001)]).is_err());
        assert!(InvoiceTotals::compute(&[line(i64::MAX, 2, 0)]).is_err());

        // Every line fits on its own; their sum does not
        let half = line(1, i64::MAX / 2 + 1, 0);
        assert!(matches!(
            InvoiceTotals::compute(&[half.clone(), half]),
            Err(AppError::InvalidRequest(_))
        ));
        // Net fits, net plus tax does not
        assert!(InvoiceTotals::compute(&[line(1, i64::MAX - 10, 10_000)]).is_err());
    }

    #[test]
    fn lifecycle_allows_only_documented_moves() {
        use InvoiceStatus::*;
        assert!(Draft.can_transition_to(Open));
        assert!(Open.can_transition_to(Paid));
        assert!(PartiallyPaid.can_transition_to(Paid));
        assert!(Open.can_transition_to(Cancelled));

        assert!(!Draft.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!PartiallyPaid.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Open));
    }

    #[test]
    fn rejected_transition_reports_both_states() {
        match InvoiceStatus::Paid.transition_to(InvoiceStatus::Open) {
            Err(AppError::InvalidStateTransition { from, to }) => {
                assert_eq!(from, "paid");
                assert_eq!(to, "open");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
