//! Three-way match request and result types.
//!
//! Tolerances and variances are expressed in basis points of the reference
//! value (10 000 bp = 100 %).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseOrderLine {
    pub line_number: i32,
    pub sku: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptLine {
    pub line_number: i32,
    pub quantity_received: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceMatchLine {
    pub line_number: i32,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tolerance {
    #[serde(default)]
    pub quantity_bp: i64,
    #[serde(default)]
    pub price_bp: i64,
}

/// Body of `POST /api/v1/procurement/three-way-match`.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreeWayMatchRequest {
    /// Purchase order number, echoed in the result and events
    pub po_number: Option<String>,
    pub po_lines: Vec<PurchaseOrderLine>,
    #[serde(default)]
    pub receipt_lines: Vec<ReceiptLine>,
    pub invoice_lines: Vec<InvoiceMatchLine>,
    /// Falls back to the configured defaults when absent
    pub tolerance: Option<Tolerance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    QuantityVariance,
    PriceVariance,
    MissingReceipt,
    UnmatchedInvoiceLine,
    UnmatchedReceiptLine,
}

/// Ordered from harmless to blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub line_number: i32,
    pub kind: DiscrepancyKind,
    pub severity: Severity,
    /// Value on the purchase order or goods receipt
    pub expected: i64,
    /// Value on the invoice (or receipt, for unmatched receipt lines)
    pub actual: i64,
    pub variance_bp: i64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    MatchedWithinTolerance,
    Exception,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreeWayMatchResult {
    pub po_number: Option<String>,
    pub status: MatchStatus,
    pub payment_blocked: bool,
    pub tolerance: Tolerance,
    pub po_total_cents: i64,
    pub invoice_total_cents: i64,
    /// Received quantity at PO price, for every invoiced PO line
    pub expected_invoice_cents: i64,
    /// `invoice_total_cents - expected_invoice_cents`
    pub variance_cents: i64,
    pub discrepancies: Vec<Discrepancy>,
}
