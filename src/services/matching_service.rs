//! Three-way match between purchase order, goods receipt and invoice.
//!
//! Pure rule evaluation with no IO; the handler decides what to publish.
//!
//! Per PO line the invoice is compared against what was received (quantity)
//! and what was ordered (unit price). Over-billing is graded against the
//! tolerance, under-billing never blocks payment.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::AppError;
use crate::models::matching::{
    Discrepancy, DiscrepancyKind, InvoiceMatchLine, MatchStatus, PurchaseOrderLine, ReceiptLine,
    Severity, ThreeWayMatchRequest, ThreeWayMatchResult, Tolerance,
};

/// Variance allowed before any over-billing is high when tolerance is zero.
const ZERO_TOLERANCE_MEDIUM_BP: i64 = 500;

/// Run the match.
///
/// # Errors
///
/// `InvalidRequest` when a document repeats a line number, has negative
/// quantities or prices, or when there are no PO or invoice lines.
pub fn evaluate(
    request: &ThreeWayMatchRequest,
    default_tolerance: Tolerance,
) -> Result<ThreeWayMatchResult, AppError> {
    let tolerance = request.tolerance.unwrap_or(default_tolerance);
    if tolerance.quantity_bp < 0 || tolerance.price_bp < 0 {
        return Err(AppError::InvalidRequest(
            "Tolerances must not be negative".to_string(),
        ));
    }
    if request.po_lines.is_empty() || request.invoice_lines.is_empty() {
        return Err(AppError::InvalidRequest(
            "Purchase order and invoice must each have at least one line".to_string(),
        ));
    }

    let po = index_lines("purchase order", &request.po_lines, |l| l.line_number)?;
    let receipts = index_lines("goods receipt", &request.receipt_lines, |l| l.line_number)?;
    let invoice = index_lines("invoice", &request.invoice_lines, |l| l.line_number)?;
    validate_amounts(&request.po_lines, &request.receipt_lines, &request.invoice_lines)?;

    let mut discrepancies = Vec::new();
    let mut expected_invoice_cents = 0i64;

    for (line_number, inv) in &invoice {
        let Some(po_line) = po.get(line_number) else {
            discrepancies.push(Discrepancy {
                line_number: *line_number,
                kind: DiscrepancyKind::UnmatchedInvoiceLine,
                severity: Severity::High,
                expected: 0,
                actual: inv.quantity,
                variance_bp: 10_000,
                message: format!("Invoice line {} has no purchase order line", line_number),
            });
            continue;
        };

        let received = receipts
            .get(line_number)
            .map(|r| r.quantity_received)
            .unwrap_or(0);
        expected_invoice_cents = received
            .checked_mul(po_line.unit_price_cents)
            .and_then(|amount| expected_invoice_cents.checked_add(amount))
            .ok_or_else(|| amount_overflow("Expected invoice amount"))?;

        if received == 0 && inv.quantity > 0 {
            discrepancies.push(Discrepancy {
                line_number: *line_number,
                kind: DiscrepancyKind::MissingReceipt,
                severity: Severity::High,
                expected: 0,
                actual: inv.quantity,
                variance_bp: 10_000,
                message: format!(
                    "Line {} ({}) is invoiced but nothing was received",
                    line_number, po_line.sku
                ),
            });
        } else if let Some(d) = compare(
            *line_number,
            DiscrepancyKind::QuantityVariance,
            received,
            inv.quantity,
            tolerance.quantity_bp,
        ) {
            discrepancies.push(d);
        }

        if let Some(d) = compare(
            *line_number,
            DiscrepancyKind::PriceVariance,
            po_line.unit_price_cents,
            inv.unit_price_cents,
            tolerance.price_bp,
        ) {
            discrepancies.push(d);
        }
    }

    for (line_number, receipt) in &receipts {
        if !po.contains_key(line_number) {
            discrepancies.push(Discrepancy {
                line_number: *line_number,
                kind: DiscrepancyKind::UnmatchedReceiptLine,
                severity: Severity::Medium,
                expected: 0,
                actual: receipt.quantity_received,
                variance_bp: 10_000,
                message: format!("Received line {} is not on the purchase order", line_number),
            });
        }
    }

    discrepancies.sort_by_key(|d| (d.line_number, d.kind as u8));

    let po_total_cents = document_total(
        "Purchase order total",
        request.po_lines.iter().map(|l| (l.quantity, l.unit_price_cents)),
    )?;
    let invoice_total_cents = document_total(
        "Invoice total",
        request
            .invoice_lines
            .iter()
            .map(|l| (l.quantity, l.unit_price_cents)),
    )?;
    let variance_cents = invoice_total_cents
        .checked_sub(expected_invoice_cents)
        .ok_or_else(|| amount_overflow("Invoice variance"))?;

    let status = overall_status(&discrepancies);

    Ok(ThreeWayMatchResult {
        po_number: request.po_number.clone(),
        status,
        payment_blocked: status == MatchStatus::Exception,
        tolerance,
        po_total_cents,
        invoice_total_cents,
        expected_invoice_cents,
        variance_cents,
        discrepancies,
    })
}

/// Absolute variance of `actual` against `reference`, in basis points,
/// rounded up so that any difference is at least 1 bp.
pub fn variance_bp(reference: i64, actual: i64) -> i64 {
    let diff = (actual as i128 - reference as i128).abs();
    if diff == 0 {
        return 0;
    }
    if reference == 0 {
        return 10_000;
    }
    let reference = (reference as i128).abs();
    ((diff * 10_000 + reference - 1) / reference) as i64
}

/// Grade a variance. Under-billing is at most `Low`.
pub fn severity(variance_bp: i64, tolerance_bp: i64, over: bool) -> Severity {
    if variance_bp <= tolerance_bp {
        return Severity::Info;
    }
    if !over {
        return Severity::Low;
    }
    let medium_limit = if tolerance_bp == 0 {
        ZERO_TOLERANCE_MEDIUM_BP
    } else {
        tolerance_bp.saturating_mul(2)
    };
    if variance_bp <= medium_limit {
        Severity::Medium
    } else {
        Severity::High
    }
}

fn compare(
    line_number: i32,
    kind: DiscrepancyKind,
    expected: i64,
    actual: i64,
    tolerance_bp: i64,
) -> Option<Discrepancy> {
    if expected == actual {
        return None;
    }
    let variance = variance_bp(expected, actual);
    let over = actual > expected;
    let what = match kind {
        DiscrepancyKind::QuantityVariance => "quantity",
        _ => "unit price",
    };
    Some(Discrepancy {
        line_number,
        kind,
        severity: severity(variance, tolerance_bp, over),
        expected,
        actual,
        variance_bp: variance,
        message: format!(
            "Line {} invoiced {} {} {} expected {} ({} bp)",
            line_number,
            what,
            actual,
            if over { "above" } else { "below" },
            expected,
            variance
        ),
    })
}

fn overall_status(discrepancies: &[Discrepancy]) -> MatchStatus {
    match discrepancies.iter().map(|d| d.severity).max() {
        None => MatchStatus::Matched,
        Some(Severity::Info) | Some(Severity::Low) => MatchStatus::MatchedWithinTolerance,
        Some(_) => MatchStatus::Exception,
    }
}

fn index_lines<'a, T>(
    document: &str,
    lines: &'a [T],
    key: impl Fn(&T) -> i32,
) -> Result<BTreeMap<i32, &'a T>, AppError> {
    let mut index = BTreeMap::new();
    for line in lines {
        if index.insert(key(line), line).is_some() {
            return Err(AppError::InvalidRequest(format!(
                "The {} repeats line number {}",
                document,
                key(line)
            )));
        }
    }
    Ok(index)
}

/// Sum of quantity times unit price, failing instead of wrapping.
fn document_total(
    what: &str,
    mut lines: impl Iterator<Item = (i64, i64)>,
) -> Result<i64, AppError> {
    lines
        .try_fold(0i64, |total, (quantity, unit_price_cents)| {
            quantity
                .checked_mul(unit_price_cents)
                .and_then(|amount| total.checked_add(amount))
        })
        .ok_or_else(|| amount_overflow(what))
}

fn amount_overflow(what: &str) -> AppError {
    AppError::InvalidRequest(format!("{} is too large", what))
}

fn validate_amounts(
    po: &[PurchaseOrderLine],
    receipts: &[ReceiptLine],
    invoice: &[InvoiceMatchLine],
) -> Result<(), AppError> {
    let mut bad = BTreeSet::new();
    bad.extend(
        po.iter()
            .filter(|l| l.quantity < 0 || l.unit_price_cents < 0)
            .map(|l| l.line_number),
    );
    bad.extend(
        receipts
            .iter()
            .filter(|l| l.quantity_received < 0)
            .map(|l| l.line_number),
    );
    bad.extend(
        invoice
            .iter()
            .filter(|l| l.quantity < 0 || l.unit_price_cents < 0)
            .map(|l| l.line_number),
    );
    if let Some(line) = bad.first() {
        return Err(AppError::InvalidRequest(format!(
            "Line {} has a negative quantity or price",
            line
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn po(line_number: i32, quantity: i64, unit_price_cents: i64) -> PurchaseOrderLine {
        PurchaseOrderLine {
            line_number,
            sku: format!("SKU-{line_number}"),
            quantity,
            unit_price_cents,
        }
    }

    fn gr(line_number: i32, quantity_received: i64) -> ReceiptLine {
        ReceiptLine {
            line_number,
            quantity_received,
        }
    }

    fn inv(line_number: i32, quantity: i64, unit_price_cents: i64) -> InvoiceMatchLine {
        InvoiceMatchLine {
            line_number,
            quantity,
            unit_price_cents,
        }
    }

    fn request(
        po_lines: Vec<PurchaseOrderLine>,
        receipt_lines: Vec<ReceiptLine>,
        invoice_lines: Vec<InvoiceMatchLine>,
    ) -> ThreeWayMatchRequest {
        ThreeWayMatchRequest {
            po_number: Some("PO-1".into()),
            po_lines,
            receipt_lines,
            invoice_lines,
            tolerance: None,
        }
    }

    const DEFAULT: Tolerance = Tolerance {
        quantity_bp: 0,
        price_bp: 200,
    };

    #[test]
    fn identical_documents_match() {
        let result = evaluate(
            &request(vec![po(1, 10, 1_000)], vec![gr(1, 10)], vec![inv(1, 10, 1_000)]),
            DEFAULT,
        )
        .unwrap();

        assert_eq!(result.status, MatchStatus::Matched);
        assert!(!result.payment_blocked);
        assert!(result.discrepancies.is_empty());
        assert_eq!(result.po_total_cents, 10_000);
        assert_eq!(result.variance_cents, 0);
    }

    #[test]
    fn price_within_tolerance_is_informational() {
        // 1.5 % over with a 2 % tolerance
        let result = evaluate(
            &request(vec![po(1, 10, 1_000)], vec![gr(1, 10)], vec![inv(1, 10, 1_015)]),
            DEFAULT,
        )
        .unwrap();

        assert_eq!(result.status, MatchStatus::MatchedWithinTolerance);
        assert_eq!(result.discrepancies.len(), 1);
        let d = &result.discrepancies[0];
        assert_eq!(d.kind, DiscrepancyKind::PriceVariance);
        assert_eq!(d.severity, Severity::Info);
        assert_eq!(d.variance_bp, 150);
        assert_eq!(result.variance_cents, 150);
    }

    #[test]
    fn price_far_over_tolerance_blocks_payment() {
        // 10 % over with a 2 % tolerance
        let result = evaluate(
            &request(vec![po(1, 10, 1_000)], vec![gr(1, 10)], vec![inv(1, 10, 1_100)]),
            DEFAULT,
        )
        .unwrap();

        assert_eq!(result.status, MatchStatus::Exception);
        assert!(result.payment_blocked);
        assert_eq!(result.discrepancies[0].severity, Severity::High);
    }

    #[test]
    fn invoicing_more_than_received_is_graded() {
        // 1 of 50 over = 200 bp, zero quantity tolerance -> medium
        let result = evaluate(
            &request(vec![po(1, 50, 100)], vec![gr(1, 50)], vec![inv(1, 51, 100)]),
            DEFAULT,
        )
        .unwrap();

        let d = &result.discrepancies[0];
        assert_eq!(d.kind, DiscrepancyKind::QuantityVariance);
        assert_eq!(d.severity, Severity::Medium);
        assert_eq!(result.status, MatchStatus::Exception);
    }

    #[test]
    fn under_invoicing_never_blocks() {
        let result = evaluate(
            &request(vec![po(1, 10, 1_000)], vec![gr(1, 10)], vec![inv(1, 5, 900)]),
            DEFAULT,
        )
        .unwrap();

        assert!(result.discrepancies.iter().all(|d| d.severity == Severity::Low));
        assert_eq!(result.status, MatchStatus::MatchedWithinTolerance);
        assert!(!result.payment_blocked);
    }

    #[test]
    fn invoiced_but_not_received_is_high() {
        let result = evaluate(
            &request(vec![po(1, 10, 1_000)], vec![], vec![inv(1, 10, 1_000)]),
            DEFAULT,
        )
        .unwrap();

        assert_eq!(result.discrepancies.len(), 1);
        assert_eq!(result.discrepancies[0].kind, DiscrepancyKind::MissingReceipt);
        assert_eq!(result.expected_invoice_cents, 0);
        assert_eq!(result.variance_cents, 10_000);
        assert!(result.payment_blocked);
    }

    #[test]
    fn stray_invoice_and_receipt_lines_are_flagged() {
        let result = evaluate(
            &request(
                vec![po(1, 10, 1_000)],
                vec![gr(1, 10), gr(7, 3)],
                vec![inv(1, 10, 1_000), inv(9, 1, 500)],
            ),
            DEFAULT,
        )
        .unwrap();

        let kinds: Vec<_> = result.discrepancies.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiscrepancyKind::UnmatchedReceiptLine,
                DiscrepancyKind::UnmatchedInvoiceLine
            ]
        );
        assert_eq!(result.status, MatchStatus::Exception);
    }

    #[test]
    fn open_po_lines_are_not_discrepancies() {
        let result = evaluate(
            &request(
                vec![po(1, 10, 1_000), po(2, 5, 200)],
                vec![gr(1, 10)],
                vec![inv(1, 10, 1_000)],
            ),
            DEFAULT,
        )
        .unwrap();

        assert_eq!(result.status, MatchStatus::Matched);
        assert_eq!(result.po_total_cents, 11_000);
    }

    #[test]
    fn request_tolerance_overrides_default() {
        let mut req = request(vec![po(1, 10, 1_000)], vec![gr(1, 10)], vec![inv(1, 10, 1_100)]);
        req.tolerance = Some(Tolerance {
            quantity_bp: 0,
            price_bp: 1_000,
        });

        let result = evaluate(&req, DEFAULT).unwrap();
        assert_eq!(result.status, MatchStatus::MatchedWithinTolerance);
        assert_eq!(result.tolerance.price_bp, 1_000);
    }

    #[test]
    fn duplicate_line_numbers_are_rejected() {
        let req = request(
            vec![po(1, 10, 1_000), po(1, 3, 1_000)],
            vec![],
            vec![inv(1, 10, 1_000)],
        );
        assert!(evaluate(&req, DEFAULT).is_err());
    }

    #[test]
    fn negative_values_and_empty_documents_are_rejected() {
        assert!(evaluate(&request(vec![po(1, 10, 1_000)], vec![], vec![]), DEFAULT).is_err());
        assert!(
            evaluate(
                &request(vec![po(1, 10, 1_000)], vec![gr(1, -1)], vec![inv(1, 1, 1)]),
                DEFAULT
            )
            .is_err()
        );
    }

    #[test]
    fn oversized_amounts_are_rejected_not_wrapped() {
        let quantity = 1_000_000_000_000;
        let price = 10_000_000_000;
        let req = request(
            vec![po(1, quantity, price)],
            vec![gr(1, quantity)],
            vec![inv(1, quantity, price)],
        );
        assert!(matches!(
            evaluate(&req, DEFAULT),
            Err(AppError::InvalidRequest(_))
        ));

        // Each line fits, the document total does not
        let half = i64::MAX / 2 + 1;
        let req = request(
            vec![po(1, 1, half), po(2, 1, half)],
            vec![],
            vec![inv(1, 0, half)],
        );
        assert!(matches!(
            evaluate(&req, DEFAULT),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn variance_rounds_up_and_handles_zero_reference() {
        assert_eq!(variance_bp(1_000, 1_000), 0);
        assert_eq!(variance_bp(3, 4), 3_334);
        assert_eq!(variance_bp(0, 5), 10_000);
        assert_eq!(variance_bp(1_000_000, 1_000_001), 1);
    }

    #[test]
    fn severity_ladder() {
        assert_eq!(severity(200, 200, true), Severity::Info);
        assert_eq!(severity(300, 200, true), Severity::Medium);
        assert_eq!(severity(401, 200, true), Severity::High);
        assert_eq!(severity(9_000, 200, false), Severity::Low);
        assert_eq!(severity(500, 0, true), Severity::Medium);
        assert_eq!(severity(501, 0, true), Severity::High);
    }
}
