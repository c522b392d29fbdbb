//! Guided buying policy for purchase requisitions.
//!
//! Decides the approval tier from the requisition total and points buyers
//! back to the catalog and to preferred suppliers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

const AUTO_APPROVAL_LIMIT_CENTS: i64 = 100_000;
const MANAGER_LIMIT_CENTS: i64 = 1_000_000;
const DIRECTOR_LIMIT_CENTS: i64 = 10_000_000;

#[derive(Debug, Clone, Deserialize)]
pub struct RequisitionLine {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Set when the line was picked from the catalog or a PunchOut cart
    pub catalog_item_id: Option<Uuid>,
    pub supplier: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequisitionRequest {
    pub lines: Vec<RequisitionLine>,
    #[serde(default)]
    pub preferred_suppliers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalTier {
    AutoApproved,
    Manager,
    Director,
    Executive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyWarningKind {
    NonCatalogItem,
    NonPreferredSupplier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyWarning {
    /// 1-based position of the line in the request
    pub line: usize,
    pub kind: PolicyWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequisitionEvaluation {
    pub total_cents: i64,
    pub approval_tier: ApprovalTier,
    pub warnings: Vec<PolicyWarning>,
}

pub fn approval_tier(total_cents: i64) -> ApprovalTier {
    match total_cents {
        t if t <= AUTO_APPROVAL_LIMIT_CENTS => ApprovalTier::AutoApproved,
        t if t <= MANAGER_LIMIT_CENTS => ApprovalTier::Manager,
        t if t <= DIRECTOR_LIMIT_CENTS => ApprovalTier::Director,
        _ => ApprovalTier::Executive,
    }
}

pub fn evaluate(request: &RequisitionRequest) -> Result<RequisitionEvaluation, AppError> {
    if request.lines.is_empty() {
        return Err(AppError::InvalidRequest(
            "A requisition needs at least one line".to_string(),
        ));
    }

    let preferred: Vec<String> = request
        .preferred_suppliers
        .iter()
        .map(|s| s.trim().to_lowercase())
        .collect();

    let mut total_cents: i64 = 0;
    let mut warnings = Vec::new();

    for (index, line) in request.lines.iter().enumerate() {
        let position = index + 1;
        if line.description.trim().is_empty() {
            return Err(AppError::InvalidRequest(format!(
                "Line {} has no description",
                position
            )));
        }
        if line.quantity <= 0 || line.unit_price_cents < 0 {
            return Err(AppError::InvalidRequest(format!(
                "Line {} needs a positive quantity and a non-negative price",
                position
            )));
        }

        let amount = line
            .quantity
            .checked_mul(line.unit_price_cents)
            .and_then(|a| total_cents.checked_add(a))
            .ok_or_else(|| AppError::InvalidRequest("Requisition total overflows".to_string()))?;
        total_cents = amount;

        if line.catalog_item_id.is_none() {
            warnings.push(PolicyWarning {
                line: position,
                kind: PolicyWarningKind::NonCatalogItem,
                message: match line.category.as_deref() {
                    Some(category) => format!(
                        "'{}' is a free-text item; check the {} catalog first",
                        line.description.trim(),
                        category
                    ),
                    None => format!(
                        "'{}' is a free-text item; check the catalog first",
                        line.description.trim()
                    ),
                },
            });
        }

        if !preferred.is_empty() {
            let supplier = line.supplier.as_deref().map(|s| s.trim().to_lowercase());
            if !supplier.is_some_and(|s| preferred.contains(&s)) {
                warnings.push(PolicyWarning {
                    line: position,
                    kind: PolicyWarningKind::NonPreferredSupplier,
                    message: format!(
                        "Supplier {} is not a preferred supplier",
                        line.supplier.as_deref().unwrap_or("(none)")
                    ),
                });
            }
        }
    }

    Ok(RequisitionEvaluation {
        total_cents,
        approval_tier: approval_tier(total_cents),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(unit_price_cents: i64, catalog: bool, supplier: Option<&str>) -> RequisitionLine {
        RequisitionLine {
            description: "Safety gloves".into(),
            quantity: 1,
            unit_price_cents,
            catalog_item_id: catalog.then(Uuid::new_v4),
            supplier: supplier.map(String::from),
            category: None,
        }
    }

    #[test]
    fn tiers_follow_total() {
        assert_eq!(approval_tier(100_000), ApprovalTier::AutoApproved);
        assert_eq!(approval_tier(100_001), ApprovalTier::Manager);
        assert_eq!(approval_tier(1_000_000), ApprovalTier::Manager);
        assert_eq!(approval_tier(10_000_000), ApprovalTier::Director);
        assert_eq!(approval_tier(10_000_001), ApprovalTier::Executive);
    }

    #[test]
    fn catalog_lines_from_preferred_suppliers_are_clean() {
        let request = RequisitionRequest {
            lines: vec![line(5_000, true, Some("Würth"))],
            preferred_suppliers: vec!["würth".into()],
        };
        let result = evaluate(&request).unwrap();
        assert!(result.warnings.is_empty());
        assert_eq!(result.approval_tier, ApprovalTier::AutoApproved);
    }

    #[test]
    fn free_text_and_off_list_suppliers_warn() {
        let request = RequisitionRequest {
            lines: vec![line(500_000, false, Some("Random Shop")), line(1, true, None)],
            preferred_suppliers: vec!["Würth".into()],
        };
        let result = evaluate(&request).unwrap();

        let kinds: Vec<_> = result.warnings.iter().map(|w| (w.line, w.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (1, PolicyWarningKind::NonCatalogItem),
                (1, PolicyWarningKind::NonPreferredSupplier),
                (2, PolicyWarningKind::NonPreferredSupplier),
            ]
        );
        assert_eq!(result.total_cents, 500_001);
        assert_eq!(result.approval_tier, ApprovalTier::Manager);
    }

    #[test]
    fn no_preferred_list_means_no_supplier_warnings() {
        let request = RequisitionRequest {
            lines: vec![line(100, true, Some("Anyone"))],
            preferred_suppliers: vec![],
        };
        assert!(evaluate(&request).unwrap().warnings.is_empty());
    }

    #[test]
    fn invalid_lines_are_rejected() {
        let mut bad = line(100, true, None);
        bad.quantity = 0;
        assert!(evaluate(&RequisitionRequest {
            lines: vec![bad],
            preferred_suppliers: vec![]
        })
        .is_err());

        let mut blank = line(100, true, None);
        blank.description = " ".into();
        assert!(evaluate(&RequisitionRequest {
            lines: vec![blank],
            preferred_suppliers: vec![]
        })
        .is_err());

        assert!(evaluate(&RequisitionRequest {
            lines: vec![],
            preferred_suppliers: vec![]
        })
        .is_err());
    }
}
