//! Third-party risk management (TPRM) models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountryRisk {
    Low,
    Medium,
    High,
    Sanctioned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataAccess {
    None,
    Internal,
    Confidential,
    Restricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

/// Body of `POST /api/v1/tprm/assessments`.
///
/// ```json
/// {
///   "supplier_ref": "SUP-0042",
///   "supplier_name": "Nordic Pallets AB",
///   "country_risk": "low",
///   "financial_health_score": 72,
///   "years_in_business": 12,
///   "open_incidents": 0,
///   "certifications": ["ISO9001", "ISO27001"],
///   "data_access": "internal",
///   "single_source": false
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessmentRequest {
    pub supplier_ref: String,
    pub supplier_name: String,
    pub country_risk: CountryRisk,
    /// 0 (failing) ..= 100 (excellent)
    pub financial_health_score: i32,
    pub years_in_business: i32,
    #[serde(default)]
    pub open_incidents: i32,
    #[serde(default)]
    pub certifications: Vec<String>,
    pub data_access: DataAccess,
    #[serde(default)]
    pub single_source: bool,
}

/// Points contributed by each factor; their sum (floored at 0) is the score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskComponents {
    pub financial: i32,
    pub country: i32,
    pub tenure: i32,
    pub incidents: i32,
    pub data_access: i32,
    pub single_source: i32,
    pub certification_credit: i32,
}

impl RiskComponents {
    pub fn total(&self) -> i32 {
        self.financial
            + self.country
            + self.tenure
            + self.incidents
            + self.data_access
            + self.single_source
            - self.certification_credit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskScore {
    pub score: i32,
    pub tier: RiskTier,
    pub components: RiskComponents,
    pub recommended_actions: Vec<String>,
}

/// Stored assessment from `supplier_risk_assessments`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct RiskAssessment {
    pub id: Uuid,
    #[serde(skip)]
    pub api_key_id: Uuid,
    pub supplier_ref: String,
    pub supplier_name: String,
    pub score: i32,
    pub tier: String,
    pub components: sqlx::types::Json<RiskComponents>,
    pub recommended_actions: Vec<String>,
    pub inputs: serde_json::Value,
    pub assessed_at: DateTime<Utc>,
}
