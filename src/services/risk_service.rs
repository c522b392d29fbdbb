//! Supplier risk scoring and assessment history.
//!
//! The score runs from 0 (no concern) to 100 (do not engage). Each factor
//! contributes a capped number of points; recognised security certifications
//! earn a credit. A sanctioned jurisdiction short-circuits to critical.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::event::{DomainEvent, EventType},
    models::risk::{
        CountryRisk, DataAccess, RiskAssessment, RiskAssessmentRequest, RiskComponents, RiskScore,
        RiskTier,
    },
    services::event_bus::EventBus,
};

const SECURITY_CERTIFICATIONS: [&str; 2] = ["ISO27001", "SOC2"];
const CERTIFICATION_CREDIT: i32 = 5;

pub fn tier_for(score: i32) -> RiskTier {
    match score {
        s if s < 25 => RiskTier::Low,
        s if s < 50 => RiskTier::Medium,
        s if s < 75 => RiskTier::High,
        _ => RiskTier::Critical,
    }
}

/// Normalise "ISO 27001", "iso-27001" and "ISO27001" to one spelling.
fn normalize_certification(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn validate(request: &RiskAssessmentRequest) -> Result<(), AppError> {
    if request.supplier_ref.trim().is_empty() || request.supplier_name.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "supplier_ref and supplier_name are required".to_string(),
        ));
    }
    if !(0..=100).contains(&request.financial_health_score) {
        return Err(AppError::InvalidRequest(
            "financial_health_score must be between 0 and 100".to_string(),
        ));
    }
    if request.years_in_business < 0 || request.open_incidents < 0 {
        return Err(AppError::InvalidRequest(
            "years_in_business and open_incidents must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Score a supplier.
pub fn score(request: &RiskAssessmentRequest) -> Result<RiskScore, AppError> {
    validate(request)?;

    let mut certifications: Vec<String> = request
        .certifications
        .iter()
        .map(|c| normalize_certification(c))
        .collect();
    certifications.sort();
    certifications.dedup();
    let has_security_cert = certifications
        .iter()
        .any(|c| SECURITY_CERTIFICATIONS.contains(&c.as_str()));

    let components = RiskComponents {
        // 30 % weight on financial weakness, rounded half up
        financial: ((100 - request.financial_health_score) * 30 + 50) / 100,
        country: match request.country_risk {
            CountryRisk::Low => 0,
            CountryRisk::Medium => 10,
            CountryRisk::High | CountryRisk::Sanctioned => 20,
        },
        tenure: match request.years_in_business {
            y if y < 2 => 10,
            y if y < 5 => 5,
            _ => 0,
        },
        incidents: (request.open_incidents.saturating_mul(5)).min(15),
        data_access: match request.data_access {
            DataAccess::None => 0,
            DataAccess::Internal => 5,
            DataAccess::Confidential => 10,
            DataAccess::Restricted => 15,
        },
        single_source: if request.single_source { 10 } else { 0 },
        certification_credit: certifications
            .iter()
            .filter(|c| SECURITY_CERTIFICATIONS.contains(&c.as_str()))
            .count() as i32
            * CERTIFICATION_CREDIT,
    };

    let mut actions = Vec::new();
    if request.country_risk == CountryRisk::Sanctioned {
        actions.push("Do not engage: supplier is in a sanctioned jurisdiction".to_string());
        return Ok(RiskScore {
            score: 100,
            tier: RiskTier::Critical,
            components,
            recommended_actions: actions,
        });
    }

    if components.financial >= 15 {
        actions.push("Request audited financial statements".to_string());
    }
    if request.country_risk == CountryRisk::High {
        actions.push("Perform enhanced due diligence on the supplier's jurisdiction".to_string());
    }
    if components.tenure == 10 {
        actions.push("Obtain at least two customer references".to_string());
    }
    if request.open_incidents > 0 {
        actions.push("Review open incidents with the supplier".to_string());
    }
    if matches!(
        request.data_access,
        DataAccess::Confidential | DataAccess::Restricted
    ) && !has_security_cert
    {
        actions.push(
            "Require ISO 27001 or SOC 2 certification before granting data access".to_string(),
        );
    }
    if request.single_source {
        actions.push("Qualify an alternate supplier".to_string());
    }

    let score = components.total().clamp(0, 100);
    Ok(RiskScore {
        score,
        tier: tier_for(score),
        components,
        recommended_actions: actions,
    })
}

/// Score a supplier and store the assessment.
pub async fn create_assessment(
    pool: &DbPool,
    events: &EventBus,
    api_key_id: Uuid,
    request: RiskAssessmentRequest,
) -> Result<RiskAssessment, AppError> {
    let result = score(&request)?;
    let inputs = serde_json::to_value(&request)
        .map_err(|e| AppError::InvalidRequest(format!("Failed to encode inputs: {}", e)))?;

    let assessment = sqlx::query_as::<_, RiskAssessment>(
        r#"
        INSERT INTO supplier_risk_assessments (
            api_key_id, supplier_ref, supplier_name, score, tier,
            components, recommended_actions, inputs
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(api_key_id)
    .bind(request.supplier_ref.trim())
    .bind(request.supplier_name.trim())
    .bind(result.score)
    .bind(result.tier.as_str())
    .bind(sqlx::types::Json(&result.components))
    .bind(&result.recommended_actions)
    .bind(inputs)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        supplier_ref = %assessment.supplier_ref,
        score = assessment.score,
        tier = %assessment.tier,
        "Supplier risk assessed"
    );
    events.publish(DomainEvent::new(
        api_key_id,
        EventType::RiskAssessed,
        &assessment,
    ));

    Ok(assessment)
}

pub async fn get_assessment(
    pool: &DbPool,
    api_key_id: Uuid,
    assessment_id: Uuid,
) -> Result<RiskAssessment, AppError> {
    sqlx::query_as::<_, RiskAssessment>(
        "SELECT * FROM supplier_risk_assessments WHERE id = $1 AND api_key_id = $2",
    )
    .bind(assessment_id)
    .bind(api_key_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("assessment"))
}

/// Assessment history for one supplier, newest first.
pub async fn list_supplier_assessments(
    pool: &DbPool,
    api_key_id: Uuid,
    supplier_ref: &str,
) -> Result<Vec<RiskAssessment>, AppError> {
    let assessments = sqlx::query_as::<_, RiskAssessment>(
        r#"
        SELECT * FROM supplier_risk_assessments
        WHERE api_key_id = $1 AND supplier_ref = $2
        ORDER BY assessed_at DESC
        "#,
    )
    .bind(api_key_id)
    .bind(supplier_ref)
    .fetch_all(pool)
    .await?;

    Ok(assessments)
}
