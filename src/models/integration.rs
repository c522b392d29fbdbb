//! External system connections and the sync jobs that run against them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    Edi,
    Punchout,
    Erp,
    Crm,
    Custom,
}

impl IntegrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationKind::Edi => "edi",
            IntegrationKind::Punchout => "punchout",
            IntegrationKind::Erp => "erp",
            IntegrationKind::Crm => "crm",
            IntegrationKind::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Integration {
    pub id: Uuid,
    #[serde(skip)]
    pub api_key_id: Uuid,
    pub name: String,
    pub kind: String,
    pub config: serde_json::Value,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /api/v1/integrations`.
///
/// ```json
/// {"name": "3PL Rotterdam", "kind": "edi", "config": {"source": "sftp://3pl.example/out"}}
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateIntegrationRequest {
    pub name: String,
    pub kind: IntegrationKind,
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,
    #[serde(default = "enabled")]
    pub is_enabled: bool,
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateIntegrationRequest {
    pub is_enabled: Option<bool>,
    pub config: Option<serde_json::Value>,
}

fn validate_config(config: &serde_json::Value) -> Result<(), AppError> {
    if !config.is_object() {
        return Err(AppError::InvalidRequest(
            "config must be a JSON object".to_string(),
        ));
    }
    Ok(())
}

impl CreateIntegrationRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidRequest("name must not be blank".to_string()));
        }
        validate_config(&self.config)
    }
}

impl UpdateIntegrationRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        match &self.config {
            Some(config) => validate_config(config),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEntity {
    Customers,
    Invoices,
    CatalogItems,
    LedgerAccounts,
}

impl SyncEntity {
    pub const ALL: [SyncEntity; 4] = [
        SyncEntity::Customers,
        SyncEntity::Invoices,
        SyncEntity::CatalogItems,
        SyncEntity::LedgerAccounts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEntity::Customers => "customers",
            SyncEntity::Invoices => "invoices",
            SyncEntity::CatalogItems => "catalog_items",
            SyncEntity::LedgerAccounts => "ledger_accounts",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == value)
    }

    /// Table holding the tenant's rows of this entity.
    pub fn table(&self) -> &'static str {
        match self {
            SyncEntity::Customers => "customers",
            SyncEntity::Invoices => "ar_invoices",
            SyncEntity::CatalogItems => "catalog_items",
            SyncEntity::LedgerAccounts => "ledger_accounts",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Import,
    Export,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Import => "import",
            SyncDirection::Export => "export",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "import" => Some(SyncDirection::Import),
            "export" => Some(SyncDirection::Export),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncJobStatus {
    pub const ALL: [SyncJobStatus; 5] = [
        SyncJobStatus::Pending,
        SyncJobStatus::Running,
        SyncJobStatus::Completed,
        SyncJobStatus::Failed,
        SyncJobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncJobStatus::Pending => "pending",
            SyncJobStatus::Running => "running",
            SyncJobStatus::Completed => "completed",
            SyncJobStatus::Failed => "failed",
            SyncJobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    pub fn can_transition_to(&self, next: SyncJobStatus) -> bool {
        use SyncJobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    pub fn transition_to(&self, next: SyncJobStatus) -> Result<SyncJobStatus, AppError> {
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

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SyncJob {
    pub id: Uuid,
    #[serde(skip)]
    pub api_key_id: Uuid,
    pub integration_id: Uuid,
    pub entity: String,
    pub direction: String,
    pub status: String,
    pub records_processed: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncJob {
    pub fn status(&self) -> Result<SyncJobStatus, AppError> {
        SyncJobStatus::parse(&self.status).ok_or_else(|| {
            AppError::InvalidRequest(format!("Unknown sync job status '{}'", self.status))
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSyncJobRequest {
    pub integration_id: Uuid,
    pub entity: SyncEntity,
    pub direction: SyncDirection,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncJobFilter {
    pub integration_id: Option<Uuid>,
    pub status: Option<SyncJobStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_job_lifecycle() {
        use SyncJobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Cancelled.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Pending));
    }

    #[test]
    fn refused_transition_names_both_states() {
        let err = SyncJobStatus::Completed
            .transition_to(SyncJobStatus::Cancelled)
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot move from completed to cancelled");
    }

    #[test]
    fn entities_round_trip_through_text() {
        for entity in SyncEntity::ALL {
            assert_eq!(SyncEntity::parse(entity.as_str()), Some(entity));
        }
        assert_eq!(SyncEntity::Invoices.table(), "ar_invoices");
    }

    #[test]
    fn integration_config_must_be_an_object() {
        let request: CreateIntegrationRequest = serde_json::from_value(serde_json::json!({
            "name": "3PL",
            "kind": "edi",
            "config": ["not", "an", "object"]
        }))
        .unwrap();
        assert!(request.validate().is_err());

        let request: CreateIntegrationRequest =
            serde_json::from_value(serde_json::json!({"name": "CRM", "kind": "crm"})).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.is_enabled);
    }
}
