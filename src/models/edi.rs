//! Stored EDI documents and API request types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::services::edi::{UsageIndicator, WarehouseDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdiDirection {
    Inbound,
    Outbound,
}

impl EdiDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdiDirection::Inbound => "inbound",
            EdiDirection::Outbound => "outbound",
        }
    }
}

/// Row from `edi_documents`: one transaction set, received or sent.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct EdiDocumentRecord {
    pub id: Uuid,
    #[serde(skip)]
    pub api_key_id: Uuid,
    pub direction: String,
    pub transaction_set: String,
    pub reference: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub interchange_control_number: String,
    pub document: Json<WarehouseDocument>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/v1/edi/outbound`.
///
/// ```json
/// {
///   "receiver_id": "3PLWAREHOUSE",
///   "document": {
///     "transaction_set": "940",
///     "reference": "SO-1001",
///     "lines": [{"quantity": 12, "uom": "EA", "sku": "SKU-1"}]
///   }
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct OutboundEdiRequest {
    pub receiver_id: String,
    pub document: WarehouseDocument,
    #[serde(default)]
    pub usage: UsageIndicator,
}

#[derive(Debug, Serialize)]
pub struct OutboundEdiResponse {
    pub document: EdiDocumentRecord,
    pub x12: String,
}

#[derive(Debug, Serialize)]
pub struct InboundEdiResponse {
    pub documents: Vec<EdiDocumentRecord>,
    /// 997 acknowledging the received interchange
    pub acknowledgement: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EdiDocumentFilter {
    pub direction: Option<EdiDirection>,
    pub transaction_set: Option<String>,
}
