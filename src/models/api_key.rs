//! API key model for tenant authentication.
//!
//! Each API key identifies one business (tenant). Keys are stored only as
//! SHA-256 hashes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Row of the `api_keys` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,

    /// SHA-256 hash of the raw key (64 hex characters)
    pub key_hash: String,

    /// Business that owns every record created with this key
    pub business_name: String,

    pub created_at: DateTime<Utc>,

    /// Inactive keys are rejected, which revokes access without deleting data.
    pub is_active: bool,
}
