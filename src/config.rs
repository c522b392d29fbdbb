//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DB_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `WEBHOOK_TIMEOUT_SECS` (optional): per-delivery timeout, defaults to 5
/// - `EVENT_BUFFER_SIZE` (optional): event bus capacity, defaults to 256
/// - `MATCH_QUANTITY_TOLERANCE_BP` / `MATCH_PRICE_TOLERANCE_BP` (optional):
///   default three-way match tolerances in basis points (0 and 200)
/// - `PUNCHOUT_BASE_URL` (optional): base for PunchOut start URLs
/// - `PUNCHOUT_SESSION_TTL_MINUTES` (optional): defaults to 30
/// - `EDI_SENDER_ID` (optional): interchange sender id, defaults to `ERPSERVICES`
/// - `CORS_ALLOWED_ORIGINS` (optional): comma-separated browser origins; CORS is off when unset
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,

    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,

    #[serde(default)]
    pub match_quantity_tolerance_bp: i64,

    #[serde(default = "default_price_tolerance")]
    pub match_price_tolerance_bp: i64,

    #[serde(default = "default_punchout_base_url")]
    pub punchout_base_url: String,

    #[serde(default = "default_punchout_ttl")]
    pub punchout_session_ttl_minutes: i64,

    #[serde(default = "default_edi_sender_id")]
    pub edi_sender_id: String,

    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_webhook_timeout() -> u64 {
    5
}

fn default_event_buffer() -> usize {
    256
}

fn default_price_tolerance() -> i64 {
    200
}

fn default_punchout_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_punchout_ttl() -> i64 {
    30
}

fn default_edi_sender_id() -> String {
    "ERPSERVICES".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// Build a configuration from an explicit list of variables.
    ///
    /// Used where the process environment must not leak in.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Config>(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(vars: &[(&str, &str)]) -> Vec<(String, String)> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config =
            Config::from_pairs(pairs(&[("DATABASE_URL", "postgres://localhost/erp")])).unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.webhook_timeout_secs, 5);
        assert_eq!(config.event_buffer_size, 256);
        assert_eq!(config.match_quantity_tolerance_bp, 0);
        assert_eq!(config.match_price_tolerance_bp, 200);
        assert_eq!(config.punchout_session_ttl_minutes, 30);
        assert_eq!(config.edi_sender_id, "ERPSERVICES");
        assert!(config.cors_allowed_origins.is_empty());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        assert!(Config::from_pairs(pairs(&[("SERVER_PORT", "8080")])).is_err());
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        let result = Config::from_pairs(pairs(&[
            ("DATABASE_URL", "postgres://localhost/erp"),
            ("SERVER_PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = Config::from_pairs(pairs(&[
            ("DATABASE_URL", "postgres://localhost/erp"),
            ("SERVER_PORT", "8080"),
            ("MATCH_PRICE_TOLERANCE_BP", "500"),
            ("EDI_SENDER_ID", "ACME"),
        ]))
        .unwrap();

        assert_eq!(config.server_port, 8080);
        assert_eq!(config.match_price_tolerance_bp, 500);
        assert_eq!(config.edi_sender_id, "ACME");
    }

    #[test]
    fn cors_origins_are_comma_separated() {
        let config = Config::from_pairs(pairs(&[
            ("DATABASE_URL", "postgres://localhost/erp"),
            (
                "CORS_ALLOWED_ORIGINS",
                "https://buyer.example.com,https://procure.example.org",
            ),
        ]))
        .unwrap();

        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://buyer.example.com", "https://procure.example.org"]
        );
    }
}
