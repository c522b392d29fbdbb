//! Database connection pool and migration management.
//!
//! This module provides utilities for:
//! - Creating and managing a PostgreSQL connection pool
//! - Running database migrations automatically

use sqlx::{Pool, Postgres};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Create a new PostgreSQL connection pool.
///
/// # Arguments
///
/// * `database_url` - PostgreSQL connection string
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
///
/// Returns an error if:
/// - Database connection string is invalid
/// - Cannot connect to PostgreSQL server
/// - Database authentication fails
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Migrations embedded at compile time from the `migrations/` directory.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Run database migrations from the `migrations/` directory.
///
/// Migrations are tracked in the `_sqlx_migrations` table, so each migration runs only once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Returns true when the error is a PostgreSQL unique constraint violation.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Ids seeded by the SQL scripts under `fixtures/`.
#[cfg(test)]
pub mod fixtures {
    use uuid::Uuid;

    pub const ACME: Uuid = Uuid::from_u128(0x11111111_1111_1111_1111_111111111111);
    pub const GLOBEX: Uuid = Uuid::from_u128(0x22222222_2222_2222_2222_222222222222);

    pub const CUSTOMER: Uuid = Uuid::from_u128(0xc0000000_0000_0000_0000_000000000001);

    pub const BANK: Uuid = Uuid::from_u128(0xa0000000_0000_0000_0000_000000000001);
    pub const RECEIVABLES: Uuid = Uuid::from_u128(0xa0000000_0000_0000_0000_000000000002);
    pub const SALES: Uuid = Uuid::from_u128(0xa0000000_0000_0000_0000_000000000003);

    pub const OPEN_INVOICE: Uuid = Uuid::from_u128(0xe0000000_0000_0000_0000_000000000001);

    pub const CATALOG_ITEM: Uuid = Uuid::from_u128(0xb0000000_0000_0000_0000_000000000001);
    pub const STALE_SESSION: Uuid = Uuid::from_u128(0xd0000000_0000_0000_0000_000000000001);

    pub const RUNNING_JOB: Uuid = Uuid::from_u128(0x90000000_0000_0000_0000_000000000001);
}
