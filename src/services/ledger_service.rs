//! Ledger service - chart of accounts and double-entry postings.
//!
//! This service handles:
//! - Atomic balance updates on both sides of a posting
//! - Idempotency checking
//! - Currency and ownership validation
//!
//! # Atomicity Guarantees
//!
//! Both balance updates and the journal row are written in one PostgreSQL
//! transaction. The two account rows are locked in id order so concurrent
//! postings between the same accounts cannot deadlock.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::event::{DomainEvent, EventType},
    models::ledger::{
        CreateLedgerAccountRequest, JournalEntry, JournalFilter, LedgerAccount,
        PostJournalEntryRequest, TrialBalance, TrialBalanceLine,
    },
    services::event_bus::EventBus,
};

const ACCOUNT_COLUMNS: &str =
    "id, api_key_id, account_number, name, account_type, currency, balance_cents, created_at, updated_at";

pub async fn create_account(
    pool: &DbPool,
    api_key_id: Uuid,
    request: CreateLedgerAccountRequest,
) -> Result<LedgerAccount, AppError> {
    if request.account_number.trim().is_empty() || request.name.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "account_number and name are required".to_string(),
        ));
    }
    let currency = normalize_currency(&request.currency)?;

    let account = sqlx::query_as::<_, LedgerAccount>(&format!(
        r#"
        INSERT INTO ledger_accounts (api_key_id, account_number, name, account_type, currency)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {ACCOUNT_COLUMNS}
        "#
    ))
    .bind(api_key_id)
    .bind(request.account_number.trim())
    .bind(request.name.trim())
    .bind(request.account_type.as_str())
    .bind(currency)
    .fetch_one(pool)
    .await?;

    Ok(account)
}

/// List the chart of accounts ordered by account number.
pub async fn list_accounts(
    pool: &DbPool,
    api_key_id: Uuid,
) -> Result<Vec<LedgerAccount>, AppError> {
    let accounts = sqlx::query_as::<_, LedgerAccount>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM ledger_accounts WHERE api_key_id = $1 ORDER BY account_number"
    ))
    .bind(api_key_id)
    .fetch_all(pool)
    .await?;

    Ok(accounts)
}

pub async fn get_account(
    pool: &DbPool,
    api_key_id: Uuid,
    account_id: Uuid,
) -> Result<LedgerAccount, AppError> {
    sqlx::query_as::<_, LedgerAccount>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM ledger_accounts WHERE id = $1 AND api_key_id = $2"
    ))
    .bind(account_id)
    .bind(api_key_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("account"))
}

/// Post a journal entry in its own database transaction.
///
/// # Process
///
/// 1. Validate amount and accounts
/// 2. Return the original entry when the idempotency key was seen before
/// 3. Lock both accounts, check ownership and currency
/// 4. Debit one, credit the other, record the entry
/// 5. Commit (or rollback on error) and publish `journal.posted`
pub async fn post_journal_entry(
    pool: &DbPool,
    events: &EventBus,
    api_key_id: Uuid,
    request: PostJournalEntryRequest,
) -> Result<JournalEntry, AppError> {
    validate_posting(&request)?;

    if let Some(existing) =
        find_by_idempotency_key(pool, api_key_id, request.idempotency_key.as_deref()).await?
    {
        return Ok(existing);
    }

    let mut tx = pool.begin().await?;
    let entry = post_in_transaction(&mut tx, api_key_id, &request).await?;
    tx.commit().await?;

    tracing::info!(
        entry_id = %entry.id,
        amount_cents = entry.amount_cents,
        "Journal entry posted"
    );
    events.publish(DomainEvent::new(api_key_id, EventType::JournalPosted, &entry));

    Ok(entry)
}

/// Post a journal entry on a connection that already holds a transaction.
///
/// The caller owns commit and rollback. Used by the receivables service so
/// that a payment and its posting succeed or fail together.
pub async fn post_in_transaction(
    conn: &mut PgConnection,
    api_key_id: Uuid,
    request: &PostJournalEntryRequest,
) -> Result<JournalEntry, AppError> {
    validate_posting(request)?;

    // Lock both accounts in a stable order
    let mut ids = [request.debit_account_id, request.credit_account_id];
    ids.sort();

    let locked: Vec<(Uuid, String)> = sqlx::query_as(
        "SELECT id, currency FROM ledger_accounts WHERE id = ANY($1) AND api_key_id = $2 ORDER BY id FOR UPDATE",
    )
    .bind(&ids[..])
    .bind(api_key_id)
    .fetch_all(&mut *conn)
    .await?;

    if locked.len() != 2 {
        return Err(AppError::NotFound("account"));
    }

    let currency = locked[0].1.clone();
    if locked[1].1 != currency {
        return Err(AppError::InvalidRequest(format!(
            "Cannot post between {} and {} accounts",
            locked[0].1, locked[1].1
        )));
    }

    sqlx::query(
        "UPDATE ledger_accounts SET balance_cents = balance_cents + $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(request.amount_cents)
    .bind(request.debit_account_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE ledger_accounts SET balance_cents = balance_cents - $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(request.amount_cents)
    .bind(request.credit_account_id)
    .execute(&mut *conn)
    .await?;

    let entry = sqlx::query_as::<_, JournalEntry>(
        r#"
        INSERT INTO journal_entries (
            api_key_id,
            idempotency_key,
            debit_account_id,
            credit_account_id,
            amount_cents,
            currency,
            description,
            reference
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(api_key_id)
    .bind(&request.idempotency_key)
    .bind(request.debit_account_id)
    .bind(request.credit_account_id)
    .bind(request.amount_cents)
    .bind(currency)
    .bind(&request.description)
    .bind(&request.reference)
    .fetch_one(&mut *conn)
    .await?;

    Ok(entry)
}

pub async fn get_journal_entry(
    pool: &DbPool,
    api_key_id: Uuid,
    entry_id: Uuid,
) -> Result<JournalEntry, AppError> {
    sqlx::query_as::<_, JournalEntry>(
        "SELECT * FROM journal_entries WHERE id = $1 AND api_key_id = $2",
    )
    .bind(entry_id)
    .bind(api_key_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("journal_entry"))
}

/// Entries newest first, optionally only those touching one account.
pub async fn list_journal_entries(
    pool: &DbPool,
    api_key_id: Uuid,
    filter: JournalFilter,
) -> Result<Vec<JournalEntry>, AppError> {
    let entries = sqlx::query_as::<_, JournalEntry>(
        r#"
        SELECT * FROM journal_entries
        WHERE api_key_id = $1
          AND ($2::UUID IS NULL OR debit_account_id = $2 OR credit_account_id = $2)
        ORDER BY posted_at DESC
        LIMIT 500
        "#,
    )
    .bind(api_key_id)
    .bind(filter.account_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Sum of stored balances per account type.
pub async fn trial_balance(pool: &DbPool, api_key_id: Uuid) -> Result<TrialBalance, AppError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT account_type, COALESCE(SUM(balance_cents), 0)::BIGINT
        FROM ledger_accounts
        WHERE api_key_id = $1
        GROUP BY account_type
        ORDER BY account_type
        "#,
    )
    .bind(api_key_id)
    .fetch_all(pool)
    .await?;

    let lines = rows
        .into_iter()
        .map(|(account_type, balance_cents)| TrialBalanceLine {
            account_type,
            balance_cents,
        })
        .collect();

    Ok(TrialBalance::from_lines(lines))
}

async fn find_by_idempotency_key(
    pool: &DbPool,
    api_key_id: Uuid,
    idempotency_key: Option<&str>,
) -> Result<Option<JournalEntry>, AppError> {
    let Some(key) = idempotency_key else {
        return Ok(None);
    };

    let existing = sqlx::query_as::<_, JournalEntry>(
        "SELECT * FROM journal_entries WHERE api_key_id = $1 AND idempotency_key = $2",
    )
    .bind(api_key_id)
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(existing)
}

fn validate_posting(request: &PostJournalEntryRequest) -> Result<(), AppError> {
    if request.amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    if request.debit_account_id == request.credit_account_id {
        return Err(AppError::InvalidRequest(
            "Cannot post to the same account on both sides".to_string(),
        ));
    }
    Ok(())
}

/// Uppercase a three-letter ISO 4217 code.
pub fn normalize_currency(code: &str) -> Result<String, AppError> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::InvalidRequest(format!(
            "'{}' is not a three-letter currency code",
            code
        )));
    }
    Ok(code.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{ACME, BANK, GLOBEX, SALES};
    use sqlx::{Pool, Postgres};

    fn posting(amount_cents: i64, same_account: bool) -> PostJournalEntryRequest {
        let debit = Uuid::new_v4();
        PostJournalEntryRequest {
            debit_account_id: debit,
            credit_account_id: if same_account { debit } else { Uuid::new_v4() },
            amount_cents,
            description: None,
            reference: None,
            idempotency_key: None,
        }
    }

    #[test]
    fn positive_amount_between_distinct_accounts_is_valid() {
        assert!(validate_posting(&posting(100, false)).is_ok());
    }

    #[test]
    fn zero_or_negative_amounts_are_rejected() {
        assert!(validate_posting(&posting(0, false)).is_err());
        assert!(validate_posting(&posting(-1, false)).is_err());
    }

    #[test]
    fn same_account_on_both_sides_is_rejected() {
        assert!(validate_posting(&posting(100, true)).is_err());
    }

    #[test]
    fn currency_codes_are_normalized() {
        assert_eq!(normalize_currency("eur").unwrap(), "EUR");
        assert_eq!(normalize_currency(" usd ").unwrap(), "USD");
        assert!(normalize_currency("EURO").is_err());
        assert!(normalize_currency("E1R").is_err());
    }

    fn cash_sale(idempotency_key: Option<&str>) -> PostJournalEntryRequest {
        PostJournalEntryRequest {
            debit_account_id: BANK,
            credit_account_id: SALES,
            amount_cents: 25_000,
            description: Some("Counter sale".into()),
            reference: None,
            idempotency_key: idempotency_key.map(str::to_string),
        }
    }

    #[sqlx::test(
        migrator = "crate::db::MIGRATOR",
        fixtures(path = "../../fixtures", scripts("tenants", "ledger"))
    )]
    async fn replayed_posting_moves_balances_once(pool: Pool<Postgres>) -> anyhow::Result<()> {
        let (events, _receiver) = EventBus::new(8);

        let first = post_journal_entry(&pool, &events, ACME, cash_sale(Some("je-0042"))).await?;
        let replay = post_journal_entry(&pool, &events, ACME, cash_sale(Some("je-0042"))).await?;
        assert_eq!(replay.id, first.id);

        // Debit adds, credit subtracts
        assert_eq!(get_account(&pool, ACME, BANK).await?.balance_cents, 25_000);
        assert_eq!(get_account(&pool, ACME, SALES).await?.balance_cents, -25_000);

        let entries = list_journal_entries(&pool, ACME, JournalFilter::default()).await?;
        assert_eq!(entries.len(), 1);

        let trial = trial_balance(&pool, ACME).await?;
        assert!(trial.balanced);
        assert_eq!(trial.total_cents, 0);

        Ok(())
    }

    #[sqlx::test(
        migrator = "crate::db::MIGRATOR",
        fixtures(path = "../../fixtures", scripts("tenants", "ledger"))
    )]
    async fn other_business_cannot_touch_accounts(pool: Pool<Postgres>) -> anyhow::Result<()> {
        let (events, _receiver) = EventBus::new(8);

        assert!(matches!(
            post_journal_entry(&pool, &events, GLOBEX, cash_sale(None)).await,
            Err(AppError::NotFound("account"))
        ));
        assert!(matches!(
            get_account(&pool, GLOBEX, BANK).await,
            Err(AppError::NotFound(_))
        ));
        assert!(list_accounts(&pool, GLOBEX).await?.is_empty());

        assert_eq!(get_account(&pool, ACME, BANK).await?.balance_cents, 0);

        Ok(())
    }
}
