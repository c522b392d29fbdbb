//! General ledger models: accounts (Finanzkonten) and journal entries.
//!
//! # Balance Storage
//!
//! Balances are stored as `i64` cents, debit-positive: a debit posting adds
//! the amount, a credit posting subtracts it. The API additionally reports
//! the natural balance, which flips the sign for credit-normal account types
//! (liability, equity, revenue) so that a loan or sales account reads positive.
//!
//! For example, after posting 100.00 from Revenue to Cash:
//! - Cash (asset) stores 10000, natural 10000
//! - Revenue stores -10000, natural 10000

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger account record from the `ledger_accounts` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct LedgerAccount {
    pub id: Uuid,

    /// Owning business; every query filters on it.
    pub api_key_id: Uuid,

    /// Chart-of-accounts number, unique per business (e.g. "1200")
    pub account_number: String,

    pub name: String,

    /// One of `asset`, `liability`, `equity`, `revenue`, `expense`
    pub account_type: String,

    /// Currency code (ISO 4217, 3 letters)
    pub currency: String,

    /// Debits minus credits, in cents
    pub balance_cents: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Revenue,
        AccountType::Expense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// Liabilities, equity and revenue grow on the credit side.
    pub fn is_credit_normal(&self) -> bool {
        matches!(
            self,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue
        )
    }

    /// Convert a stored debit-positive balance to the account's natural sign.
    pub fn natural_balance(&self, debit_positive_cents: i64) -> i64 {
        if self.is_credit_normal() {
            -debit_positive_cents
        } else {
            debit_positive_cents
        }
    }
}

/// Request body for creating a ledger account.
///
/// ```json
/// {
///   "account_number": "1200",
///   "name": "Forderungen aus Lieferungen und Leistungen",
///   "account_type": "asset",
///   "currency": "EUR"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateLedgerAccountRequest {
    pub account_number: String,
    pub name: String,
    pub account_type: AccountType,

    /// Currency code (defaults to "USD" if not provided)
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Response body for account endpoints.
#[derive(Debug, Serialize)]
pub struct LedgerAccountResponse {
    pub id: Uuid,
    pub account_number: String,
    pub name: String,
    pub account_type: String,
    pub currency: String,
    pub balance_cents: i64,
    pub natural_balance_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LedgerAccount> for LedgerAccountResponse {
    fn from(account: LedgerAccount) -> Self {
        let natural_balance_cents = AccountType::parse(&account.account_type)
            .map(|t| t.natural_balance(account.balance_cents))
            .unwrap_or(account.balance_cents);
        Self {
            id: account.id,
            account_number: account.account_number,
            name: account.name,
            account_type: account.account_type,
            currency: account.currency,
            balance_cents: account.balance_cents,
            natural_balance_cents,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// A double-entry posting from the `journal_entries` table.
///
/// Each entry debits one account and credits another by the same amount,
/// so the sum of all stored balances of a business is always zero.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct JournalEntry {
    pub id: Uuid,
    #[serde(skip)]
    pub api_key_id: Uuid,

    /// Replaying a request with the same key returns this entry unchanged.
    #[serde(skip)]
    pub idempotency_key: Option<String>,

    pub debit_account_id: Uuid,
    pub credit_account_id: Uuid,

    /// Always positive (CHECK constraint)
    pub amount_cents: i64,

    pub currency: String,
    pub description: Option<String>,

    /// External document this posting belongs to (invoice number, etc.)
    pub reference: Option<String>,

    pub posted_at: DateTime<Utc>,
}

/// Request to post a journal entry.
///
/// ```json
/// {
///   "debit_account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "credit_account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount_cents": 25000,
///   "description": "Office supplies",
///   "idempotency_key": "je-2025-0042"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PostJournalEntryRequest {
    pub debit_account_id: Uuid,
    pub credit_account_id: Uuid,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JournalFilter {
    pub account_id: Option<Uuid>,
}

/// Sum of stored balances per account type.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TrialBalanceLine {
    pub account_type: String,
    pub balance_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct TrialBalance {
    pub lines: Vec<TrialBalanceLine>,
    pub total_cents: i64,
    /// True when debits equal credits across all accounts.
    pub balanced: bool,
}

impl TrialBalance {
    pub fn from_lines(lines: Vec<TrialBalanceLine>) -> Self {
        let total_cents = lines.iter().map(|l| l.balance_cents).sum();
        Self {
            lines,
            total_cents,
            balanced: total_cents == 0,
        }
    }
}
