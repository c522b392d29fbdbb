//! Receivables service - AR invoices and customer payments.
//!
//! Status changes are guarded by [`InvoiceStatus::transition_to`] under a
//! row lock, so two concurrent payments cannot both settle the same balance.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::event::{DomainEvent, EventType},
    models::invoice::{
        ArInvoice, ArInvoiceLine, ArPayment, CreateInvoiceRequest, InvoiceFilter,
        InvoiceResponse, InvoiceStatus, InvoiceTotals, RecordPaymentRequest,
    },
    models::ledger::PostJournalEntryRequest,
    services::{event_bus::EventBus, ledger_service},
};

/// Create a draft invoice with computed totals.
///
/// # Errors
///
/// - `InvalidRequest`: no lines, bad line values, due date before issue date
/// - `NotFound`: customer does not exist for this business
/// - `Conflict`: customer is not active, or invoice number already used
pub async fn create_invoice(
    pool: &DbPool,
    api_key_id: Uuid,
    request: CreateInvoiceRequest,
) -> Result<InvoiceResponse, AppError> {
    if request.invoice_number.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "invoice_number must not be blank".to_string(),
        ));
    }
    if request.due_date < request.issue_date {
        return Err(AppError::InvalidRequest(
            "due_date must not be before issue_date".to_string(),
        ));
    }
    let currency = ledger_service::normalize_currency(&request.currency)?;
    let totals = InvoiceTotals::compute(&request.lines)?;

    let mut tx = pool.begin().await?;

    let customer_status: String = sqlx::query_scalar(
        "SELECT status FROM customers WHERE id = $1 AND api_key_id = $2",
    )
    .bind(request.customer_id)
    .bind(api_key_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("customer"))?;

    if customer_status != "active" {
        tx.rollback().await?;
        return Err(AppError::Conflict(format!(
            "Customer is {} and cannot be invoiced",
            customer_status
        )));
    }

    let invoice = sqlx::query_as::<_, ArInvoice>(
        r#"
        INSERT INTO ar_invoices (
            api_key_id, customer_id, invoice_number, status, currency,
            issue_date, due_date, subtotal_cents, tax_cents, total_cents
        )
        VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(api_key_id)
    .bind(request.customer_id)
    .bind(request.invoice_number.trim())
    .bind(currency)
    .bind(request.issue_date)
    .bind(request.due_date)
    .bind(totals.subtotal_cents)
    .bind(totals.tax_cents)
    .bind(totals.total_cents)
    .fetch_one(&mut *tx)
    .await?;

    let mut lines = Vec::with_capacity(request.lines.len());
    for (index, (line, amounts)) in request.lines.iter().zip(&totals.lines).enumerate() {
        let row = sqlx::query_as::<_, ArInvoiceLine>(
            r#"
            INSERT INTO ar_invoice_lines (
                invoice_id, line_number, description, quantity,
                unit_price_cents, tax_rate_bp, line_total_cents
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(invoice.id)
        .bind(index as i32 + 1)
        .bind(line.description.trim())
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.tax_rate_bp)
        .bind(amounts.total_cents)
        .fetch_one(&mut *tx)
        .await?;
        lines.push(row);
    }

    tx.commit().await?;

    tracing::info!(
        invoice_id = %invoice.id,
        total_cents = invoice.total_cents,
        "Invoice drafted"
    );

    Ok(InvoiceResponse::new(invoice, lines))
}

pub async fn list_invoices(
    pool: &DbPool,
    api_key_id: Uuid,
    filter: InvoiceFilter,
) -> Result<Vec<ArInvoice>, AppError> {
    let invoices = sqlx::query_as::<_, ArInvoice>(
        r#"
        SELECT * FROM ar_invoices
        WHERE api_key_id = $1
          AND ($2::TEXT IS NULL OR status = $2)
          AND ($3::UUID IS NULL OR customer_id = $3)
        ORDER BY issue_date DESC, created_at DESC
        "#,
    )
    .bind(api_key_id)
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.customer_id)
    .fetch_all(pool)
    .await?;

    Ok(invoices)
}

pub async fn get_invoice(
    pool: &DbPool,
    api_key_id: Uuid,
    invoice_id: Uuid,
) -> Result<InvoiceResponse, AppError> {
    let invoice = sqlx::query_as::<_, ArInvoice>(
        "SELECT * FROM ar_invoices WHERE id = $1 AND api_key_id = $2",
    )
    .bind(invoice_id)
    .bind(api_key_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("invoice"))?;

    let lines = sqlx::query_as::<_, ArInvoiceLine>(
        "SELECT * FROM ar_invoice_lines WHERE invoice_id = $1 ORDER BY line_number",
    )
    .bind(invoice_id)
    .fetch_all(pool)
    .await?;

    Ok(InvoiceResponse::new(invoice, lines))
}

/// Move a draft invoice to `open`.
pub async fn issue_invoice(
    pool: &DbPool,
    events: &EventBus,
    api_key_id: Uuid,
    invoice_id: Uuid,
) -> Result<ArInvoice, AppError> {
    let invoice = change_status(pool, api_key_id, invoice_id, InvoiceStatus::Open).await?;

    events.publish(DomainEvent::new(api_key_id, EventType::InvoiceIssued, &invoice));
    Ok(invoice)
}

/// Cancel a draft or open invoice that has received no payments.
pub async fn cancel_invoice(
    pool: &DbPool,
    events: &EventBus,
    api_key_id: Uuid,
    invoice_id: Uuid,
) -> Result<ArInvoice, AppError> {
    let invoice = change_status(pool, api_key_id, invoice_id, InvoiceStatus::Cancelled).await?;

    events.publish(DomainEvent::new(
        api_key_id,
        EventType::InvoiceCancelled,
        &invoice,
    ));
    Ok(invoice)
}

async fn change_status(
    pool: &DbPool,
    api_key_id: Uuid,
    invoice_id: Uuid,
    next: InvoiceStatus,
) -> Result<ArInvoice, AppError> {
    let mut tx = pool.begin().await?;

    let current = lock_invoice(&mut tx, api_key_id, invoice_id).await?;
    let status = current.status()?;

    if let Err(e) = status.transition_to(next) {
        tx.rollback().await?;
        return Err(e);
    }

    if next == InvoiceStatus::Cancelled && current.paid_cents > 0 {
        tx.rollback().await?;
        return Err(AppError::InvalidStateTransition {
            from: status.as_str().to_string(),
            to: next.as_str().to_string(),
        });
    }

    let invoice = sqlx::query_as::<_, ArInvoice>(
        "UPDATE ar_invoices SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(next.as_str())
    .bind(invoice_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        invoice_id = %invoice_id,
        from = status.as_str(),
        to = next.as_str(),
        "Invoice status changed"
    );

    Ok(invoice)
}

/// Record a customer payment and post it to the ledger.
///
/// # Process
///
/// 1. Lock the invoice, check it is open or partially paid
/// 2. Reject amounts above the outstanding balance
/// 3. Post debit cash / credit receivables in the same transaction
/// 4. Record the payment and advance the status
///
/// Replaying an `idempotency_key` returns the invoice without a second posting.
pub async fn record_payment(
    pool: &DbPool,
    events: &EventBus,
    api_key_id: Uuid,
    invoice_id: Uuid,
    request: RecordPaymentRequest,
) -> Result<ArInvoice, AppError> {
    if request.amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    let current = lock_invoice(&mut tx, api_key_id, invoice_id).await?;

    if let Some(key) = &request.idempotency_key {
        let replayed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM ar_payments p
                JOIN journal_entries j ON j.id = p.journal_entry_id
                WHERE p.invoice_id = $1 AND j.idempotency_key = $2
            )
            "#,
        )
        .bind(invoice_id)
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;

        if replayed {
            tx.rollback().await?;
            return Ok(current);
        }
    }

    let next = match payment_status(&current, request.amount_cents) {
        Ok(next) => next,
        Err(e) => {
            tx.rollback().await?;
            return Err(e);
        }
    };

    let entry = ledger_service::post_in_transaction(
        &mut tx,
        api_key_id,
        &PostJournalEntryRequest {
            debit_account_id: request.cash_account_id,
            credit_account_id: request.receivable_account_id,
            amount_cents: request.amount_cents,
            description: Some(format!("Payment for invoice {}", current.invoice_number)),
            reference: Some(current.invoice_number.clone()),
            idempotency_key: request.idempotency_key.clone(),
        },
    )
    .await?;

    if entry.currency != current.currency {
        tx.rollback().await?;
        return Err(AppError::InvalidRequest(format!(
            "Invoice is in {} but the accounts are in {}",
            current.currency, entry.currency
        )));
    }

    let payment = sqlx::query_as::<_, ArPayment>(
        r#"
        INSERT INTO ar_payments (invoice_id, amount_cents, journal_entry_id)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(invoice_id)
    .bind(request.amount_cents)
    .bind(entry.id)
    .fetch_one(&mut *tx)
    .await?;

    let invoice = sqlx::query_as::<_, ArInvoice>(
        r#"
        UPDATE ar_invoices
        SET paid_cents = paid_cents + $1,
            status = $2,
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(request.amount_cents)
    .bind(next.as_str())
    .bind(invoice_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        invoice_id = %invoice_id,
        payment_id = %payment.id,
        amount_cents = payment.amount_cents,
        "Payment recorded"
    );

    events.publish(DomainEvent::new(
        api_key_id,
        EventType::InvoicePaymentRecorded,
        &payment,
    ));
    events.publish(DomainEvent::new(api_key_id, EventType::JournalPosted, &entry));
    if next == InvoiceStatus::Paid {
        events.publish(DomainEvent::new(api_key_id, EventType::InvoicePaid, &invoice));
    }

    Ok(invoice)
}

pub async fn list_payments(
    pool: &DbPool,
    api_key_id: Uuid,
    invoice_id: Uuid,
) -> Result<Vec<ArPayment>, AppError> {
    let payments = sqlx::query_as::<_, ArPayment>(
        r#"
        SELECT p.* FROM ar_payments p
        JOIN ar_invoices i ON i.id = p.invoice_id
        WHERE p.invoice_id = $1 AND i.api_key_id = $2
        ORDER BY p.received_at
        "#,
    )
    .bind(invoice_id)
    .bind(api_key_id)
    .fetch_all(pool)
    .await?;

    Ok(payments)
}

async fn lock_invoice(
    conn: &mut sqlx::PgConnection,
    api_key_id: Uuid,
    invoice_id: Uuid,
) -> Result<ArInvoice, AppError> {
    sqlx::query_as::<_, ArInvoice>(
        "SELECT * FROM ar_invoices WHERE id = $1 AND api_key_id = $2 FOR UPDATE",
    )
    .bind(invoice_id)
    .bind(api_key_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("invoice"))
}

/// Status the invoice reaches after a payment of `amount_cents`.
///
/// Only open and partially paid invoices take payments; the status is
/// checked before the amount so a settled invoice reports the lifecycle
/// error rather than an overpayment.
fn payment_status(invoice: &ArInvoice, amount_cents: i64) -> Result<InvoiceStatus, AppError> {
    let status = invoice.status()?;
    if !matches!(status, InvoiceStatus::Open | InvoiceStatus::PartiallyPaid) {
        return status.transition_to(InvoiceStatus::Paid);
    }

    let outstanding = invoice.outstanding_cents();
    if amount_cents > outstanding {
        return Err(AppError::Overpayment);
    }
    let next = if amount_cents == outstanding {
        InvoiceStatus::Paid
    } else {
        InvoiceStatus::PartiallyPaid
    };
    status.transition_to(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{ACME, BANK, GLOBEX, OPEN_INVOICE, RECEIVABLES};
    use chrono::{NaiveDate, Utc};
    use sqlx::{Pool, Postgres};

    fn invoice(total_cents: i64, paid_cents: i64) -> ArInvoice {
        ArInvoice {
            id: Uuid::new_v4(),
            api_key_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            invoice_number: "RE-1".into(),
            status: "open".into(),
            currency: "EUR".into(),
            issue_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            subtotal_cents: total_cents,
            tax_cents: 0,
            total_cents,
            paid_cents,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn full_payment_settles_invoice() {
        assert_eq!(
            payment_status(&invoice(10_000, 4_000), 6_000).unwrap(),
            InvoiceStatus::Paid
        );
    }

    #[test]
    fn partial_payment_leaves_balance() {
        assert_eq!(
            payment_status(&invoice(10_000, 0), 2_500).unwrap(),
            InvoiceStatus::PartiallyPaid
        );
    }

    #[test]
    fn settled_and_unissued_invoices_take_no_payments() {
        let mut paid = invoice(100, 100);
        paid.status = "paid".into();
        assert!(matches!(
            payment_status(&paid, 1),
            Err(AppError::InvalidStateTransition { .. })
        ));

        for status in ["draft", "cancelled"] {
            let mut closed = invoice(100, 0);
            closed.status = status.into();
            assert!(matches!(
                payment_status(&closed, 50),
                Err(AppError::InvalidStateTransition { .. })
            ));
        }
    }

    #[test]
    fn paying_more_than_outstanding_is_rejected() {
        assert!(matches!(
            payment_status(&invoice(10_000, 9_000), 1_001),
            Err(AppError::Overpayment)
        ));
    }

    fn payment(amount_cents: i64, key: &str) -> RecordPaymentRequest {
        RecordPaymentRequest {
            amount_cents,
            cash_account_id: BANK,
            receivable_account_id: RECEIVABLES,
            idempotency_key: Some(key.to_string()),
        }
    }

    #[sqlx::test(
        migrator = "crate::db::MIGRATOR",
        fixtures(path = "../../fixtures", scripts("tenants", "ledger", "invoices"))
    )]
    async fn payments_post_to_ledger_until_paid(pool: Pool<Postgres>) -> anyhow::Result<()> {
        let (events, _receiver) = EventBus::new(16);

        let partial =
            record_payment(&pool, &events, ACME, OPEN_INVOICE, payment(4_000, "pay-1")).await?;
        assert_eq!(partial.status, "partially_paid");
        assert_eq!(partial.paid_cents, 4_000);

        let replay =
            record_payment(&pool, &events, ACME, OPEN_INVOICE, payment(4_000, "pay-1")).await?;
        assert_eq!(replay.paid_cents, 4_000);

        let paid =
            record_payment(&pool, &events, ACME, OPEN_INVOICE, payment(6_000, "pay-2")).await?;
        assert_eq!(paid.status, "paid");
        assert_eq!(paid.paid_cents, 10_000);

        let payments = list_payments(&pool, ACME, OPEN_INVOICE).await?;
        assert_eq!(payments.len(), 2);
        let entry =
            ledger_service::get_journal_entry(&pool, ACME, payments[1].journal_entry_id).await?;
        assert_eq!(entry.reference.as_deref(), Some("RE-2025-0001"));

        let bank = ledger_service::get_account(&pool, ACME, BANK).await?;
        let receivables = ledger_service::get_account(&pool, ACME, RECEIVABLES).await?;
        assert_eq!(bank.balance_cents, 10_000);
        assert_eq!(receivables.balance_cents, -10_000);

        assert!(matches!(
            record_payment(&pool, &events, ACME, OPEN_INVOICE, payment(1, "pay-3")).await,
            Err(AppError::InvalidStateTransition { .. })
        ));

        Ok(())
    }

    #[sqlx::test(
        migrator = "crate::db::MIGRATOR",
        fixtures(path = "../../fixtures", scripts("tenants", "ledger", "invoices"))
    )]
    async fn rejected_payment_leaves_no_trace(pool: Pool<Postgres>) -> anyhow::Result<()> {
        let (events, _receiver) = EventBus::new(16);

        assert!(matches!(
            record_payment(&pool, &events, ACME, OPEN_INVOICE, payment(10_001, "too-much")).await,
            Err(AppError::Overpayment)
        ));
        assert!(matches!(
            record_payment(&pool, &events, GLOBEX, OPEN_INVOICE, payment(100, "foreign")).await,
            Err(AppError::NotFound("invoice"))
        ));
        assert!(matches!(
            get_invoice(&pool, GLOBEX, OPEN_INVOICE).await,
            Err(AppError::NotFound(_))
        ));

        let invoice = get_invoice(&pool, ACME, OPEN_INVOICE).await?;
        assert_eq!(invoice.outstanding_cents, 10_000);
        assert!(list_payments(&pool, ACME, OPEN_INVOICE).await?.is_empty());
        assert_eq!(
            ledger_service::get_account(&pool, ACME, BANK).await?.balance_cents,
            0
        );

        Ok(())
    }
}
