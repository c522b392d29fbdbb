//! EDI exchange with warehouse partners.
//!
//! Inbound interchanges are parsed, every transaction set is stored and a 997
//! is returned. Outbound documents are rendered with the next interchange
//! control number of the business.

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::edi::{
        EdiDirection, EdiDocumentFilter, EdiDocumentRecord, InboundEdiResponse,
        OutboundEdiRequest, OutboundEdiResponse,
    },
    models::event::{DomainEvent, EventType},
    services::edi::{
        EdiError, EnvelopeParams, UsageIndicator, WarehouseDocument, extract_documents,
        generate_997, parse_interchange,
    },
    services::event_bus::EventBus,
};

/// ISA control numbers are nine digits.
const MAX_CONTROL_NUMBER: i64 = 999_999_999;

/// Parse an inbound interchange, store its documents and acknowledge it.
///
/// # Errors
///
/// - `Edi`: the interchange is malformed or carries an unsupported set
pub async fn receive_interchange(
    pool: &DbPool,
    events: &EventBus,
    api_key_id: Uuid,
    our_id: &str,
    raw: &str,
) -> Result<InboundEdiResponse, AppError> {
    let interchange = parse_interchange(raw)?;
    let documents = extract_documents(&interchange)?;

    let mut tx = pool.begin().await?;

    let mut stored = Vec::with_capacity(documents.len());
    for document in documents {
        let record = insert_document(
            &mut tx,
            api_key_id,
            EdiDirection::Inbound,
            &interchange.sender_id,
            &interchange.receiver_id,
            &interchange.control_number,
            document,
        )
        .await?;
        stored.push(record);
    }

    let control_number = next_control_number(&mut tx, api_key_id).await?;
    let params = EnvelopeParams {
        sender_id: our_id.to_string(),
        receiver_id: interchange.sender_id.clone(),
        interchange_control_number: control_number,
        group_control_number: control_number,
        timestamp: Utc::now().naive_utc(),
        usage: interchange.usage,
    };
    let acknowledgement = generate_997(&interchange, &params)?;

    tx.commit().await?;

    tracing::info!(
        sender_id = %interchange.sender_id,
        control_number = %interchange.control_number,
        documents = stored.len(),
        "EDI interchange received"
    );
    for record in &stored {
        events.publish(DomainEvent::new(api_key_id, EventType::EdiReceived, record));
    }

    Ok(InboundEdiResponse {
        documents: stored,
        acknowledgement,
    })
}

/// Render a document as an interchange addressed to `receiver_id`.
pub async fn send_document(
    pool: &DbPool,
    api_key_id: Uuid,
    our_id: &str,
    request: OutboundEdiRequest,
) -> Result<OutboundEdiResponse, AppError> {
    let receiver_id = request.receiver_id.trim().to_string();
    if receiver_id.is_empty() || receiver_id.len() > 15 {
        return Err(AppError::InvalidRequest(
            "receiver_id must be 1 to 15 characters".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    let control_number = next_control_number(&mut tx, api_key_id).await?;

    let params = EnvelopeParams {
        sender_id: our_id.to_string(),
        receiver_id: receiver_id.clone(),
        interchange_control_number: control_number,
        group_control_number: control_number,
        timestamp: Utc::now().naive_utc(),
        usage: request.usage,
    };
    let mut document = request.document;
    document.normalize();
    let x12 = document.generate(&params).map_err(|e| match e {
        EdiError::InvalidDocument(message) => AppError::InvalidRequest(message),
        other => AppError::Edi(other),
    })?;

    let record = insert_document(
        &mut tx,
        api_key_id,
        EdiDirection::Outbound,
        our_id,
        &receiver_id,
        &format!("{:09}", control_number),
        document,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        document_id = %record.id,
        transaction_set = %record.transaction_set,
        control_number,
        test = params.usage == UsageIndicator::Test,
        "EDI document generated"
    );

    Ok(OutboundEdiResponse {
        document: record,
        x12,
    })
}

pub async fn list_documents(
    pool: &DbPool,
    api_key_id: Uuid,
    filter: EdiDocumentFilter,
) -> Result<Vec<EdiDocumentRecord>, AppError> {
    let documents = sqlx::query_as::<_, EdiDocumentRecord>(
        r#"
        SELECT * FROM edi_documents
        WHERE api_key_id = $1
          AND ($2::TEXT IS NULL OR direction = $2)
          AND ($3::TEXT IS NULL OR transaction_set = $3)
        ORDER BY created_at DESC
        LIMIT 100
        "#,
    )
    .bind(api_key_id)
    .bind(filter.direction.map(|d| d.as_str()))
    .bind(filter.transaction_set)
    .fetch_all(pool)
    .await?;

    Ok(documents)
}

pub async fn get_document(
    pool: &DbPool,
    api_key_id: Uuid,
    document_id: Uuid,
) -> Result<EdiDocumentRecord, AppError> {
    sqlx::query_as::<_, EdiDocumentRecord>(
        "SELECT * FROM edi_documents WHERE id = $1 AND api_key_id = $2",
    )
    .bind(document_id)
    .bind(api_key_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("edi_document"))
}

async fn insert_document(
    conn: &mut PgConnection,
    api_key_id: Uuid,
    direction: EdiDirection,
    sender_id: &str,
    receiver_id: &str,
    control_number: &str,
    document: WarehouseDocument,
) -> Result<EdiDocumentRecord, AppError> {
    let record = sqlx::query_as::<_, EdiDocumentRecord>(
        r#"
        INSERT INTO edi_documents (
            api_key_id, direction, transaction_set, reference,
            sender_id, receiver_id, interchange_control_number, document
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(api_key_id)
    .bind(direction.as_str())
    .bind(document.transaction_set.code())
    .bind(&document.reference)
    .bind(sender_id)
    .bind(receiver_id)
    .bind(control_number)
    .bind(sqlx::types::Json(&document))
    .fetch_one(&mut *conn)
    .await?;

    Ok(record)
}

/// Allocate the next interchange control number of a business.
///
/// The upsert holds the counter row lock until the surrounding transaction
/// ends, so concurrent senders never share a number.
async fn next_control_number(conn: &mut PgConnection, api_key_id: Uuid) -> Result<u32, AppError> {
    let next: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO edi_control_numbers (api_key_id, last_control_number)
        VALUES ($1, 1)
        ON CONFLICT (api_key_id) DO UPDATE
        SET last_control_number = CASE
            WHEN edi_control_numbers.last_control_number >= $2 THEN 1
            ELSE edi_control_numbers.last_control_number + 1
        END
        RETURNING last_control_number
        "#,
    )
    .bind(api_key_id)
    .bind(MAX_CONTROL_NUMBER)
    .fetch_one(&mut *conn)
    .await?;

    u32::try_from(next)
        .map_err(|_| AppError::Conflict(format!("Control number {} out of range", next)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{ACME, GLOBEX};
    use sqlx::{Pool, Postgres};

    #[sqlx::test(
        migrator = "crate::db::MIGRATOR",
        fixtures(path = "../../fixtures", scripts("tenants"))
    )]
    async fn control_numbers_count_per_business_and_wrap(
        pool: Pool<Postgres>,
    ) -> anyhow::Result<()> {
        let mut conn = pool.acquire().await?;

        assert_eq!(next_control_number(&mut conn, ACME).await?, 1);
        assert_eq!(next_control_number(&mut conn, ACME).await?, 2);
        assert_eq!(next_control_number(&mut conn, GLOBEX).await?, 1);

        sqlx::query("UPDATE edi_control_numbers SET last_control_number = $1 WHERE api_key_id = $2")
            .bind(MAX_CONTROL_NUMBER)
            .bind(ACME)
            .execute(&mut *conn)
            .await?;

        assert_eq!(next_control_number(&mut conn, ACME).await?, 1);
        assert_eq!(next_control_number(&mut conn, GLOBEX).await?, 2);

        Ok(())
    }

    #[sqlx::test(
        migrator = "crate::db::MIGRATOR",
        fixtures(path = "../../fixtures", scripts("tenants"))
    )]
    async fn sent_document_is_stored_as_partner_reads_it(
        pool: Pool<Postgres>,
    ) -> anyhow::Result<()> {
        let (events, _receiver) = EventBus::new(8);
        let request: OutboundEdiRequest = serde_json::from_value(serde_json::json!({
            "receiver_id": "3PLWAREHOUSE",
            "usage": "test",
            "document": {
                "transaction_set": "940",
                "reference": " SO-1001 ",
                "secondary_reference": "",
                "date": "2025-03-04",
                "lines": [{"quantity": 12, "uom": "EA", "upc": "  ", "sku": "SKU-1 "}]
            }
        }))?;

        let sent = send_document(&pool, ACME, "ERPSERVICES", request).await?;
        assert_eq!(sent.document.reference, "SO-1001");
        assert_eq!(sent.document.interchange_control_number, "000000001");

        let received =
            receive_interchange(&pool, &events, GLOBEX, "3PLWAREHOUSE", &sent.x12).await?;
        assert_eq!(received.documents.len(), 1);
        assert_eq!(received.documents[0].document.0, sent.document.document.0);

        let acme_docs = list_documents(&pool, ACME, EdiDocumentFilter::default()).await?;
        assert_eq!(acme_docs.len(), 1);
        assert!(matches!(
            get_document(&pool, GLOBEX, sent.document.id).await,
            Err(AppError::NotFound(_))
        ));

        Ok(())
    }
}
