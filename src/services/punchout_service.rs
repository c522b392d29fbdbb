//! PunchOut sessions, carts and the cXML/OCI documents returned to buyers.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::event::{DomainEvent, EventType},
    models::customer::validate_email,
    models::punchout::{
        AddCartItemRequest, CartItem, CheckoutFormat, CheckoutResponse, MAX_CART_QUANTITY,
        PunchOutOperation, PunchOutSession, SessionStatus, SessionWithCart, SetupSessionRequest,
        SetupSessionResponse, cart_total_cents,
    },
    services::catalog_service,
    services::event_bus::EventBus,
};

const CXML_DOCTYPE: &str =
    r#"<!DOCTYPE cXML SYSTEM "http://xml.cxml.org/schemas/cXML/1.2.014/cXML.dtd">"#;

/// Why a session cannot take the requested change.
#[derive(Debug, PartialEq, Eq)]
enum Blocked {
    Expired,
    Closed(String),
    ReadOnly,
}

impl From<Blocked> for AppError {
    fn from(blocked: Blocked) -> Self {
        match blocked {
            Blocked::Expired => AppError::Conflict("PunchOut session has expired".to_string()),
            Blocked::Closed(status) => {
                AppError::Conflict(format!("PunchOut session is {}", status))
            }
            Blocked::ReadOnly => {
                AppError::Conflict("Inspect sessions are read-only".to_string())
            }
        }
    }
}

fn check_session(
    session: &PunchOutSession,
    now: DateTime<Utc>,
    modifying_cart: bool,
) -> Result<(), Blocked> {
    if session.status != SessionStatus::Active.as_str() {
        return Err(Blocked::Closed(session.status.clone()));
    }
    if session.expires_at <= now {
        return Err(Blocked::Expired);
    }
    if modifying_cart && session.operation == PunchOutOperation::Inspect.as_str() {
        return Err(Blocked::ReadOnly);
    }
    Ok(())
}

fn validate_setup(request: &SetupSessionRequest) -> Result<(), AppError> {
    if request.buyer_cookie.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "buyer_cookie must not be blank".to_string(),
        ));
    }
    validate_email(request.user_email.trim())?;
    let url = url::Url::parse(&request.return_url)
        .map_err(|_| AppError::InvalidRequest("return_url is not a valid URL".to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidRequest(
            "return_url must use HTTP or HTTPS".to_string(),
        ));
    }
    Ok(())
}

fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Open a session for a buyer.
pub async fn setup_session(
    pool: &DbPool,
    config: &Config,
    api_key_id: Uuid,
    request: SetupSessionRequest,
) -> Result<SetupSessionResponse, AppError> {
    validate_setup(&request)?;

    let expires_at = Utc::now() + Duration::minutes(config.punchout_session_ttl_minutes);
    let session = sqlx::query_as::<_, PunchOutSession>(
        r#"
        INSERT INTO punchout_sessions (
            api_key_id, buyer_cookie, user_email, return_url, operation, status, token, expires_at
        )
        VALUES ($1, $2, $3, $4, $5, 'active', $6, $7)
        RETURNING *
        "#,
    )
    .bind(api_key_id)
    .bind(request.buyer_cookie.trim())
    .bind(request.user_email.trim())
    .bind(&request.return_url)
    .bind(request.operation.as_str())
    .bind(generate_token())
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    let start_url = format!(
        "{}/punchout/{}",
        config.punchout_base_url.trim_end_matches('/'),
        session.token
    );
    let cxml = setup_response_cxml(&session, &start_url, Utc::now());

    tracing::info!(
        session_id = %session.id,
        operation = %session.operation,
        "PunchOut session created"
    );

    Ok(SetupSessionResponse {
        session,
        start_url,
        cxml,
    })
}

/// Add a catalog item to the cart; adding an item again raises its quantity.
///
/// # Errors
///
/// - `Conflict`: session expired (it is marked `expired`), submitted,
///   read-only, or the item's currency differs from the cart
/// - `NotFound`: session or catalog item
pub async fn add_cart_item(
    pool: &DbPool,
    api_key_id: Uuid,
    session_id: Uuid,
    request: AddCartItemRequest,
) -> Result<SessionWithCart, AppError> {
    if !(1..=MAX_CART_QUANTITY).contains(&request.quantity) {
        return Err(AppError::InvalidRequest(format!(
            "quantity must be between 1 and {}",
            MAX_CART_QUANTITY
        )));
    }

    let mut tx = pool.begin().await?;
    let session = lock_session(&mut tx, api_key_id, session_id).await?;

    if let Err(blocked) = check_session(&session, Utc::now(), true) {
        if blocked == Blocked::Expired {
            mark_expired(&mut tx, session_id).await?;
            tx.commit().await?;
        }
        return Err(blocked.into());
    }

    let item = catalog_service::fetch_item(&mut tx, api_key_id, request.catalog_item_id).await?;
    if !item.is_active {
        return Err(AppError::InvalidRequest(format!(
            "Catalog item {} is no longer offered",
            item.id
        )));
    }

    let cart = load_cart(&mut tx, session_id).await?;
    if let Some(existing) = cart.first() {
        if existing.currency != item.currency {
            return Err(AppError::Conflict(format!(
                "Cart is in {}, item is priced in {}",
                existing.currency, item.currency
            )));
        }
    }

    let stored = sqlx::query(
        r#"
        INSERT INTO punchout_cart_items (
            session_id, catalog_item_id, supplier_part_id, description,
            quantity, unit_price_cents, currency, uom
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (session_id, catalog_item_id)
        DO UPDATE SET quantity = punchout_cart_items.quantity + EXCLUDED.quantity
        WHERE punchout_cart_items.quantity <= $9 - EXCLUDED.quantity
        "#,
    )
    .bind(session_id)
    .bind(item.id)
    .bind(&item.supplier_part_id)
    .bind(&item.description)
    .bind(request.quantity)
    .bind(item.unit_price_cents)
    .bind(&item.currency)
    .bind(&item.uom)
    .bind(MAX_CART_QUANTITY)
    .execute(&mut *tx)
    .await?;

    if stored.rows_affected() == 0 {
        return Err(AppError::InvalidRequest(format!(
            "A cart holds at most {} of one item",
            MAX_CART_QUANTITY
        )));
    }

    let items = load_cart(&mut tx, session_id).await?;
    let cart = with_cart(session, items)?;
    tx.commit().await?;

    Ok(cart)
}

pub async fn get_session(
    pool: &DbPool,
    api_key_id: Uuid,
    session_id: Uuid,
) -> Result<SessionWithCart, AppError> {
    let session = sqlx::query_as::<_, PunchOutSession>(
        "SELECT * FROM punchout_sessions WHERE id = $1 AND api_key_id = $2",
    )
    .bind(session_id)
    .bind(api_key_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("punchout_session"))?;

    let mut conn = pool.acquire().await?;
    let items = load_cart(&mut conn, session.id).await?;
    with_cart(session, items)
}

/// Resolve the start URL token of a live session.
pub async fn get_session_by_token(
    pool: &DbPool,
    token: &str,
) -> Result<SessionWithCart, AppError> {
    let session = sqlx::query_as::<_, PunchOutSession>(
        "SELECT * FROM punchout_sessions WHERE token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("punchout_session"))?;

    check_session(&session, Utc::now(), false)?;

    let mut conn = pool.acquire().await?;
    let items = load_cart(&mut conn, session.id).await?;
    with_cart(session, items)
}

/// Close the session and hand its cart back in the buyer's format.
pub async fn checkout(
    pool: &DbPool,
    events: &EventBus,
    api_key_id: Uuid,
    session_id: Uuid,
    format: CheckoutFormat,
) -> Result<CheckoutResponse, AppError> {
    let mut tx = pool.begin().await?;
    let session = lock_session(&mut tx, api_key_id, session_id).await?;

    if let Err(blocked) = check_session(&session, Utc::now(), false) {
        if blocked == Blocked::Expired {
            mark_expired(&mut tx, session_id).await?;
            tx.commit().await?;
        }
        return Err(blocked.into());
    }

    let items = load_cart(&mut tx, session_id).await?;
    if items.is_empty() {
        return Err(AppError::InvalidRequest("Cart is empty".to_string()));
    }
    let total_cents = cart_total_cents(&items)?;

    let (cxml, oci_fields) = match format {
        CheckoutFormat::Cxml => (
            Some(order_message_cxml(&session, &items, total_cents, Utc::now())),
            None,
        ),
        CheckoutFormat::Oci => (None, Some(oci_fields(&items))),
    };

    sqlx::query(
        "UPDATE punchout_sessions SET status = 'submitted', submitted_at = NOW() WHERE id = $1",
    )
    .bind(session_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        session_id = %session.id,
        items = items.len(),
        total_cents,
        "PunchOut order submitted"
    );
    events.publish(DomainEvent::new(
        api_key_id,
        EventType::PunchOutOrderSubmitted,
        serde_json::json!({
            "session_id": session.id,
            "buyer_cookie": session.buyer_cookie,
            "format": format,
            "total_cents": total_cents,
            "items": items,
        }),
    ));

    Ok(CheckoutResponse {
        session_id: session.id,
        format,
        return_url: session.return_url,
        total_cents,
        cxml,
        oci_fields,
    })
}

async fn lock_session(
    conn: &mut PgConnection,
    api_key_id: Uuid,
    session_id: Uuid,
) -> Result<PunchOutSession, AppError> {
    sqlx::query_as::<_, PunchOutSession>(
        "SELECT * FROM punchout_sessions WHERE id = $1 AND api_key_id = $2 FOR UPDATE",
    )
    .bind(session_id)
    .bind(api_key_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("punchout_session"))
}

async fn mark_expired(conn: &mut PgConnection, session_id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE punchout_sessions SET status = 'expired' WHERE id = $1")
        .bind(session_id)
        .execute(&mut *conn)
        .await?;
    tracing::info!(session_id = %session_id, "PunchOut session expired");
    Ok(())
}

async fn load_cart(conn: &mut PgConnection, session_id: Uuid) -> Result<Vec<CartItem>, AppError> {
    let items = sqlx::query_as::<_, CartItem>(
        r#"
        SELECT id, session_id, catalog_item_id, supplier_part_id, description,
               quantity, unit_price_cents, currency, uom
        FROM punchout_cart_items
        WHERE session_id = $1
        ORDER BY created_at, id
        "#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

fn with_cart(session: PunchOutSession, items: Vec<CartItem>) -> Result<SessionWithCart, AppError> {
    let total_cents = cart_total_cents(&items)?;
    Ok(SessionWithCart {
        session,
        items,
        total_cents,
    })
}

/// Escape text for use in XML content and attribute values.
fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Cents as a decimal amount, e.g. `-1205` → `-12.05`.
fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

fn cxml_open(payload_id: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}\n<cXML payloadID=\"{}\" timestamp=\"{}\" xml:lang=\"en-US\">\n",
        CXML_DOCTYPE,
        xml_escape(payload_id),
        timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
    )
}

fn setup_response_cxml(session: &PunchOutSession, start_url: &str, now: DateTime<Utc>) -> String {
    let mut xml = cxml_open(&format!("{}.setup@erp-services", session.id), now);
    xml.push_str("  <Response>\n");
    xml.push_str("    <Status code=\"200\" text=\"success\"/>\n");
    xml.push_str("    <PunchOutSetupResponse>\n");
    xml.push_str(&format!(
        "      <StartPage><URL>{}</URL></StartPage>\n",
        xml_escape(start_url)
    ));
    xml.push_str("    </PunchOutSetupResponse>\n");
    xml.push_str("  </Response>\n");
    xml.push_str("</cXML>\n");
    xml
}

fn order_message_cxml(
    session: &PunchOutSession,
    items: &[CartItem],
    total_cents: i64,
    now: DateTime<Utc>,
) -> String {
    let currency = items.first().map(|i| i.currency.as_str()).unwrap_or("USD");
    let operation = if session.operation == PunchOutOperation::Inspect.as_str() {
        "inspect"
    } else {
        "edit"
    };

    let mut xml = cxml_open(&format!("{}.order@erp-services", session.id), now);
    xml.push_str("  <Message>\n");
    xml.push_str("    <PunchOutOrderMessage>\n");
    xml.push_str(&format!(
        "      <BuyerCookie>{}</BuyerCookie>\n",
        xml_escape(&session.buyer_cookie)
    ));
    xml.push_str(&format!(
        "      <PunchOutOrderMessageHeader operationAllowed=\"{}\">\n",
        operation
    ));
    xml.push_str(&format!(
        "        <Total><Money currency=\"{}\">{}</Money></Total>\n",
        xml_escape(currency),
        format_money(total_cents)
    ));
    xml.push_str("      </PunchOutOrderMessageHeader>\n");

    for item in items {
        xml.push_str(&format!("      <ItemIn quantity=\"{}\">\n", item.quantity));
        xml.push_str(&format!(
            "        <ItemID><SupplierPartID>{}</SupplierPartID></ItemID>\n",
            xml_escape(&item.supplier_part_id)
        ));
        xml.push_str("        <ItemDetail>\n");
        xml.push_str(&format!(
            "          <UnitPrice><Money currency=\"{}\">{}</Money></UnitPrice>\n",
            xml_escape(&item.currency),
            format_money(item.unit_price_cents)
        ));
        xml.push_str(&format!(
            "          <Description xml:lang=\"en\">{}</Description>\n",
            xml_escape(&item.description)
        ));
        xml.push_str(&format!(
            "          <UnitOfMeasure>{}</UnitOfMeasure>\n",
            xml_escape(&item.uom)
        ));
        xml.push_str("        </ItemDetail>\n");
        xml.push_str("      </ItemIn>\n");
    }

    xml.push_str("    </PunchOutOrderMessage>\n");
    xml.push_str("  </Message>\n");
    xml.push_str("</cXML>\n");
    xml
}

/// SAP OCI form fields, indexed from 1.
fn oci_fields(items: &[CartItem]) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for (index, item) in items.iter().enumerate() {
        let n = index + 1;
        fields.insert(format!("NEW_ITEM-DESCRIPTION[{n}]"), item.description.clone());
        fields.insert(format!("NEW_ITEM-QUANTITY[{n}]"), item.quantity.to_string());
        fields.insert(
            format!("NEW_ITEM-PRICE[{n}]"),
            format_money(item.unit_price_cents),
        );
        fields.insert(format!("NEW_ITEM-UNIT[{n}]"), item.uom.clone());
        fields.insert(format!("NEW_ITEM-CURRENCY[{n}]"), item.currency.clone());
        fields.insert(
            format!("NEW_ITEM-VENDORMAT[{n}]"),
            item.supplier_part_id.clone(),
        );
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{ACME, CATALOG_ITEM, GLOBEX, STALE_SESSION};
    use sqlx::{Pool, Postgres};

    fn session(operation: PunchOutOperation) -> PunchOutSession {
        PunchOutSession {
            id: Uuid::nil(),
            api_key_id: Uuid::nil(),
            buyer_cookie: "cookie<1>".into(),
            user_email: "buyer@acme.example".into(),
            return_url: "https://procurement.acme.example/return".into(),
            operation: operation.as_str().into(),
            status: "active".into(),
            token: "t".into(),
            expires_at: Utc::now() + Duration::minutes(30),
            created_at: Utc::now(),
            submitted_at: None,
        }
    }

    fn item(part: &str, quantity: i32, price: i64) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            session_id: Uuid::nil(),
            catalog_item_id: Uuid::new_v4(),
            supplier_part_id: part.into(),
            description: format!("{part} & co"),
            quantity,
            unit_price_cents: price,
            currency: "EUR".into(),
            uom: "EA".into(),
        }
    }

    #[test]
    fn active_session_accepts_changes() {
        assert_eq!(
            check_session(&session(PunchOutOperation::Create), Utc::now(), true),
            Ok(())
        );
    }

    #[test]
    fn expired_session_is_blocked() {
        let s = session(PunchOutOperation::Create);
        let later = s.expires_at + Duration::seconds(1);
        assert_eq!(check_session(&s, later, true), Err(Blocked::Expired));
    }

    #[test]
    fn inspect_session_is_read_only() {
        let s = session(PunchOutOperation::Inspect);
        assert_eq!(check_session(&s, Utc::now(), true), Err(Blocked::ReadOnly));
        assert_eq!(check_session(&s, Utc::now(), false), Ok(()));
    }

    #[test]
    fn submitted_session_is_closed() {
        let mut s = session(PunchOutOperation::Edit);
        s.status = "submitted".into();
        assert_eq!(
            check_session(&s, Utc::now(), false),
            Err(Blocked::Closed("submitted".into()))
        );
    }

    #[test]
    fn order_message_is_escaped_and_totalled() {
        let items = vec![item("P-1", 2, 1450), item("P-2", 1, 99)];
        let total = cart_total_cents(&items).unwrap();
        let xml =
            order_message_cxml(&session(PunchOutOperation::Create), &items, total, Utc::now());

        assert!(xml.contains("<BuyerCookie>cookie&lt;1&gt;</BuyerCookie>"));
        assert!(xml.contains("<Total><Money currency=\"EUR\">29.99</Money></Total>"));
        assert!(xml.contains("<ItemIn quantity=\"2\">"));
        assert!(xml.contains("<Description xml:lang=\"en\">P-1 &amp; co</Description>"));
        assert!(xml.contains("<UnitPrice><Money currency=\"EUR\">0.99</Money></UnitPrice>"));
        assert_eq!(xml.matches("<ItemIn ").count(), 2);
    }

    #[test]
    fn setup_response_carries_start_url() {
        let xml = setup_response_cxml(
            &session(PunchOutOperation::Create),
            "https://erp.example/punchout/abc?x=1&y=2",
            Utc::now(),
        );
        assert!(xml.contains("<Status code=\"200\" text=\"success\"/>"));
        assert!(xml.contains("<URL>https://erp.example/punchout/abc?x=1&amp;y=2</URL>"));
    }

    #[test]
    fn oci_fields_are_one_based() {
        let fields = oci_fields(&[item("P-1", 3, 1000)]);
        assert_eq!(fields["NEW_ITEM-QUANTITY[1]"], "3");
        assert_eq!(fields["NEW_ITEM-PRICE[1]"], "10.00");
        assert_eq!(fields["NEW_ITEM-VENDORMAT[1]"], "P-1");
        assert_eq!(fields["NEW_ITEM-CURRENCY[1]"], "EUR");
        assert_eq!(fields.len(), 6);
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(0), "0.00");
        assert_eq!(format_money(5), "0.05");
        assert_eq!(format_money(-1205), "-12.05");
    }

    #[test]
    fn setup_validation() {
        let request = SetupSessionRequest {
            buyer_cookie: "c".into(),
            user_email: "buyer@acme.example".into(),
            return_url: "ftp://acme.example".into(),
            operation: PunchOutOperation::Create,
        };
        assert!(validate_setup(&request).is_err());

        let request = SetupSessionRequest {
            return_url: "https://acme.example/return".into(),
            ..request
        };
        assert!(validate_setup(&request).is_ok());

        for email in ["buyer@", "@acme.example", "a@b@c", "no-at-sign"] {
            let request = SetupSessionRequest {
                user_email: email.into(),
                buyer_cookie: "c".into(),
                return_url: "https://acme.example/return".into(),
                operation: PunchOutOperation::Create,
            };
            assert!(validate_setup(&request).is_err(), "{email} should be rejected");
        }
    }

    #[test]
    fn tokens_are_random_hex() {
        let a = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_token());
    }

    fn add(quantity: i32) -> AddCartItemRequest {
        AddCartItemRequest {
            catalog_item_id: CATALOG_ITEM,
            quantity,
        }
    }

    #[sqlx::test(
        migrator = "crate::db::MIGRATOR",
        fixtures(path = "../../fixtures", scripts("tenants", "punchout"))
    )]
    async fn stale_session_is_marked_expired(pool: Pool<Postgres>) -> anyhow::Result<()> {
        assert!(matches!(
            add_cart_item(&pool, ACME, STALE_SESSION, add(1)).await,
            Err(AppError::Conflict(_))
        ));

        let stored = get_session(&pool, ACME, STALE_SESSION).await?;
        assert_eq!(stored.session.status, "expired");
        assert!(stored.items.is_empty());

        assert!(matches!(
            add_cart_item(&pool, GLOBEX, STALE_SESSION, add(1)).await,
            Err(AppError::NotFound("punchout_session"))
        ));

        Ok(())
    }

    #[sqlx::test(
        migrator = "crate::db::MIGRATOR",
        fixtures(path = "../../fixtures", scripts("tenants", "punchout"))
    )]
    async fn repeated_adds_stop_at_the_quantity_cap(pool: Pool<Postgres>) -> anyhow::Result<()> {
        sqlx::query("UPDATE punchout_sessions SET expires_at = NOW() + INTERVAL '30 minutes'")
            .execute(&pool)
            .await?;

        add_cart_item(&pool, ACME, STALE_SESSION, add(MAX_CART_QUANTITY - 1)).await?;
        let cart = add_cart_item(&pool, ACME, STALE_SESSION, add(1)).await?;
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, MAX_CART_QUANTITY);
        assert_eq!(cart.total_cents, MAX_CART_QUANTITY as i64 * 1250);

        assert!(matches!(
            add_cart_item(&pool, ACME, STALE_SESSION, add(1)).await,
            Err(AppError::InvalidRequest(_))
        ));

        let stored = get_session(&pool, ACME, STALE_SESSION).await?;
        assert_eq!(stored.items[0].quantity, MAX_CART_QUANTITY);

        Ok(())
    }
}
