use log::{debug, trace};
use sqlx::SqliteConnection;

use super::is_unique_violation;
use crate::{
    db_types::{Admission, NewWebhookEvent, WebhookEventRecord},
    traits::WebhookEventError,
};

pub async fn fetch_event(
    event_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WebhookEventRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM webhook_events WHERE event_id = $1").bind(event_id).fetch_optional(conn).await
}

/// Records the first sighting of an event, holding the lease until `claimed_until_ms`.
///
/// Returns `false` if a row for the event id already exists. The primary key on `event_id` makes this the atomic
/// claim: of any number of concurrent callers, exactly one sees `true`.
pub async fn insert_event(
    event: &NewWebhookEvent,
    claimed_until_ms: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, WebhookEventError> {
    let result = sqlx::query(
        r#"
            INSERT INTO webhook_events (event_id, event_type, payload, processed, attempts, claimed_until_ms)
            VALUES ($1, $2, $3, 0, 0, $4);
        "#,
    )
    .bind(&event.event_id)
    .bind(&event.event_type)
    .bind(&event.payload)
    .bind(claimed_until_ms)
    .execute(conn)
    .await;
    match result {
        Ok(_) => {
            debug!("🗃️ Webhook event {} ({}) recorded for the first time", event.event_id, event.event_type);
            Ok(true)
        },
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Claims an unprocessed event whose lease has run out, in a single conditional update.
///
/// If the update matches nothing, the current row tells whether the event is processed or leased by someone else.
pub async fn claim_existing(
    event_id: &str,
    now_ms: i64,
    claimed_until_ms: i64,
    conn: &mut SqliteConnection,
) -> Result<Admission, WebhookEventError> {
    let claimed: Option<WebhookEventRecord> = sqlx::query_as(
        r#"
            UPDATE webhook_events SET
                attempts = attempts + 1,
                claimed_until_ms = $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE event_id = $2 AND processed = 0 AND (claimed_until_ms IS NULL OR claimed_until_ms <= $3)
            RETURNING *;
        "#,
    )
    .bind(claimed_until_ms)
    .bind(event_id)
    .bind(now_ms)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(record) = claimed {
        debug!("🗃️ Webhook event {event_id} claimed for retry. This is attempt {}", record.attempts + 1);
        return Ok(Admission::RetryPending);
    }
    let record = fetch_event(event_id, conn).await?.ok_or_else(|| WebhookEventError::EventNotFound(event_id.into()))?;
    let admission = if record.processed { Admission::AlreadyProcessed } else { Admission::InFlight };
    trace!("🗃️ Webhook event {event_id} was not claimed: {admission:?}");
    Ok(admission)
}

pub async fn mark_processed(event_id: &str, conn: &mut SqliteConnection) -> Result<(), WebhookEventError> {
    let result = sqlx::query(
        r#"
            UPDATE webhook_events SET
                processed = 1,
                processed_at = CURRENT_TIMESTAMP,
                claimed_until_ms = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE event_id = $1;
        "#,
    )
    .bind(event_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(WebhookEventError::EventNotFound(event_id.into()));
    }
    Ok(())
}

pub async fn record_failure(event_id: &str, error: &str, conn: &mut SqliteConnection) -> Result<(), WebhookEventError> {
    let result = sqlx::query(
        r#"
            UPDATE webhook_events SET
                last_error = $1,
                claimed_until_ms = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE event_id = $2 AND processed = 0;
        "#,
    )
    .bind(error)
    .bind(event_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        debug!("🗃️ Webhook event {event_id} is unknown or already processed. The failure was not recorded.");
    }
    Ok(())
}

pub async fn fetch_unprocessed(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<WebhookEventRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM webhook_events WHERE processed = 0 ORDER BY created_at ASC, event_id ASC LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await
}
