//! Market-data outbox.
//!
//! Append-only queue of events emitted transactionally with the state
//! changes they describe. A separate publisher (outside the core)
//! drains rows and stamps `published_at`; the core never emits an
//! event out-of-band.

use tracing::debug;
use turso::Value;

use crate::domain::exchange::MarketEvent;
use crate::domain::shared::{EventId, Symbol, Timestamp};
use crate::store::db::{StoreError, Tx};
use crate::store::Store;

/// A stored outbox row, as the publisher reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxRow {
    /// Event ID.
    pub event_id: EventId,
    /// Symbol the event concerns.
    pub symbol: Symbol,
    /// Stable event-type token.
    pub event_type: String,
    /// JSON payload.
    pub payload: String,
}

/// Repository for outbox events.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutboxStore;

impl OutboxStore {
    /// Create the store handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Append an event with `published_at = NULL`.
    pub async fn append(&self, tx: &Tx, event: &MarketEvent) -> Result<EventId, StoreError> {
        let event_id = EventId::generate();
        let payload = event.payload_json()?;
        tx.execute(
            "INSERT INTO market_data_outbox
                (event_id, symbol, event_type, payload, created_at, published_at)
             VALUES (?, ?, ?, ?, ?, NULL)",
            vec![
                Value::Text(event_id.as_str().to_string()),
                Value::Text(event.symbol.as_str().to_string()),
                Value::Text(event.event_type().to_string()),
                Value::Text(payload),
                Value::Text(Timestamp::now().to_rfc3339_micros()),
            ],
        )
        .await?;
        debug!(event_id = %event_id, event_type = event.event_type(), "Outbox event appended");
        Ok(event_id)
    }

    /// Rows not yet stamped by the publisher, in append order.
    ///
    /// The publisher itself lives outside the core; this is its read
    /// contract, and what diagnostics and tests assert against.
    pub async fn unpublished(&self, store: &Store) -> Result<Vec<OutboxRow>, StoreError> {
        let conn = store.read_conn()?;
        let mut rows = conn
            .query(
                "SELECT event_id, symbol, event_type, payload FROM market_data_outbox
                 WHERE published_at IS NULL
                 ORDER BY created_at ASC, rowid ASC",
                Vec::<Value>::new(),
            )
            .await
            .map_err(StoreError::from)?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await.map_err(StoreError::from)? {
            events.push(OutboxRow {
                event_id: EventId::new(
                    row.get::<String>(0)
                        .map_err(|e| StoreError::MissingField(format!("event_id: {e}")))?,
                ),
                symbol: Symbol::new(
                    row.get::<String>(1)
                        .map_err(|e| StoreError::MissingField(format!("symbol: {e}")))?,
                ),
                event_type: row
                    .get::<String>(2)
                    .map_err(|e| StoreError::MissingField(format!("event_type: {e}")))?,
                payload: row
                    .get::<String>(3)
                    .map_err(|e| StoreError::MissingField(format!("payload: {e}")))?,
            });
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exchange::CancelCause;
    use crate::domain::shared::{OrderId, Symbol};
    use crate::store::Store;

    #[tokio::test]
    async fn append_writes_unpublished_row() {
        let store = Store::open_in_memory().await.unwrap();
        let outbox = OutboxStore::new();

        let tx = store.begin().await.unwrap();
        let event = MarketEvent::order_cancelled(
            Symbol::new("@X"),
            OrderId::new("o1"),
            CancelCause::Requested,
        );
        let event_id = outbox.append(&tx, &event).await.unwrap();
        tx.commit().await.unwrap();

        let conn = store.read_conn().unwrap();
        let mut rows = conn
            .query(
                "SELECT symbol, event_type, payload, published_at FROM market_data_outbox
                 WHERE event_id = ?",
                vec![Value::Text(event_id.as_str().to_string())],
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap(), "@X");
        assert_eq!(row.get::<String>(1).unwrap(), "ORDER_CANCELLED");
        let payload: serde_json::Value =
            serde_json::from_str(&row.get::<String>(2).unwrap()).unwrap();
        assert_eq!(payload["order_id"], "o1");
        // published_at must start NULL; the publisher stamps it later.
        assert!(row.get::<String>(3).is_err());
    }

    #[tokio::test]
    async fn append_rolls_back_with_the_transaction() {
        let store = Store::open_in_memory().await.unwrap();
        let outbox = OutboxStore::new();

        let tx = store.begin().await.unwrap();
        let event = MarketEvent::order_expired(Symbol::new("@X"), OrderId::new("o1"));
        outbox.append(&tx, &event).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(outbox.unpublished(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unpublished_preserves_append_order() {
        let store = Store::open_in_memory().await.unwrap();
        let outbox = OutboxStore::new();

        let tx = store.begin().await.unwrap();
        outbox
            .append(
                &tx,
                &MarketEvent::order_expired(Symbol::new("@X"), OrderId::new("o1")),
            )
            .await
            .unwrap();
        outbox
            .append(
                &tx,
                &MarketEvent::order_cancelled(
                    Symbol::new("@X"),
                    OrderId::new("o2"),
                    CancelCause::Requested,
                ),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let rows = outbox.unpublished(&store).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].event_type, "ORDER_EXPIRED");
        assert_eq!(rows[1].event_type, "ORDER_CANCELLED");
    }
}
