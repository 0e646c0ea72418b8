//! Per-symbol order sequencer.
//!
//! Allocates the strictly increasing sequence numbers used for
//! tie-breaking under equal price. The read-modify-write runs inside
//! the same write transaction that inserts the order; Turso write
//! transactions serialize writers, so two concurrent submits can never
//! observe the same counter value. Gaps appear when a transaction
//! aborts after allocation; only monotonicity is relied upon.
//!
//! The `sequence_counters` table doubles as the closed symbol registry.

use turso::Value;

use crate::domain::shared::Symbol;
use crate::store::db::{StoreError, Tx};
use crate::store::Store;

/// Allocator for per-symbol sequence numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequencer;

impl Sequencer {
    /// Create the sequencer handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Allocate the next sequence number for `symbol`.
    pub async fn next(&self, tx: &Tx, symbol: &Symbol) -> Result<i64, StoreError> {
        let mut rows = tx
            .query(
                "SELECT next_sequence_number FROM sequence_counters WHERE symbol = ?",
                vec![Value::Text(symbol.as_str().to_string())],
            )
            .await?;
        let row = rows
            .next()
            .await
            .map_err(StoreError::from)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "SequenceCounter",
                id: symbol.as_str().to_string(),
            })?;
        let current = row
            .get::<i64>(0)
            .map_err(|e| StoreError::MissingField(format!("next_sequence_number: {e}")))?;

        tx.execute(
            "UPDATE sequence_counters SET next_sequence_number = ? WHERE symbol = ?",
            vec![
                Value::Integer(current + 1),
                Value::Text(symbol.as_str().to_string()),
            ],
        )
        .await?;
        Ok(current)
    }

    /// Provision a symbol into the registry (idempotent).
    pub async fn ensure_symbol(&self, store: &Store, symbol: &Symbol) -> Result<(), StoreError> {
        let tx = store.begin().await?;
        tx.execute(
            "INSERT OR IGNORE INTO sequence_counters (symbol, next_sequence_number)
             VALUES (?, 1)",
            vec![Value::Text(symbol.as_str().to_string())],
        )
        .await?;
        tx.commit().await
    }

    /// The closed symbol registry.
    pub async fn symbols(&self, store: &Store) -> Result<Vec<Symbol>, StoreError> {
        let conn = store.read_conn()?;
        let mut rows = conn
            .query(
                "SELECT symbol FROM sequence_counters ORDER BY symbol",
                Vec::<Value>::new(),
            )
            .await
            .map_err(StoreError::from)?;
        let mut symbols = Vec::new();
        while let Some(row) = rows.next().await.map_err(StoreError::from)? {
            let text = row
                .get::<String>(0)
                .map_err(|e| StoreError::MissingField(format!("symbol: {e}")))?;
            symbols.push(Symbol::new(text));
        }
        Ok(symbols)
    }
}
