//! Database handle, schema bootstrap, and write transactions.
//!
//! Uses Turso (Rust rewrite of `SQLite`) for durable state storage.
//! Turso has no `SELECT ... FOR UPDATE`; `BEGIN IMMEDIATE` takes the
//! write lock up front, serializing writers, which is what the
//! sequencer's read-modify-write relies on. Busy/locked failures are
//! transient and retried by the caller.

use thiserror::Error;
use tracing::info;
use turso::{Builder, Connection, Database, Error as TursoError, Value};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Query error: {0}")]
    Query(String),

    /// The database is busy or locked; safe to retry.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Missing required field in a row.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Persistent state contradicts an invariant.
    #[error("Data integrity error: {0}")]
    Integrity(String),

    /// Row not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type.
        entity: &'static str,
        /// Row identifier.
        id: String,
    },
}

impl StoreError {
    /// Whether retrying the whole transaction may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::Connection(_))
    }
}

impl From<TursoError> for StoreError {
    fn from(err: TursoError) -> Self {
        let text = err.to_string();
        let lowered = text.to_lowercase();
        if lowered.contains("busy") || lowered.contains("locked") {
            StoreError::Busy(text)
        } else {
            StoreError::Connection(text)
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Shared database handle.
///
/// Cheap to share behind an `Arc`; every transaction gets its own
/// connection so engines on different symbols never share one.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open (or create) a local database file and bootstrap the schema.
    pub async fn open(db_path: &str) -> Result<Self, StoreError> {
        let db = Builder::new_local(db_path).build().await?;
        let store = Self { db };
        store.bootstrap_schema().await?;
        Ok(store)
    }

    /// Open an in-memory database (tests).
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:").await
    }

    /// Create the exchange tables if they do not exist.
    async fn bootstrap_schema(&self) -> Result<(), StoreError> {
        let conn = self.db.connect()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trader_accounts (
                trader_id TEXT PRIMARY KEY,
                active INTEGER NOT NULL DEFAULT 1,
                admin INTEGER NOT NULL DEFAULT 0,
                balance_in_cents INTEGER NOT NULL DEFAULT 0,
                reserved_cash_in_cents INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS positions (
                trader_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 0,
                reserved_shares INTEGER NOT NULL DEFAULT 0,
                average_cost_in_cents INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (trader_id, symbol)
            );

            CREATE TABLE IF NOT EXISTS orders (
                order_id TEXT PRIMARY KEY,
                trader_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                order_type TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                filled_quantity INTEGER NOT NULL DEFAULT 0,
                limit_price_in_cents INTEGER,
                tif_seconds INTEGER,
                status TEXT NOT NULL,
                sequence_number INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_orders_symbol_status
             ON orders(symbol, status);

            CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_symbol_sequence
             ON orders(symbol, sequence_number);

            CREATE INDEX IF NOT EXISTS idx_orders_expires_at
             ON orders(expires_at);

            CREATE TABLE IF NOT EXISTS trades (
                trade_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                price_in_cents INTEGER NOT NULL,
                quantity INTEGER NOT NULL,
                buy_order_id TEXT NOT NULL,
                sell_order_id TEXT NOT NULL,
                buyer_id TEXT NOT NULL,
                seller_id TEXT NOT NULL,
                maker_order_id TEXT NOT NULL,
                taker_order_id TEXT NOT NULL,
                executed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_trades_symbol_executed_at
             ON trades(symbol, executed_at);

            CREATE TABLE IF NOT EXISTS ledger_entries (
                entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
                trade_id TEXT,
                trader_id TEXT NOT NULL,
                delta_cash_in_cents INTEGER NOT NULL,
                delta_shares INTEGER NOT NULL,
                symbol TEXT,
                kind TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_entries_trader
             ON ledger_entries(trader_id);

            CREATE INDEX IF NOT EXISTS idx_ledger_entries_trade
             ON ledger_entries(trade_id);

            CREATE TABLE IF NOT EXISTS sequence_counters (
                symbol TEXT PRIMARY KEY,
                next_sequence_number INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS market_data_outbox (
                event_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                published_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_outbox_created_at
             ON market_data_outbox(created_at);",
        )
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        info!("Exchange schema bootstrap complete");
        Ok(())
    }

    /// Open a read connection for queries outside any transaction.
    pub(crate) fn read_conn(&self) -> Result<Connection, StoreError> {
        Ok(self.db.connect()?)
    }

    /// Begin a write transaction on a fresh connection.
    pub async fn begin(&self) -> Result<Tx, StoreError> {
        let conn = self.db.connect()?;
        conn.execute_batch("BEGIN IMMEDIATE").await?;
        Ok(Tx { conn })
    }
}

/// A write transaction.
///
/// Dropping a `Tx` without committing abandons the connection, which
/// rolls the transaction back. Prefer explicit [`Tx::rollback`] so the
/// connection returns cleanly.
pub struct Tx {
    conn: Connection,
}

impl Tx {
    /// Execute a statement inside the transaction.
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64, StoreError> {
        self.conn
            .execute(sql, params)
            .await
            .map_err(StoreError::from)
    }

    /// Run a query inside the transaction.
    pub async fn query(&self, sql: &str, params: Vec<Value>) -> Result<turso::Rows, StoreError> {
        self.conn.query(sql, params).await.map_err(StoreError::from)
    }

    /// Commit the transaction.
    pub async fn commit(self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT").await?;
        Ok(())
    }

    /// Roll the transaction back.
    pub async fn rollback(self) -> Result<(), StoreError> {
        self.conn.execute_batch("ROLLBACK").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_creates_tables() {
        let store = Store::open_in_memory().await.unwrap();
        let conn = store.read_conn().unwrap();

        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_schema WHERE type = 'table' ORDER BY name",
                Vec::<Value>::new(),
            )
            .await
            .unwrap();

        let mut names = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            names.push(row.get::<String>(0).unwrap());
        }
        for expected in [
            "ledger_entries",
            "market_data_outbox",
            "orders",
            "positions",
            "sequence_counters",
            "trader_accounts",
            "trades",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        store.bootstrap_schema().await.unwrap();
    }

    #[tokio::test]
    async fn transaction_commit_persists() {
        let store = Store::open_in_memory().await.unwrap();

        let tx = store.begin().await.unwrap();
        tx.execute(
            "INSERT INTO sequence_counters (symbol, next_sequence_number) VALUES (?, ?)",
            vec![Value::Text("@X".to_string()), Value::Integer(1)],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let conn = store.read_conn().unwrap();
        let mut rows = conn
            .query("SELECT COUNT(*) FROM sequence_counters", Vec::<Value>::new())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn transaction_rollback_discards() {
        let store = Store::open_in_memory().await.unwrap();

        let tx = store.begin().await.unwrap();
        tx.execute(
            "INSERT INTO sequence_counters (symbol, next_sequence_number) VALUES (?, ?)",
            vec![Value::Text("@X".to_string()), Value::Integer(1)],
        )
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        let conn = store.read_conn().unwrap();
        let mut rows = conn
            .query("SELECT COUNT(*) FROM sequence_counters", Vec::<Value>::new())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
    }

    #[test]
    fn busy_errors_are_transient() {
        assert!(StoreError::Busy("database is locked".to_string()).is_transient());
        assert!(StoreError::Connection("reset".to_string()).is_transient());
        assert!(!StoreError::Integrity("bad".to_string()).is_transient());
        assert!(!StoreError::Query("syntax".to_string()).is_transient());
    }
}
