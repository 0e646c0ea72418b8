//! Trade store.
//!
//! Trades are insert-only facts; the only read the core needs is the
//! last execution price per symbol, used to seed snapshots after
//! recovery.

use tracing::debug;
use turso::Value;

use crate::domain::exchange::Trade;
use crate::domain::shared::{Cents, OrderId, Quantity, Symbol, TradeId, TraderId};
use crate::store::db::{StoreError, Tx};
use crate::store::ledger::parse_timestamp;
use crate::store::Store;

/// Repository for executed trades.
#[derive(Debug, Clone, Copy, Default)]
pub struct TradeStore;

impl TradeStore {
    /// Create the store handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Persist an executed trade.
    pub async fn record(&self, tx: &Tx, trade: &Trade) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO trades
                (trade_id, symbol, price_in_cents, quantity, buy_order_id, sell_order_id,
                 buyer_id, seller_id, maker_order_id, taker_order_id, executed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            vec![
                Value::Text(trade.trade_id.as_str().to_string()),
                Value::Text(trade.symbol.as_str().to_string()),
                Value::Integer(trade.price_in_cents.amount()),
                Value::Integer(i64::from(trade.quantity.as_u32())),
                Value::Text(trade.buy_order_id.as_str().to_string()),
                Value::Text(trade.sell_order_id.as_str().to_string()),
                Value::Text(trade.buyer_id.as_str().to_string()),
                Value::Text(trade.seller_id.as_str().to_string()),
                Value::Text(trade.maker_order_id.as_str().to_string()),
                Value::Text(trade.taker_order_id.as_str().to_string()),
                Value::Text(trade.executed_at.to_rfc3339_micros()),
            ],
        )
        .await?;
        debug!(trade_id = %trade.trade_id, symbol = %trade.symbol, "Trade recorded");
        Ok(())
    }

    /// All trades for a symbol in execution order.
    pub async fn for_symbol(
        &self,
        store: &Store,
        symbol: &Symbol,
    ) -> Result<Vec<Trade>, StoreError> {
        let conn = store.read_conn()?;
        let mut rows = conn
            .query(
                "SELECT trade_id, symbol, price_in_cents, quantity, buy_order_id, sell_order_id,
                        buyer_id, seller_id, maker_order_id, taker_order_id, executed_at
                 FROM trades WHERE symbol = ?
                 ORDER BY executed_at ASC, rowid ASC",
                vec![Value::Text(symbol.as_str().to_string())],
            )
            .await
            .map_err(StoreError::from)?;

        let mut trades = Vec::new();
        while let Some(row) = rows.next().await.map_err(StoreError::from)? {
            trades.push(row_to_trade(&row)?);
        }
        Ok(trades)
    }

    /// Most recent execution price for a symbol, if any.
    pub async fn last_price(
        &self,
        store: &Store,
        symbol: &Symbol,
    ) -> Result<Option<Cents>, StoreError> {
        let conn = store.read_conn()?;
        let mut rows = conn
            .query(
                "SELECT price_in_cents FROM trades
                 WHERE symbol = ?
                 ORDER BY executed_at DESC, rowid DESC
                 LIMIT 1",
                vec![Value::Text(symbol.as_str().to_string())],
            )
            .await
            .map_err(StoreError::from)?;
        match rows.next().await.map_err(StoreError::from)? {
            Some(row) => {
                let price = row
                    .get::<i64>(0)
                    .map_err(|e| StoreError::MissingField(format!("price_in_cents: {e}")))?;
                Ok(Some(Cents::new(price)))
            }
            None => Ok(None),
        }
    }
}

fn row_to_trade(row: &turso::Row) -> Result<Trade, StoreError> {
    let field = |idx: usize, name: &str| {
        row.get::<String>(idx)
            .map_err(|e| StoreError::MissingField(format!("{name}: {e}")))
    };
    let price = row
        .get::<i64>(2)
        .map_err(|e| StoreError::MissingField(format!("price_in_cents: {e}")))?;
    let quantity = row
        .get::<i64>(3)
        .map_err(|e| StoreError::MissingField(format!("quantity: {e}")))?;
    let executed_at = parse_timestamp(&field(10, "executed_at")?)?;

    Ok(Trade {
        trade_id: TradeId::new(field(0, "trade_id")?),
        symbol: Symbol::new(field(1, "symbol")?),
        price_in_cents: Cents::new(price),
        quantity: Quantity::new(quantity as u32),
        buy_order_id: OrderId::new(field(4, "buy_order_id")?),
        sell_order_id: OrderId::new(field(5, "sell_order_id")?),
        buyer_id: TraderId::new(field(6, "buyer_id")?),
        seller_id: TraderId::new(field(7, "seller_id")?),
        maker_order_id: OrderId::new(field(8, "maker_order_id")?),
        taker_order_id: OrderId::new(field(9, "taker_order_id")?),
        executed_at,
    })
}
