//! Order store.
//!
//! Orders are inserted PENDING inside the routing transaction and only
//! ever move forward through the status machine; `filled_quantity` may
//! only grow. Recovery and the expiration scheduler read outside any
//! transaction.

use tracing::debug;
use turso::Value;

use crate::domain::exchange::value_objects::{OrderStatus, OrderType, Side};
use crate::domain::exchange::Order;
use crate::domain::shared::{Cents, OrderId, Quantity, Symbol, Timestamp, TraderId};
use crate::store::db::{StoreError, Tx};
use crate::store::ledger::parse_timestamp;
use crate::store::Store;

/// Repository for orders.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderStore;

impl OrderStore {
    /// Create the store handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Persist a freshly accepted order.
    pub async fn insert(&self, tx: &Tx, order: &Order) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO orders
                (order_id, trader_id, symbol, side, order_type, quantity, filled_quantity,
                 limit_price_in_cents, tif_seconds, status, sequence_number, created_at,
                 expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            vec![
                Value::Text(order.id().as_str().to_string()),
                Value::Text(order.trader_id().as_str().to_string()),
                Value::Text(order.symbol().as_str().to_string()),
                Value::Text(order.side().to_string()),
                Value::Text(order.order_type().to_string()),
                Value::Integer(i64::from(order.quantity().as_u32())),
                Value::Integer(i64::from(order.filled_quantity().as_u32())),
                order
                    .limit_price()
                    .map_or(Value::Null, |p| Value::Integer(p.amount())),
                order
                    .tif_seconds()
                    .map_or(Value::Null, |t| Value::Integer(i64::from(t))),
                Value::Text(order.status().to_string()),
                Value::Integer(order.sequence_number()),
                Value::Text(order.created_at().to_rfc3339_micros()),
                order
                    .expires_at()
                    .map_or(Value::Null, |t| Value::Text(t.to_rfc3339_micros())),
            ],
        )
        .await?;
        debug!(order_id = %order.id(), symbol = %order.symbol(), "Order inserted");
        Ok(())
    }

    /// Advance an order's status and filled quantity.
    ///
    /// Enforces the monotonic status machine against the *persisted*
    /// row; a violation is an integrity error, never silently applied.
    pub async fn update_status(
        &self,
        tx: &Tx,
        order_id: &OrderId,
        new_status: OrderStatus,
        filled_quantity: Quantity,
    ) -> Result<(), StoreError> {
        let mut rows = tx
            .query(
                "SELECT status, filled_quantity FROM orders WHERE order_id = ?",
                vec![Value::Text(order_id.as_str().to_string())],
            )
            .await?;
        let row = rows
            .next()
            .await
            .map_err(StoreError::from)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "Order",
                id: order_id.as_str().to_string(),
            })?;

        let current_status = parse_status(
            &row.get::<String>(0)
                .map_err(|e| StoreError::MissingField(format!("status: {e}")))?,
        )?;
        let current_filled = row
            .get::<i64>(1)
            .map_err(|e| StoreError::MissingField(format!("filled_quantity: {e}")))?;

        if !current_status.can_transition_to(new_status) {
            return Err(StoreError::Integrity(format!(
                "Order {order_id}: illegal transition {current_status} -> {new_status}"
            )));
        }
        if i64::from(filled_quantity.as_u32()) < current_filled {
            return Err(StoreError::Integrity(format!(
                "Order {order_id}: filled quantity would shrink from {current_filled} to {filled_quantity}"
            )));
        }

        tx.execute(
            "UPDATE orders SET status = ?, filled_quantity = ? WHERE order_id = ?",
            vec![
                Value::Text(new_status.to_string()),
                Value::Integer(i64::from(filled_quantity.as_u32())),
                Value::Text(order_id.as_str().to_string()),
            ],
        )
        .await?;
        debug!(order_id = %order_id, status = %new_status, filled = %filled_quantity, "Order updated");
        Ok(())
    }

    /// Load an order inside a transaction.
    pub async fn find(&self, tx: &Tx, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut rows = tx
            .query(
                &format!("{SELECT_ORDER} WHERE order_id = ?"),
                vec![Value::Text(order_id.as_str().to_string())],
            )
            .await?;
        match rows.next().await.map_err(StoreError::from)? {
            Some(row) => Ok(Some(row_to_order(&row)?)),
            None => Ok(None),
        }
    }

    /// Load an order outside any transaction (router cancel routing).
    pub async fn find_latest(
        &self,
        store: &Store,
        order_id: &OrderId,
    ) -> Result<Option<Order>, StoreError> {
        let conn = store.read_conn()?;
        let mut rows = conn
            .query(
                &format!("{SELECT_ORDER} WHERE order_id = ?"),
                vec![Value::Text(order_id.as_str().to_string())],
            )
            .await
            .map_err(StoreError::from)?;
        match rows.next().await.map_err(StoreError::from)? {
            Some(row) => Ok(Some(row_to_order(&row)?)),
            None => Ok(None),
        }
    }

    /// Stream one side's open orders for recovery.
    ///
    /// Buys come back best price first (descending), sells ascending;
    /// ties resolve by ascending sequence number.
    pub async fn load_open_orders(
        &self,
        store: &Store,
        symbol: &Symbol,
        side: Side,
    ) -> Result<Vec<Order>, StoreError> {
        let order_clause = match side {
            Side::Buy => "ORDER BY limit_price_in_cents DESC, sequence_number ASC",
            Side::Sell => "ORDER BY limit_price_in_cents ASC, sequence_number ASC",
        };
        let conn = store.read_conn()?;
        let mut rows = conn
            .query(
                &format!(
                    "{SELECT_ORDER}
                     WHERE symbol = ? AND side = ? AND status IN ('OPEN', 'PARTIALLY_FILLED')
                     {order_clause}"
                ),
                vec![
                    Value::Text(symbol.as_str().to_string()),
                    Value::Text(side.to_string()),
                ],
            )
            .await
            .map_err(StoreError::from)?;

        let mut orders = Vec::new();
        while let Some(row) = rows.next().await.map_err(StoreError::from)? {
            orders.push(row_to_order(&row)?);
        }
        Ok(orders)
    }

    /// Resting orders whose time-in-force has elapsed.
    pub async fn expired_orders(
        &self,
        store: &Store,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<(OrderId, Symbol)>, StoreError> {
        let conn = store.read_conn()?;
        let mut rows = conn
            .query(
                "SELECT order_id, symbol FROM orders
                 WHERE status IN ('OPEN', 'PARTIALLY_FILLED')
                   AND expires_at IS NOT NULL AND expires_at <= ?
                 ORDER BY expires_at ASC
                 LIMIT ?",
                vec![
                    Value::Text(now.to_rfc3339_micros()),
                    Value::Integer(i64::from(limit)),
                ],
            )
            .await
            .map_err(StoreError::from)?;

        let mut expired = Vec::new();
        while let Some(row) = rows.next().await.map_err(StoreError::from)? {
            let order_id = row
                .get::<String>(0)
                .map_err(|e| StoreError::MissingField(format!("order_id: {e}")))?;
            let symbol = row
                .get::<String>(1)
                .map_err(|e| StoreError::MissingField(format!("symbol: {e}")))?;
            expired.push((OrderId::new(order_id), Symbol::new(symbol)));
        }
        Ok(expired)
    }
}

const SELECT_ORDER: &str = "SELECT order_id, trader_id, symbol, side, order_type, quantity,
        filled_quantity, limit_price_in_cents, tif_seconds, status, sequence_number,
        created_at, expires_at
 FROM orders";

fn parse_status(text: &str) -> Result<OrderStatus, StoreError> {
    match text {
        "PENDING" => Ok(OrderStatus::Pending),
        "OPEN" => Ok(OrderStatus::Open),
        "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
        "FILLED" => Ok(OrderStatus::Filled),
        "CANCELLED" => Ok(OrderStatus::Cancelled),
        "EXPIRED" => Ok(OrderStatus::Expired),
        "REJECTED" => Ok(OrderStatus::Rejected),
        other => Err(StoreError::Integrity(format!("Unknown order status: {other}"))),
    }
}

fn parse_side(text: &str) -> Result<Side, StoreError> {
    match text {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(StoreError::Integrity(format!("Unknown side: {other}"))),
    }
}

fn parse_order_type(text: &str) -> Result<OrderType, StoreError> {
    match text {
        "MARKET" => Ok(OrderType::Market),
        "LIMIT" => Ok(OrderType::Limit),
        "IOC" => Ok(OrderType::Ioc),
        other => Err(StoreError::Integrity(format!("Unknown order type: {other}"))),
    }
}

fn row_to_order(row: &turso::Row) -> Result<Order, StoreError> {
    let order_id = row
        .get::<String>(0)
        .map_err(|e| StoreError::MissingField(format!("order_id: {e}")))?;
    let trader_id = row
        .get::<String>(1)
        .map_err(|e| StoreError::MissingField(format!("trader_id: {e}")))?;
    let symbol = row
        .get::<String>(2)
        .map_err(|e| StoreError::MissingField(format!("symbol: {e}")))?;
    let side = parse_side(
        &row.get::<String>(3)
            .map_err(|e| StoreError::MissingField(format!("side: {e}")))?,
    )?;
    let order_type = parse_order_type(
        &row.get::<String>(4)
            .map_err(|e| StoreError::MissingField(format!("order_type: {e}")))?,
    )?;
    let quantity = row
        .get::<i64>(5)
        .map_err(|e| StoreError::MissingField(format!("quantity: {e}")))?;
    let filled_quantity = row
        .get::<i64>(6)
        .map_err(|e| StoreError::MissingField(format!("filled_quantity: {e}")))?;
    let limit_price = row.get::<i64>(7).ok().map(Cents::new);
    let tif_seconds = row.get::<i64>(8).ok().map(|t| t as u32);
    let status = parse_status(
        &row.get::<String>(9)
            .map_err(|e| StoreError::MissingField(format!("status: {e}")))?,
    )?;
    let sequence_number = row
        .get::<i64>(10)
        .map_err(|e| StoreError::MissingField(format!("sequence_number: {e}")))?;
    let created_at = parse_timestamp(
        &row.get::<String>(11)
            .map_err(|e| StoreError::MissingField(format!("created_at: {e}")))?,
    )?;
    let expires_at = match row.get::<String>(12).ok() {
        Some(text) => Some(parse_timestamp(&text)?),
        None => None,
    };

    Ok(Order::reconstitute(
        OrderId::new(order_id),
        TraderId::new(trader_id),
        Symbol::new(symbol),
        side,
        order_type,
        Quantity::new(quantity as u32),
        Quantity::new(filled_quantity as u32),
        limit_price,
        tif_seconds,
        status,
        sequence_number,
        created_at,
        expires_at,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exchange::aggregate::OrderDraft;

    fn draft(side: Side, price: Option<i64>, tif: Option<u32>) -> OrderDraft {
        OrderDraft {
            trader_id: TraderId::new("t1"),
            symbol: Symbol::new("@X"),
            side,
            order_type: OrderType::Limit,
            quantity: Quantity::new(10),
            limit_price: price.map(Cents::new),
            tif_seconds: tif,
        }
    }

    async fn insert_order(store: &Store, order: &Order) {
        let orders = OrderStore::new();
        let tx = store.begin().await.unwrap();
        orders.insert(&tx, order).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn insert_and_find_roundtrip() {
        let store = Store::open_in_memory().await.unwrap();
        let orders = OrderStore::new();
        let order = Order::accept(draft(Side::Buy, Some(500), Some(60)), 3, Timestamp::now());
        insert_order(&store, &order).await;

        let loaded = orders
            .find_latest(&store, order.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn update_status_walks_forward() {
        let store = Store::open_in_memory().await.unwrap();
        let orders = OrderStore::new();
        let order = Order::accept(draft(Side::Buy, Some(500), None), 1, Timestamp::now());
        insert_order(&store, &order).await;

        let tx = store.begin().await.unwrap();
        orders
            .update_status(&tx, order.id(), OrderStatus::Open, Quantity::ZERO)
            .await
            .unwrap();
        orders
            .update_status(&tx, order.id(), OrderStatus::PartiallyFilled, Quantity::new(4))
            .await
            .unwrap();
        orders
            .update_status(&tx, order.id(), OrderStatus::Filled, Quantity::new(10))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let loaded = orders
            .find_latest(&store, order.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status(), OrderStatus::Filled);
        assert_eq!(loaded.filled_quantity(), Quantity::new(10));
    }

    #[tokio::test]
    async fn update_status_rejects_backward_transition() {
        let store = Store::open_in_memory().await.unwrap();
        let orders = OrderStore::new();
        let order = Order::accept(draft(Side::Buy, Some(500), None), 1, Timestamp::now());
        insert_order(&store, &order).await;

        let tx = store.begin().await.unwrap();
        orders
            .update_status(&tx, order.id(), OrderStatus::Filled, Quantity::new(10))
            .await
            .unwrap();
        let err = orders
            .update_status(&tx, order.id(), OrderStatus::Open, Quantity::new(10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn update_status_rejects_shrinking_fill() {
        let store = Store::open_in_memory().await.unwrap();
        let orders = OrderStore::new();
        let order = Order::accept(draft(Side::Buy, Some(500), None), 1, Timestamp::now());
        insert_order(&store, &order).await;

        let tx = store.begin().await.unwrap();
        orders
            .update_status(&tx, order.id(), OrderStatus::PartiallyFilled, Quantity::new(5))
            .await
            .unwrap();
        let err = orders
            .update_status(&tx, order.id(), OrderStatus::PartiallyFilled, Quantity::new(4))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn update_status_unknown_order_is_not_found() {
        let store = Store::open_in_memory().await.unwrap();
        let orders = OrderStore::new();

        let tx = store.begin().await.unwrap();
        let err = orders
            .update_status(
                &tx,
                &OrderId::new("ghost"),
                OrderStatus::Cancelled,
                Quantity::ZERO,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn load_open_orders_orders_by_price_then_sequence() {
        let store = Store::open_in_memory().await.unwrap();
        let orders = OrderStore::new();
        let symbol = Symbol::new("@X");

        for (seq, price) in [(1_i64, 510), (2, 500), (3, 500), (4, 520)] {
            let mut order =
                Order::accept(draft(Side::Sell, Some(price), None), seq, Timestamp::now());
            order.rest().unwrap();
            insert_order(&store, &order).await;
        }

        let loaded = orders
            .load_open_orders(&store, &symbol, Side::Sell)
            .await
            .unwrap();
        let sequences: Vec<i64> = loaded.iter().map(Order::sequence_number).collect();
        // 500(seq2), 500(seq3), 510(seq1), 520(seq4)
        assert_eq!(sequences, vec![2, 3, 1, 4]);
    }

    #[tokio::test]
    async fn load_open_orders_skips_terminal_and_pending() {
        let store = Store::open_in_memory().await.unwrap();
        let orders = OrderStore::new();
        let symbol = Symbol::new("@X");

        let pending = Order::accept(draft(Side::Buy, Some(500), None), 1, Timestamp::now());
        insert_order(&store, &pending).await;

        let mut open = Order::accept(draft(Side::Buy, Some(500), None), 2, Timestamp::now());
        open.rest().unwrap();
        insert_order(&store, &open).await;

        let mut cancelled = Order::accept(draft(Side::Buy, Some(500), None), 3, Timestamp::now());
        cancelled.rest().unwrap();
        cancelled
            .cancel(crate::domain::exchange::CancelCause::Requested)
            .unwrap();
        insert_order(&store, &cancelled).await;

        let loaded = orders
            .load_open_orders(&store, &symbol, Side::Buy)
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), open.id());
    }

    #[tokio::test]
    async fn expired_orders_only_past_deadline() {
        let store = Store::open_in_memory().await.unwrap();
        let orders = OrderStore::new();
        let t0 = Timestamp::parse("2026-07-01T12:00:00Z").unwrap();

        let mut short = Order::accept(draft(Side::Buy, Some(500), Some(1)), 1, t0);
        short.rest().unwrap();
        insert_order(&store, &short).await;

        let mut long = Order::accept(draft(Side::Buy, Some(500), Some(3600)), 2, t0);
        long.rest().unwrap();
        insert_order(&store, &long).await;

        let mut gtc = Order::accept(draft(Side::Buy, Some(500), None), 3, t0);
        gtc.rest().unwrap();
        insert_order(&store, &gtc).await;

        let expired = orders
            .expired_orders(&store, t0.plus_seconds(2), 100)
            .await
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, *short.id());
    }
}
