//! Startup recovery.
//!
//! Rebuilds every symbol's in-memory book from the persistent open
//! orders, in (price, sequence) order, then starts the engine tasks.
//! Reservations already persisted alongside those orders are not
//! re-applied, so recovery never double-reserves.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::info;

use crate::domain::exchange::value_objects::Side;
use crate::engine::book::{Book, RestingOrder};
use crate::engine::router::Router;
use crate::engine::symbol_engine::SymbolEngine;
use crate::store::{OrderStore, RetryPolicy, Sequencer, Store, StoreError, TradeStore};

/// Rebuild books from the store and spawn one engine per registry
/// symbol. The returned router is ready to take intents.
pub async fn recover_engines(
    store: Arc<Store>,
    queue_capacity: usize,
    retry: RetryPolicy,
    slippage_cushion: Decimal,
) -> Result<Router, StoreError> {
    let sequencer = Sequencer::new();
    let orders = OrderStore::new();
    let trades = TradeStore::new();

    let symbols = sequencer.symbols(&store).await?;
    let mut router = Router::new(Arc::clone(&store));

    for symbol in symbols {
        let mut book = Book::new();
        let mut restored = 0_usize;
        for side in [Side::Buy, Side::Sell] {
            for order in orders.load_open_orders(&store, &symbol, side).await? {
                let price = order.limit_price().ok_or_else(|| {
                    StoreError::Integrity(format!("Resting order {} has no price", order.id()))
                })?;
                book.add(
                    side,
                    price,
                    RestingOrder {
                        order_id: order.id().clone(),
                        trader_id: order.trader_id().clone(),
                        remaining: order.remaining(),
                        sequence: order.sequence_number(),
                    },
                );
                restored += 1;
            }
        }

        let last_trade_price = trades.last_price(&store, &symbol).await?;
        let (sender, rx) = mpsc::channel(queue_capacity);
        let engine = SymbolEngine::new(
            symbol.clone(),
            Arc::clone(&store),
            retry,
            slippage_cushion,
            book,
            last_trade_price,
            rx,
        );
        let task = tokio::spawn(engine.run());

        info!(symbol = %symbol, restored, "Book recovered");
        router.insert_engine(symbol, sender, task);
    }

    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exchange::aggregate::{Order, OrderDraft};
    use crate::domain::exchange::value_objects::OrderType;
    use crate::domain::shared::{Cents, Quantity, Symbol, Timestamp, TraderId};
    use rust_decimal_macros::dec;

    async fn seeded_store() -> Arc<Store> {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let sequencer = Sequencer::new();
        sequencer
            .ensure_symbol(&store, &Symbol::new("@X"))
            .await
            .unwrap();
        store
    }

    async fn rest_order(store: &Store, side: Side, qty: u32, price: i64, seq: i64) -> Order {
        let mut order = Order::accept(
            OrderDraft {
                trader_id: TraderId::new("t1"),
                symbol: Symbol::new("@X"),
                side,
                order_type: OrderType::Limit,
                quantity: Quantity::new(qty),
                limit_price: Some(Cents::new(price)),
                tif_seconds: None,
            },
            seq,
            Timestamp::now(),
        );
        order.rest().unwrap();
        let orders = OrderStore::new();
        let tx = store.begin().await.unwrap();
        orders.insert(&tx, &order).await.unwrap();
        tx.commit().await.unwrap();
        order
    }

    #[tokio::test]
    async fn recovery_restores_open_orders_into_snapshots() {
        let store = seeded_store().await;
        rest_order(&store, Side::Buy, 10, 490, 1).await;
        rest_order(&store, Side::Sell, 4, 510, 2).await;
        rest_order(&store, Side::Sell, 6, 505, 3).await;

        let router = recover_engines(
            Arc::clone(&store),
            64,
            RetryPolicy::default(),
            dec!(1.10),
        )
        .await
        .unwrap();

        let snapshot = router.snapshot(&Symbol::new("@X")).await.unwrap();
        assert_eq!(snapshot.book.best_bid, Some(Cents::new(490)));
        assert_eq!(snapshot.book.best_ask, Some(Cents::new(505)));
        assert_eq!(snapshot.book.bids.get(&490), Some(&10));
        assert_eq!(snapshot.book.asks.get(&505), Some(&6));
        assert_eq!(snapshot.book.asks.get(&510), Some(&4));

        router.shutdown().await;
    }

    #[tokio::test]
    async fn recovery_with_empty_registry_yields_no_engines() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let router = recover_engines(store, 64, RetryPolicy::default(), dec!(1.10))
            .await
            .unwrap();
        assert!(router.symbols().is_empty());
        router.shutdown().await;
    }
}
