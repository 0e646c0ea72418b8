//! Restart recovery over a file-backed database.

mod common;

use common::{Exchange, limit, mint_shares, open_trader};
use exchange_engine::{
    Cents, LedgerStore, OrderDraft, OrderStatus, OrderStore, OrderType, Quantity, Side, Symbol,
    Timestamp, TradeStore, TraderId,
};

const SYMBOL: &str = "@X";

#[tokio::test]
async fn restart_rebuilds_an_identical_book() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("exchange.db");
    let db_path = db_path.to_str().unwrap();

    let exchange = Exchange::open(db_path, &[SYMBOL]).await;
    open_trader(&exchange.store, "t1", 100_000).await;
    open_trader(&exchange.store, "t2", 100_000).await;
    mint_shares(&exchange.store, "t1", SYMBOL, 50).await;

    exchange
        .router
        .submit(limit("t1", SYMBOL, Side::Sell, 20, 510))
        .await;
    exchange
        .router
        .submit(limit("t1", SYMBOL, Side::Sell, 10, 505))
        .await;
    exchange
        .router
        .submit(limit("t2", SYMBOL, Side::Buy, 15, 495))
        .await;
    // One partial fill so a resting order carries filled quantity.
    exchange
        .router
        .submit(limit("t2", SYMBOL, Side::Buy, 4, 505))
        .await;

    let before = exchange
        .router
        .snapshot(&Symbol::new(SYMBOL))
        .await
        .unwrap();
    exchange.shutdown().await;

    let reopened = Exchange::open(db_path, &[SYMBOL]).await;
    let after = reopened
        .router
        .snapshot(&Symbol::new(SYMBOL))
        .await
        .unwrap();

    assert_eq!(after.book, before.book);
    assert_eq!(after.last_price_in_cents, Some(Cents::new(505)));
    assert_eq!(after.book.asks.get(&505), Some(&6));
    assert_eq!(after.book.asks.get(&510), Some(&20));
    assert_eq!(after.book.bids.get(&495), Some(&15));

    reopened.shutdown().await;
}

#[tokio::test]
async fn a_dropped_transaction_leaves_no_ghost_state() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("exchange.db");
    let db_path = db_path.to_str().unwrap();

    let exchange = Exchange::open(db_path, &[SYMBOL]).await;
    open_trader(&exchange.store, "maker", 0).await;
    open_trader(&exchange.store, "taker", 50_000).await;
    mint_shares(&exchange.store, "maker", SYMBOL, 100).await;

    exchange
        .router
        .submit(limit("maker", SYMBOL, Side::Sell, 100, 500))
        .await;
    for _ in 0..50 {
        let reply = exchange
            .router
            .submit(limit("taker", SYMBOL, Side::Buy, 1, 500))
            .await;
        assert_eq!(reply.status, OrderStatus::Filled);
    }

    // A submit that crashes mid-transaction: reservation taken, order
    // inserted, then the connection dies before commit.
    {
        let ledger = LedgerStore::new();
        let orders = OrderStore::new();
        let tx = exchange.store.begin().await.unwrap();
        ledger
            .reserve_cash(&tx, &TraderId::new("taker"), Cents::new(500))
            .await
            .unwrap();
        let order = exchange_engine::Order::accept(
            OrderDraft {
                trader_id: TraderId::new("taker"),
                symbol: Symbol::new(SYMBOL),
                side: Side::Buy,
                order_type: OrderType::Limit,
                quantity: Quantity::new(1),
                limit_price: Some(Cents::new(500)),
                tif_seconds: None,
            },
            9_999,
            Timestamp::now(),
        );
        orders.insert(&tx, &order).await.unwrap();
        drop(tx);
    }

    exchange.shutdown().await;

    let reopened = Exchange::open(db_path, &[SYMBOL]).await;

    // The store shows exactly the 50 committed trades.
    let trades = TradeStore::new()
        .for_symbol(&reopened.store, &Symbol::new(SYMBOL))
        .await
        .unwrap();
    assert_eq!(trades.len(), 50);

    // The book shows the sell with 50 remaining, nothing else.
    let snapshot = reopened
        .router
        .snapshot(&Symbol::new(SYMBOL))
        .await
        .unwrap();
    assert_eq!(snapshot.book.asks.get(&500), Some(&50));
    assert!(snapshot.book.bids.is_empty());

    // No ghost reservations from the dropped transaction.
    let ledger = LedgerStore::new();
    let taker = ledger
        .find_account_latest(&reopened.store, &TraderId::new("taker"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(taker.reserved_cash_in_cents, Cents::ZERO);
    assert_eq!(taker.balance_in_cents, Cents::new(25_000));

    // The maker's reservation matches its open remainder exactly.
    let maker_position = ledger
        .find_position_latest(&reopened.store, &TraderId::new("maker"), &Symbol::new(SYMBOL))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(maker_position.reserved_shares, Quantity::new(50));
    assert_eq!(maker_position.quantity, Quantity::new(50));

    reopened.shutdown().await;
}
