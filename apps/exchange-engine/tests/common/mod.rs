//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use exchange_engine::{
    Cents, EngineConfig, LedgerStore, OrderType, Quantity, Router, Sequencer, Side, Store,
    SubmitRequest, Symbol, TraderId, recover_engines,
};

/// A running exchange: store plus router with live engines.
pub struct Exchange {
    pub store: Arc<Store>,
    pub router: Arc<Router>,
}

impl Exchange {
    /// Boot an in-memory exchange with the given symbols provisioned.
    pub async fn in_memory(symbols: &[&str]) -> Self {
        Self::open(":memory:", symbols).await
    }

    /// Boot an exchange over a database file, recovering any state in it.
    pub async fn open(db_path: &str, symbols: &[&str]) -> Self {
        let config = EngineConfig::default();
        let store = Arc::new(Store::open(db_path).await.expect("store opens"));
        let sequencer = Sequencer::new();
        for symbol in symbols {
            sequencer
                .ensure_symbol(&store, &Symbol::new(*symbol))
                .await
                .expect("symbol provisions");
        }
        let router = Arc::new(
            recover_engines(
                Arc::clone(&store),
                config.per_symbol_queue_capacity,
                config.retry,
                config.slippage_cushion,
            )
            .await
            .expect("recovery succeeds"),
        );
        Self { store, router }
    }

    /// Stop every engine.
    pub async fn shutdown(self) {
        drop(self.store);
        match Arc::try_unwrap(self.router) {
            Ok(router) => router.shutdown().await,
            Err(_) => panic!("router still shared at shutdown"),
        }
    }
}

/// Open a non-admin trader account with a cash balance.
pub async fn open_trader(store: &Store, id: &str, cash: i64) {
    let ledger = LedgerStore::new();
    let tx = store.begin().await.expect("begin");
    ledger
        .open_account(&tx, &TraderId::new(id), false, Cents::new(cash))
        .await
        .expect("account opens");
    tx.commit().await.expect("commit");
}

/// Open an admin account.
pub async fn open_admin(store: &Store, id: &str, cash: i64) {
    let ledger = LedgerStore::new();
    let tx = store.begin().await.expect("begin");
    ledger
        .open_account(&tx, &TraderId::new(id), true, Cents::new(cash))
        .await
        .expect("account opens");
    tx.commit().await.expect("commit");
}

/// Mint shares into a trader's position (admin adjustment).
pub async fn mint_shares(store: &Store, id: &str, symbol: &str, qty: i64) {
    let ledger = LedgerStore::new();
    let tx = store.begin().await.expect("begin");
    ledger
        .admin_adjust(
            &tx,
            &TraderId::new(id),
            Some(&Symbol::new(symbol)),
            Cents::ZERO,
            qty,
        )
        .await
        .expect("shares mint");
    tx.commit().await.expect("commit");
}

/// A LIMIT order request.
pub fn limit(trader: &str, symbol: &str, side: Side, qty: u32, price: i64) -> SubmitRequest {
    SubmitRequest {
        trader_id: TraderId::new(trader),
        symbol: Symbol::new(symbol),
        side,
        order_type: OrderType::Limit,
        quantity: Quantity::new(qty),
        limit_price: Some(Cents::new(price)),
        tif_seconds: None,
        deadline: None,
    }
}

/// A MARKET order request.
pub fn market(trader: &str, symbol: &str, side: Side, qty: u32) -> SubmitRequest {
    SubmitRequest {
        trader_id: TraderId::new(trader),
        symbol: Symbol::new(symbol),
        side,
        order_type: OrderType::Market,
        quantity: Quantity::new(qty),
        limit_price: None,
        tif_seconds: None,
        deadline: None,
    }
}

/// An IOC order request.
pub fn ioc(trader: &str, symbol: &str, side: Side, qty: u32, price: Option<i64>) -> SubmitRequest {
    SubmitRequest {
        trader_id: TraderId::new(trader),
        symbol: Symbol::new(symbol),
        side,
        order_type: OrderType::Ioc,
        quantity: Quantity::new(qty),
        limit_price: price.map(Cents::new),
        tif_seconds: None,
        deadline: None,
    }
}
