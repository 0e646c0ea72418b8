//! Order router.
//!
//! Process-wide registry mapping each symbol to its engine's bounded
//! intent queue. No global lock is held during submit; contention
//! scales with the number of symbols, not traders. A full queue replies
//! `BUSY` instead of blocking the caller.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::exchange::value_objects::{CancelCause, CancelOutcome, RejectReason};
use crate::domain::shared::{OrderId, Symbol, TraderId};
use crate::engine::intent::{CancelReply, EngineIntent, SnapshotReply, SubmitReply, SubmitRequest};
use crate::store::{OrderStore, Store};

pub(crate) struct EngineHandle {
    pub(crate) sender: mpsc::Sender<EngineIntent>,
    pub(crate) task: JoinHandle<()>,
}

/// Dispatches intents to per-symbol engines.
pub struct Router {
    engines: HashMap<Symbol, EngineHandle>,
    store: Arc<Store>,
    orders: OrderStore,
}

impl Router {
    /// Create a router with no engines registered yet.
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            engines: HashMap::new(),
            store,
            orders: OrderStore::new(),
        }
    }

    pub(crate) fn insert_engine(
        &mut self,
        symbol: Symbol,
        sender: mpsc::Sender<EngineIntent>,
        task: JoinHandle<()>,
    ) {
        self.engines.insert(symbol, EngineHandle { sender, task });
    }

    /// Symbols with a running engine.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.engines.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Route a submit intent to its symbol's engine.
    pub async fn submit(&self, request: SubmitRequest) -> SubmitReply {
        let Some(handle) = self.engines.get(&request.symbol) else {
            return SubmitReply::rejected(RejectReason::UnknownSymbol);
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        match handle.sender.try_send(EngineIntent::Submit {
            request,
            reply: reply_tx,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return SubmitReply::rejected(RejectReason::Busy),
            Err(TrySendError::Closed(_)) => return SubmitReply::rejected(RejectReason::Internal),
        }
        reply_rx
            .await
            .unwrap_or_else(|_| SubmitReply::rejected(RejectReason::Internal))
    }

    /// Cancel a resting order on behalf of its owner.
    pub async fn cancel(&self, trader_id: &TraderId, order_id: &OrderId) -> CancelReply {
        self.route_cancel(order_id, Some(trader_id.clone()), CancelCause::Requested)
            .await
    }

    /// Retire an order whose time-in-force elapsed (scheduler path).
    pub async fn expire(&self, order_id: &OrderId) -> CancelReply {
        self.route_cancel(order_id, None, CancelCause::Expired).await
    }

    async fn route_cancel(
        &self,
        order_id: &OrderId,
        requested_by: Option<TraderId>,
        cause: CancelCause,
    ) -> CancelReply {
        // The cancel intent routes by the order's persisted symbol.
        let order = match self.orders.find_latest(&self.store, order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                return CancelReply {
                    outcome: CancelOutcome::Unknown,
                }
            }
            Err(err) => {
                warn!(order_id = %order_id, %err, "Cancel routing lookup failed");
                return CancelReply {
                    outcome: CancelOutcome::Unknown,
                };
            }
        };
        let Some(handle) = self.engines.get(order.symbol()) else {
            warn!(order_id = %order_id, symbol = %order.symbol(), "No engine for order's symbol");
            return CancelReply {
                outcome: CancelOutcome::Unknown,
            };
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let intent = EngineIntent::Cancel {
            order_id: order_id.clone(),
            requested_by,
            cause,
            reply: reply_tx,
        };
        if let Err(err) = handle.sender.try_send(intent) {
            warn!(order_id = %order_id, %err, "Cancel intent not enqueued");
            return CancelReply {
                outcome: CancelOutcome::Unknown,
            };
        }
        reply_rx.await.unwrap_or(CancelReply {
            outcome: CancelOutcome::Unknown,
        })
    }

    /// Read a consistent snapshot, served by the engine between writes.
    pub async fn snapshot(&self, symbol: &Symbol) -> Result<SnapshotReply, RejectReason> {
        let Some(handle) = self.engines.get(symbol) else {
            return Err(RejectReason::UnknownSymbol);
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        match handle.sender.try_send(EngineIntent::Snapshot { reply: reply_tx }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Err(RejectReason::Busy),
            Err(TrySendError::Closed(_)) => return Err(RejectReason::Internal),
        }
        reply_rx.await.map_err(|_| RejectReason::Internal)
    }

    /// Deliver shutdown to every engine and join the tasks.
    pub async fn shutdown(self) {
        info!(engines = self.engines.len(), "Router shutting down");
        for (symbol, handle) in self.engines {
            if handle.sender.send(EngineIntent::Shutdown).await.is_err() {
                // Engine already stopped (halt or queue closure).
            }
            if let Err(err) = handle.task.await {
                warn!(symbol = %symbol, %err, "Engine task join failed");
            }
        }
        info!("Router stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exchange::value_objects::{OrderType, Side};
    use crate::domain::shared::{Cents, Quantity};

    fn request(symbol: &str) -> SubmitRequest {
        SubmitRequest {
            trader_id: TraderId::new("t1"),
            symbol: Symbol::new(symbol),
            side: Side::Buy,
            order_type: OrderType::Limit,
            quantity: Quantity::new(1),
            limit_price: Some(Cents::new(500)),
            tif_seconds: None,
            deadline: None,
        }
    }

    #[tokio::test]
    async fn unknown_symbol_is_rejected_without_queueing() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let router = Router::new(store);

        let reply = router.submit(request("@GHOST")).await;
        assert_eq!(reply.rejection_reason, Some(RejectReason::UnknownSymbol));
    }

    #[tokio::test]
    async fn full_queue_replies_busy() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let mut router = Router::new(store);

        // An engine that never drains its queue of one.
        let (sender, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            let _hold = rx;
            std::future::pending::<()>().await;
        });
        router.insert_engine(Symbol::new("@X"), sender, task);

        let (reply_tx, _reply_rx) = oneshot::channel();
        router.engines[&Symbol::new("@X")]
            .sender
            .try_send(EngineIntent::Submit {
                request: request("@X"),
                reply: reply_tx,
            })
            .unwrap();

        let reply = router.submit(request("@X")).await;
        assert_eq!(reply.rejection_reason, Some(RejectReason::Busy));
    }

    #[tokio::test]
    async fn snapshot_of_unknown_symbol_errors() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let router = Router::new(store);
        assert_eq!(
            router.snapshot(&Symbol::new("@GHOST")).await.unwrap_err(),
            RejectReason::UnknownSymbol
        );
    }

    #[tokio::test]
    async fn cancel_of_unknown_order_is_unknown() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let router = Router::new(store);
        let reply = router
            .cancel(&TraderId::new("t1"), &OrderId::new("ghost"))
            .await;
        assert_eq!(reply.outcome, CancelOutcome::Unknown);
    }
}
