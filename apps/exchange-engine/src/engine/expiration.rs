//! Time-in-force expiration scheduler.
//!
//! One periodic task for the whole process. Each tick reads orders
//! whose `expires_at` has passed and emits expire-cancel intents
//! through the router; the cancel path inside each engine does the
//! actual state change. An order may expire up to one tick late; it is
//! never expired early. The scheduler never touches a book directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::exchange::value_objects::CancelOutcome;
use crate::domain::shared::Timestamp;
use crate::engine::router::Router;
use crate::store::{OrderStore, Store};

/// How many expired orders one tick will sweep at most.
const SWEEP_BATCH_LIMIT: u32 = 256;

/// Periodically retires orders whose validity elapsed.
pub struct ExpirationScheduler {
    store: Arc<Store>,
    router: Arc<Router>,
    orders: OrderStore,
    tick: Duration,
}

impl ExpirationScheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(store: Arc<Store>, router: Arc<Router>, tick: Duration) -> Self {
        Self {
            store,
            router,
            orders: OrderStore::new(),
            tick,
        }
    }

    /// Tick until the shutdown signal fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(tick_secs = self.tick.as_secs_f64(), "Expiration scheduler started");
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => self.sweep().await,
                _ = shutdown.recv() => {
                    info!("Expiration scheduler stopping");
                    break;
                }
            }
        }
    }

    /// One sweep: find elapsed orders and route expire-cancels.
    pub async fn sweep(&self) {
        let now = Timestamp::now();
        let expired = match self
            .orders
            .expired_orders(&self.store, now, SWEEP_BATCH_LIMIT)
            .await
        {
            Ok(expired) => expired,
            Err(err) => {
                warn!(%err, "Expiration sweep query failed");
                return;
            }
        };

        for (order_id, symbol) in expired {
            let reply = self.router.expire(&order_id).await;
            match reply.outcome {
                CancelOutcome::Cancelled => {
                    debug!(order_id = %order_id, symbol = %symbol, "Order expired");
                }
                // Raced with a fill or a client cancel; nothing to do.
                CancelOutcome::AlreadyTerminal | CancelOutcome::Unknown => {
                    debug!(
                        order_id = %order_id,
                        symbol = %symbol,
                        outcome = ?reply.outcome,
                        "Expiration sweep skipped order"
                    );
                }
            }
        }
    }
}
