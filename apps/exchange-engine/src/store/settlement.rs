//! Settlement façade.
//!
//! Applies one planned fill to every store inside the caller's
//! transaction: trade row, double-entry cash and share movement,
//! buy-side over-reserve release, maker status update, and the
//! `TRADE_EXECUTED` outbox event. Either all of it commits with the
//! rest of the intent, or none of it does.

use thiserror::Error;
use turso::Value;

use crate::domain::exchange::{MarketEvent, Order, OrderError, Trade};
use crate::domain::shared::{Cents, Quantity, Timestamp};
use crate::store::db::{StoreError, Tx};
use crate::store::ledger::{LedgerError, LedgerStore};
use crate::store::orders::OrderStore;
use crate::store::outbox::OutboxStore;
use crate::store::trades::TradeStore;

/// Errors from settling a fill.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Ledger failure (resources or integrity).
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Order aggregate refused the fill; persistent and in-memory
    /// state disagree.
    #[error(transparent)]
    Order(#[from] OrderError),
}

impl SettlementError {
    /// Whether retrying the whole transaction may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Ledger(e) => e.is_transient(),
            Self::Order(_) => false,
        }
    }
}

/// Composes the ledger, order, trade, and outbox stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct Settlement {
    ledger: LedgerStore,
    orders: OrderStore,
    trades: TradeStore,
    outbox: OutboxStore,
}

impl Settlement {
    /// Create the façade.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ledger: LedgerStore::new(),
            orders: OrderStore::new(),
            trades: TradeStore::new(),
            outbox: OutboxStore::new(),
        }
    }

    /// Apply one fill between the incoming taker and a resting maker.
    ///
    /// Both aggregates record the fill. The maker's row is persisted
    /// here; the taker's row is persisted once by the engine after
    /// residual handling decides its final state. The crossing price is
    /// the maker's price, so only the buyer's *own* limit can exceed it
    /// and the excess reservation is released per slice.
    pub async fn settle_fill(
        &self,
        tx: &Tx,
        taker: &mut Order,
        maker: &mut Order,
        qty: Quantity,
        price: Cents,
        now: Timestamp,
    ) -> Result<Trade, SettlementError> {
        taker.record_fill(qty)?;
        maker.record_fill(qty)?;

        let (buy_order, sell_order) = if taker.side().is_buy() {
            (&*taker, &*maker)
        } else {
            (&*maker, &*taker)
        };

        let trade = Trade::new(
            taker.symbol().clone(),
            price,
            qty,
            buy_order.id().clone(),
            sell_order.id().clone(),
            buy_order.trader_id().clone(),
            sell_order.trader_id().clone(),
            maker.id().clone(),
            taker.id().clone(),
            now,
        )?;

        self.trades.record(tx, &trade).await?;
        self.ledger.settle_trade(tx, &trade).await?;

        // A priced buyer reserved at their limit; the crossing price may
        // be better. Return the difference immediately.
        if let Some(limit) = buy_order.limit_price() {
            let excess = (limit - price).times(qty.as_u32());
            if excess.is_positive() {
                self.ledger
                    .release_cash(tx, buy_order.trader_id(), excess)
                    .await?;
            }
        }

        self.orders
            .update_status(tx, maker.id(), maker.status(), maker.filled_quantity())
            .await?;
        self.outbox
            .append(tx, &MarketEvent::trade_executed(&trade))
            .await?;

        Ok(trade)
    }
}
