//! Executed trade record.

use serde::{Deserialize, Serialize};

use crate::domain::exchange::errors::OrderError;
use crate::domain::shared::{Cents, OrderId, Quantity, Symbol, Timestamp, TradeId, TraderId};

/// An immutable fact: shares changed hands at a price.
///
/// Trades are insert-only; nothing ever mutates or deletes one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Trade ID.
    pub trade_id: TradeId,
    /// Symbol traded.
    pub symbol: Symbol,
    /// Execution price per share (the maker's price).
    pub price_in_cents: Cents,
    /// Shares exchanged.
    pub quantity: Quantity,
    /// The buy order involved.
    pub buy_order_id: OrderId,
    /// The sell order involved.
    pub sell_order_id: OrderId,
    /// Buying trader.
    pub buyer_id: TraderId,
    /// Selling trader.
    pub seller_id: TraderId,
    /// The resting order.
    pub maker_order_id: OrderId,
    /// The incoming order.
    pub taker_order_id: OrderId,
    /// Execution timestamp.
    pub executed_at: Timestamp,
}

impl Trade {
    /// Create a trade record, enforcing the trade invariants.
    ///
    /// # Errors
    ///
    /// Returns error if quantity or price is not strictly positive, or
    /// if buyer and seller are the same trader.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        price_in_cents: Cents,
        quantity: Quantity,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        buyer_id: TraderId,
        seller_id: TraderId,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        executed_at: Timestamp,
    ) -> Result<Self, OrderError> {
        if quantity.is_zero() {
            return Err(OrderError::InvalidParameters {
                field: "quantity".to_string(),
                message: "Trade quantity must be positive".to_string(),
            });
        }
        if !price_in_cents.is_positive() {
            return Err(OrderError::InvalidParameters {
                field: "price_in_cents".to_string(),
                message: "Trade price must be positive".to_string(),
            });
        }
        if buyer_id == seller_id {
            return Err(OrderError::InvalidParameters {
                field: "seller_id".to_string(),
                message: "Buyer and seller must differ".to_string(),
            });
        }
        Ok(Self {
            trade_id: TradeId::generate(),
            symbol,
            price_in_cents,
            quantity,
            buy_order_id,
            sell_order_id,
            buyer_id,
            seller_id,
            maker_order_id,
            taker_order_id,
            executed_at,
        })
    }

    /// Cash moved between the counterparties.
    #[must_use]
    pub const fn notional(&self) -> Cents {
        self.price_in_cents.times(self.quantity.as_u32())
    }
}
