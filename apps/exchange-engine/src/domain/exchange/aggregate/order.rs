//! Order Aggregate Root
//!
//! Manages the complete lifecycle of an order: validation, fills,
//! resting, cancellation, expiry, and the residual reservations held
//! against it.

use serde::{Deserialize, Serialize};

use crate::domain::exchange::errors::OrderError;
use crate::domain::exchange::value_objects::{
    CancelCause, OrderStatus, OrderType, RejectReason, Side,
};
use crate::domain::shared::{Cents, OrderId, Quantity, Symbol, Timestamp, TraderId};

/// An order intent as submitted, before acceptance.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    /// Submitting trader.
    pub trader_id: TraderId,
    /// Symbol to trade.
    pub symbol: Symbol,
    /// Order side.
    pub side: Side,
    /// Order type.
    pub order_type: OrderType,
    /// Quantity to trade.
    pub quantity: Quantity,
    /// Limit price (required for LIMIT, optional for IOC, forbidden for MARKET).
    pub limit_price: Option<Cents>,
    /// Validity horizon for resting LIMIT orders; `None` is good-till-cancel.
    pub tif_seconds: Option<u32>,
}

impl OrderDraft {
    /// Validate the draft parameters.
    ///
    /// # Errors
    ///
    /// Returns the stable rejection token describing the first failed
    /// check. Nothing about the draft is persisted on failure.
    pub fn validate(&self) -> Result<(), RejectReason> {
        if self.quantity.validate_for_order().is_err() {
            return Err(RejectReason::InvalidQuantity);
        }
        if self.symbol.validate().is_err() {
            return Err(RejectReason::UnknownSymbol);
        }
        if self.order_type.requires_limit_price() && self.limit_price.is_none() {
            return Err(RejectReason::InvalidPrice);
        }
        if self.order_type.forbids_limit_price() && self.limit_price.is_some() {
            return Err(RejectReason::InvalidPrice);
        }
        if let Some(price) = self.limit_price
            && price.validate_for_price().is_err()
        {
            return Err(RejectReason::InvalidPrice);
        }
        Ok(())
    }
}

/// Order Aggregate Root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    trader_id: TraderId,
    symbol: Symbol,
    side: Side,
    order_type: OrderType,
    quantity: Quantity,
    filled_quantity: Quantity,
    limit_price: Option<Cents>,
    tif_seconds: Option<u32>,
    status: OrderStatus,
    sequence_number: i64,
    created_at: Timestamp,
    expires_at: Option<Timestamp>,
}

impl Order {
    /// Accept a validated draft into a PENDING order.
    ///
    /// `sequence_number` must come from the symbol's sequencer inside
    /// the same transaction that persists the order.
    #[must_use]
    pub fn accept(draft: OrderDraft, sequence_number: i64, now: Timestamp) -> Self {
        // TIF only ever applies to orders that can rest.
        let tif_seconds = if draft.order_type.may_rest() {
            draft.tif_seconds
        } else {
            None
        };
        let expires_at = tif_seconds.map(|secs| now.plus_seconds(secs));
        Self {
            id: OrderId::generate(),
            trader_id: draft.trader_id,
            symbol: draft.symbol,
            side: draft.side,
            order_type: draft.order_type,
            quantity: draft.quantity,
            filled_quantity: Quantity::ZERO,
            limit_price: draft.limit_price,
            tif_seconds,
            status: OrderStatus::Pending,
            sequence_number,
            created_at: now,
            expires_at,
        }
    }

    /// Reconstitute an order from stored state.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn reconstitute(
        id: OrderId,
        trader_id: TraderId,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        quantity: Quantity,
        filled_quantity: Quantity,
        limit_price: Option<Cents>,
        tif_seconds: Option<u32>,
        status: OrderStatus,
        sequence_number: i64,
        created_at: Timestamp,
        expires_at: Option<Timestamp>,
    ) -> Self {
        Self {
            id,
            trader_id,
            symbol,
            side,
            order_type,
            quantity,
            filled_quantity,
            limit_price,
            tif_seconds,
            status,
            sequence_number,
            created_at,
            expires_at,
        }
    }

    /// Order ID.
    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.id
    }

    /// Owning trader.
    #[must_use]
    pub const fn trader_id(&self) -> &TraderId {
        &self.trader_id
    }

    /// Traded symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Order side.
    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Order type.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Requested quantity.
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Cumulative filled quantity.
    #[must_use]
    pub const fn filled_quantity(&self) -> Quantity {
        self.filled_quantity
    }

    /// Quantity still unfilled.
    #[must_use]
    pub const fn remaining(&self) -> Quantity {
        Quantity::new(self.quantity.as_u32() - self.filled_quantity.as_u32())
    }

    /// Limit price, when present.
    #[must_use]
    pub const fn limit_price(&self) -> Option<Cents> {
        self.limit_price
    }

    /// Time-in-force horizon in seconds.
    #[must_use]
    pub const fn tif_seconds(&self) -> Option<u32> {
        self.tif_seconds
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Per-symbol sequence number assigned on acceptance.
    #[must_use]
    pub const fn sequence_number(&self) -> i64 {
        self.sequence_number
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Expiry deadline derived from the TIF horizon.
    #[must_use]
    pub const fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
    }

    /// Whether the order has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record an execution slice against this order.
    ///
    /// Moves the order to `FILLED` when nothing remains, otherwise to
    /// `PARTIALLY_FILLED`.
    ///
    /// # Errors
    ///
    /// Returns error if the order cannot fill or the slice exceeds the
    /// remaining quantity.
    pub fn record_fill(&mut self, qty: Quantity) -> Result<(), OrderError> {
        if !self.status.can_fill() {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: OrderStatus::PartiallyFilled,
            });
        }
        let remaining = self.remaining();
        if qty > remaining || qty.is_zero() {
            return Err(OrderError::FillExceedsRemaining {
                fill_qty: qty.as_u32(),
                remaining_qty: remaining.as_u32(),
            });
        }
        self.filled_quantity = self.filled_quantity + qty;
        let next = if self.remaining().is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.transition(next)
    }

    /// Rest an unfilled PENDING order on the book.
    ///
    /// # Errors
    ///
    /// Returns error unless the order is PENDING with no fills.
    pub fn rest(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending || !self.filled_quantity.is_zero() {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: OrderStatus::Open,
            });
        }
        self.transition(OrderStatus::Open)
    }

    /// Take the order off the book.
    ///
    /// An `Expired` cause moves the order to `EXPIRED`; every other
    /// cause moves it to `CANCELLED`. Partial fills are kept.
    ///
    /// # Errors
    ///
    /// Returns error if the order is already terminal.
    pub fn cancel(&mut self, cause: CancelCause) -> Result<OrderStatus, OrderError> {
        if self.is_terminal() {
            return Err(OrderError::CannotCancel {
                status: self.status,
            });
        }
        let next = match cause {
            CancelCause::Expired => OrderStatus::Expired,
            _ => OrderStatus::Cancelled,
        };
        self.transition(next)?;
        Ok(self.status)
    }

    /// Cash still earmarked for this order.
    ///
    /// Only priced buys hold a standing cash reservation; market-order
    /// reservations are settled or released within the submit
    /// transaction and never rest.
    #[must_use]
    pub fn residual_cash_reservation(&self) -> Cents {
        match (self.side, self.limit_price) {
            (Side::Buy, Some(price)) => price.times(self.remaining().as_u32()),
            _ => Cents::ZERO,
        }
    }

    /// Shares still earmarked for this order.
    #[must_use]
    pub fn residual_share_reservation(&self) -> Quantity {
        match self.side {
            Side::Sell => self.remaining(),
            Side::Buy => Quantity::ZERO,
        }
    }

    fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
