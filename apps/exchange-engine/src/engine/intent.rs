//! Engine intents and replies.
//!
//! Tagged record types for everything that flows through a symbol's
//! queue; no untyped maps on the hot path. Replies travel back over
//! oneshot channels.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::domain::exchange::value_objects::{
    CancelCause, CancelOutcome, Fill, OrderStatus, OrderType, RejectReason, Side,
};
use crate::domain::shared::{Cents, OrderId, Quantity, Symbol, Timestamp, TraderId};
use crate::engine::book::BookSnapshot;

/// A submit request as the router receives it.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
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
    /// Limit price (required for LIMIT, optional for IOC, forbidden for
    /// MARKET).
    pub limit_price: Option<Cents>,
    /// Validity horizon for resting LIMIT orders.
    pub tif_seconds: Option<u32>,
    /// Give up if still queued past this instant.
    pub deadline: Option<Instant>,
}

/// Reply to a submit request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReply {
    /// Persisted order ID; absent on rejection.
    pub order_id: Option<OrderId>,
    /// Final order status for this intent.
    pub status: OrderStatus,
    /// Executions, in match order.
    pub fills: Vec<Fill>,
    /// Rejection token when nothing was persisted.
    pub rejection_reason: Option<RejectReason>,
}

impl SubmitReply {
    /// A rejection reply; nothing persisted.
    #[must_use]
    pub const fn rejected(reason: RejectReason) -> Self {
        Self {
            order_id: None,
            status: OrderStatus::Rejected,
            fills: Vec::new(),
            rejection_reason: Some(reason),
        }
    }

    /// An accepted reply.
    #[must_use]
    pub const fn accepted(order_id: OrderId, status: OrderStatus, fills: Vec<Fill>) -> Self {
        Self {
            order_id: Some(order_id),
            status,
            fills,
            rejection_reason: None,
        }
    }
}

/// Reply to a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReply {
    /// What happened to the order.
    pub outcome: CancelOutcome,
}

/// Reply to a snapshot request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReply {
    /// Aggregated book.
    pub book: BookSnapshot,
    /// Last execution price, if the symbol has traded.
    pub last_price_in_cents: Option<Cents>,
    /// When the snapshot was taken.
    pub timestamp: Timestamp,
}

/// One unit of work for a symbol engine.
#[derive(Debug)]
pub enum EngineIntent {
    /// Route a new order.
    Submit {
        /// The request.
        request: SubmitRequest,
        /// Reply channel.
        reply: oneshot::Sender<SubmitReply>,
    },
    /// Take a resting order off the book.
    Cancel {
        /// Order to cancel.
        order_id: OrderId,
        /// Requesting trader; `None` for scheduler-driven cancels.
        requested_by: Option<TraderId>,
        /// Why the order is coming off.
        cause: CancelCause,
        /// Reply channel.
        reply: oneshot::Sender<CancelReply>,
    },
    /// Read a consistent view of the book.
    Snapshot {
        /// Reply channel.
        reply: oneshot::Sender<SnapshotReply>,
    },
    /// Stop the engine after the current intent.
    Shutdown,
}
