//! Rejection reasons and cancellation outcomes.
//!
//! `RejectReason` variants are stable wire tokens; clients match on the
//! serialized form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a submit intent was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// Quantity was zero.
    InvalidQuantity,
    /// Limit price missing, present when forbidden, or not positive.
    InvalidPrice,
    /// Symbol is not in the registry.
    UnknownSymbol,
    /// Trader is missing or deactivated.
    InactiveTrader,
    /// Available cash cannot cover the reservation.
    InsufficientCash,
    /// Available shares cannot cover the reservation.
    InsufficientShares,
    /// No opposite-side liquidity for a market order.
    NoLiquidity,
    /// The symbol's intent queue is full.
    Busy,
    /// The intent's deadline elapsed while queued.
    Timeout,
    /// Persistent store failure after retries.
    Internal,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::InvalidQuantity => "INVALID_QUANTITY",
            Self::InvalidPrice => "INVALID_PRICE",
            Self::UnknownSymbol => "UNKNOWN_SYMBOL",
            Self::InactiveTrader => "INACTIVE_TRADER",
            Self::InsufficientCash => "INSUFFICIENT_CASH",
            Self::InsufficientShares => "INSUFFICIENT_SHARES",
            Self::NoLiquidity => "NO_LIQUIDITY",
            Self::Busy => "BUSY",
            Self::Timeout => "TIMEOUT",
            Self::Internal => "INTERNAL",
        };
        write!(f, "{token}")
    }
}

/// Why a resting order is being taken off the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelCause {
    /// The owning trader asked.
    Requested,
    /// Time-in-force elapsed.
    Expired,
    /// Unfilled IOC remainder.
    #[serde(rename = "IOC_REMAINDER")]
    ImmediateOrCancel,
    /// Market order ran out of liquidity or reserved cash.
    NoLiquidity,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Requested => "REQUESTED",
            Self::Expired => "EXPIRED",
            Self::ImmediateOrCancel => "IOC_REMAINDER",
            Self::NoLiquidity => "NO_LIQUIDITY",
        };
        write!(f, "{token}")
    }
}

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelOutcome {
    /// The order was open and is now cancelled (or expired).
    Cancelled,
    /// The order had already reached a terminal state.
    AlreadyTerminal,
    /// No such order, or it belongs to a different trader.
    Unknown,
}
