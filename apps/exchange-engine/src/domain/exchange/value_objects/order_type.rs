//! Order type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an order interacts with the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Cross immediately at whatever prices the book offers.
    Market,
    /// Cross up to the limit price; any remainder rests.
    Limit,
    /// Immediate-or-cancel: cross what is possible now, cancel the rest.
    Ioc,
}

impl OrderType {
    /// Whether a limit price must be present.
    #[must_use]
    pub const fn requires_limit_price(&self) -> bool {
        matches!(self, Self::Limit)
    }

    /// Whether a limit price must be absent.
    #[must_use]
    pub const fn forbids_limit_price(&self) -> bool {
        matches!(self, Self::Market)
    }

    /// Whether an unfilled remainder may rest on the book.
    #[must_use]
    pub const fn may_rest(&self) -> bool {
        matches!(self, Self::Limit)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "MARKET"),
            Self::Limit => write!(f, "LIMIT"),
            Self::Ioc => write!(f, "IOC"),
        }
    }
}
