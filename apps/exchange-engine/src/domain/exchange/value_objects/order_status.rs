//! Order status in the lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status.
///
/// Statuses move strictly forward:
///
/// - `PENDING -> OPEN | PARTIALLY_FILLED | FILLED | CANCELLED | REJECTED`
/// - `OPEN -> PARTIALLY_FILLED | FILLED | CANCELLED | EXPIRED`
/// - `PARTIALLY_FILLED -> FILLED | CANCELLED | EXPIRED`
///
/// `FILLED`, `CANCELLED`, `EXPIRED`, and `REJECTED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created inside the routing transaction, not yet resolved.
    Pending,
    /// Resting on the book, no fills yet.
    Open,
    /// Resting or resolved with some quantity filled.
    PartiallyFilled,
    /// Completely filled.
    Filled,
    /// Cancelled by the trader or by residual-handling rules.
    Cancelled,
    /// Retired by the time-in-force scheduler.
    Expired,
    /// Refused during validation; never persisted.
    Rejected,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Expired | Self::Rejected
        )
    }

    /// Returns true if the order may be resting on a book.
    #[must_use]
    pub const fn is_resting(&self) -> bool {
        matches!(self, Self::Open | Self::PartiallyFilled)
    }

    /// Returns true if the order can still receive fills.
    #[must_use]
    pub const fn can_fill(&self) -> bool {
        matches!(self, Self::Pending | Self::Open | Self::PartiallyFilled)
    }

    /// Whether moving to `next` is a legal forward transition.
    ///
    /// A status may always "transition" to itself so that fill-quantity
    /// updates can be persisted without a status change.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        if matches!(
            (self, next),
            (Self::Pending, Self::Pending)
                | (Self::Open, Self::Open)
                | (Self::PartiallyFilled, Self::PartiallyFilled)
        ) {
            return true;
        }
        match self {
            Self::Pending => matches!(
                next,
                Self::Open
                    | Self::PartiallyFilled
                    | Self::Filled
                    | Self::Cancelled
                    | Self::Rejected
            ),
            Self::Open => matches!(
                next,
                Self::PartiallyFilled | Self::Filled | Self::Cancelled | Self::Expired
            ),
            Self::PartiallyFilled => {
                matches!(next, Self::Filled | Self::Cancelled | Self::Expired)
            }
            Self::Filled | Self::Cancelled | Self::Expired | Self::Rejected => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Open => write!(f, "OPEN"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn order_status_is_terminal() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn order_status_is_resting() {
        assert!(OrderStatus::Open.is_resting());
        assert!(OrderStatus::PartiallyFilled.is_resting());
        assert!(!OrderStatus::Pending.is_resting());
        assert!(!OrderStatus::Filled.is_resting());
    }

    #[test_case(OrderStatus::Pending, OrderStatus::Open, true)]
    #[test_case(OrderStatus::Pending, OrderStatus::Filled, true)]
    #[test_case(OrderStatus::Pending, OrderStatus::Rejected, true)]
    #[test_case(OrderStatus::Pending, OrderStatus::Expired, false)]
    #[test_case(OrderStatus::Open, OrderStatus::PartiallyFilled, true)]
    #[test_case(OrderStatus::Open, OrderStatus::Expired, true)]
    #[test_case(OrderStatus::Open, OrderStatus::Rejected, false)]
    #[test_case(OrderStatus::PartiallyFilled, OrderStatus::Filled, true)]
    #[test_case(OrderStatus::PartiallyFilled, OrderStatus::Open, false)]
    #[test_case(OrderStatus::Filled, OrderStatus::Cancelled, false)]
    #[test_case(OrderStatus::Cancelled, OrderStatus::Open, false)]
    #[test_case(OrderStatus::Expired, OrderStatus::Expired, false)]
    fn order_status_transitions(from: OrderStatus, to: OrderStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn non_terminal_statuses_allow_self_transition() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
        assert!(OrderStatus::Open.can_transition_to(OrderStatus::Open));
        assert!(OrderStatus::PartiallyFilled.can_transition_to(OrderStatus::PartiallyFilled));
    }

    #[test]
    fn order_status_display() {
        assert_eq!(
            format!("{}", OrderStatus::PartiallyFilled),
            "PARTIALLY_FILLED"
        );
        assert_eq!(format!("{}", OrderStatus::Cancelled), "CANCELLED");
    }

    #[test]
    fn order_status_serde() {
        let json = serde_json::to_string(&OrderStatus::PartiallyFilled).unwrap();
        assert_eq!(json, "\"PARTIALLY_FILLED\"");

        let parsed: OrderStatus = serde_json::from_str("\"EXPIRED\"").unwrap();
        assert_eq!(parsed, OrderStatus::Expired);
    }
}
