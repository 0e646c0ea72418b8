//! Order lifecycle errors.

use thiserror::Error;

use super::value_objects::OrderStatus;

/// Errors raised by the order aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Invalid state transition attempted.
    #[error("Invalid order transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current order status.
        from: OrderStatus,
        /// Attempted status.
        to: OrderStatus,
    },

    /// Fill quantity exceeds remaining quantity.
    #[error("Fill of {fill_qty} exceeds remaining {remaining_qty}")]
    FillExceedsRemaining {
        /// Fill quantity attempted.
        fill_qty: u32,
        /// Remaining quantity.
        remaining_qty: u32,
    },

    /// Order cannot be cancelled in its current state.
    #[error("Order in status {status} cannot be cancelled")]
    CannotCancel {
        /// Current status.
        status: OrderStatus,
    },

    /// Invalid order parameters.
    #[error("Invalid value for '{field}': {message}")]
    InvalidParameters {
        /// Field with invalid value.
        field: String,
        /// Error message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_error_display() {
        let err = OrderError::InvalidStateTransition {
            from: OrderStatus::Filled,
            to: OrderStatus::Open,
        };
        assert_eq!(format!("{err}"), "Invalid order transition: FILLED -> OPEN");

        let err = OrderError::FillExceedsRemaining {
            fill_qty: 7,
            remaining_qty: 3,
        };
        assert!(format!("{err}").contains("7"));
        assert!(format!("{err}").contains("3"));
    }
}
