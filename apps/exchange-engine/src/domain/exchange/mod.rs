//! Exchange Bounded Context
//!
//! Order lifecycle, executed trades, and the market-data events the
//! matching engine publishes through the transactional outbox.

pub mod aggregate;
pub mod errors;
pub mod events;
pub mod trade;
pub mod value_objects;

pub use aggregate::{Order, OrderDraft};
pub use errors::OrderError;
pub use events::MarketEvent;
pub use trade::Trade;
pub use value_objects::{
    CancelCause, CancelOutcome, Fill, OrderStatus, OrderType, RejectReason, Side,
};
