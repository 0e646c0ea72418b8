//! Market-Data Events
//!
//! Events appended to the transactional outbox alongside the state
//! changes they describe.

mod market_event;

pub use market_event::{
    BookChangedPayload, MarketEvent, MarketEventBody, OrderAcceptedPayload, OrderCancelledPayload,
    OrderExpiredPayload, TradeExecutedPayload,
};
