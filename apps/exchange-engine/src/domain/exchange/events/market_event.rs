//! Market-data event envelope and payloads.
//!
//! An event is only ever appended in the same transaction as the state
//! change it describes; a separate publisher drains the outbox.

use serde::{Deserialize, Serialize};

use crate::domain::exchange::aggregate::Order;
use crate::domain::exchange::trade::Trade;
use crate::domain::exchange::value_objects::{CancelCause, OrderType, Side};
use crate::domain::shared::{Cents, OrderId, Quantity, Symbol, Timestamp, TraderId};

/// A market-data event bound for the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEvent {
    /// Symbol the event concerns.
    pub symbol: Symbol,
    /// Typed payload.
    pub body: MarketEventBody,
}

/// Event payloads; the wire form is the bare payload object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarketEventBody {
    /// Shares changed hands.
    TradeExecuted(TradeExecutedPayload),
    /// An order was accepted onto the book.
    OrderAccepted(OrderAcceptedPayload),
    /// An order was cancelled.
    OrderCancelled(OrderCancelledPayload),
    /// An order was retired by the expiration scheduler.
    OrderExpired(OrderExpiredPayload),
    /// The resting book changed shape.
    BookChanged(BookChangedPayload),
}

/// Payload for `TRADE_EXECUTED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeExecutedPayload {
    /// Symbol traded.
    pub symbol: Symbol,
    /// Trade ID.
    pub trade_id: String,
    /// Execution price.
    pub price_in_cents: Cents,
    /// Shares exchanged.
    pub quantity: Quantity,
    /// Buying trader.
    pub buyer_id: TraderId,
    /// Selling trader.
    pub seller_id: TraderId,
    /// Resting order.
    pub maker_order_id: OrderId,
    /// Incoming order.
    pub taker_order_id: OrderId,
    /// Execution timestamp.
    pub executed_at: Timestamp,
}

/// Payload for `ORDER_ACCEPTED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAcceptedPayload {
    /// Order ID.
    pub order_id: OrderId,
    /// Symbol.
    pub symbol: Symbol,
    /// Side.
    pub side: Side,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: OrderType,
    /// Requested quantity.
    pub quantity: Quantity,
    /// Limit price, when priced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price_in_cents: Option<Cents>,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

/// Payload for `ORDER_CANCELLED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelledPayload {
    /// Order ID.
    pub order_id: OrderId,
    /// Why the order came off the book.
    pub reason: CancelCause,
}

/// Payload for `ORDER_EXPIRED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExpiredPayload {
    /// Order ID.
    pub order_id: OrderId,
}

/// Payload for `BOOK_CHANGED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookChangedPayload {
    /// Symbol.
    pub symbol: Symbol,
    /// Best bid after the change, if any.
    pub best_bid: Option<Cents>,
    /// Best ask after the change, if any.
    pub best_ask: Option<Cents>,
}

impl MarketEvent {
    /// Event for an executed trade.
    #[must_use]
    pub fn trade_executed(trade: &Trade) -> Self {
        Self {
            symbol: trade.symbol.clone(),
            body: MarketEventBody::TradeExecuted(TradeExecutedPayload {
                symbol: trade.symbol.clone(),
                trade_id: trade.trade_id.as_str().to_string(),
                price_in_cents: trade.price_in_cents,
                quantity: trade.quantity,
                buyer_id: trade.buyer_id.clone(),
                seller_id: trade.seller_id.clone(),
                maker_order_id: trade.maker_order_id.clone(),
                taker_order_id: trade.taker_order_id.clone(),
                executed_at: trade.executed_at,
            }),
        }
    }

    /// Event for an order accepted onto the book.
    #[must_use]
    pub fn order_accepted(order: &Order) -> Self {
        Self {
            symbol: order.symbol().clone(),
            body: MarketEventBody::OrderAccepted(OrderAcceptedPayload {
                order_id: order.id().clone(),
                symbol: order.symbol().clone(),
                side: order.side(),
                order_type: order.order_type(),
                quantity: order.quantity(),
                limit_price_in_cents: order.limit_price(),
                created_at: order.created_at(),
            }),
        }
    }

    /// Event for a cancelled order.
    #[must_use]
    pub fn order_cancelled(symbol: Symbol, order_id: OrderId, reason: CancelCause) -> Self {
        Self {
            symbol,
            body: MarketEventBody::OrderCancelled(OrderCancelledPayload { order_id, reason }),
        }
    }

    /// Event for an expired order.
    #[must_use]
    pub fn order_expired(symbol: Symbol, order_id: OrderId) -> Self {
        Self {
            symbol,
            body: MarketEventBody::OrderExpired(OrderExpiredPayload { order_id }),
        }
    }

    /// Event for a change to the resting book.
    #[must_use]
    pub fn book_changed(symbol: Symbol, best_bid: Option<Cents>, best_ask: Option<Cents>) -> Self {
        Self {
            symbol: symbol.clone(),
            body: MarketEventBody::BookChanged(BookChangedPayload {
                symbol,
                best_bid,
                best_ask,
            }),
        }
    }

    /// Stable event-type token for the outbox row.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match &self.body {
            MarketEventBody::TradeExecuted(_) => "TRADE_EXECUTED",
            MarketEventBody::OrderAccepted(_) => "ORDER_ACCEPTED",
            MarketEventBody::OrderCancelled(_) => "ORDER_CANCELLED",
            MarketEventBody::OrderExpired(_) => "ORDER_EXPIRED",
            MarketEventBody::BookChanged(_) => "BOOK_CHANGED",
        }
    }

    /// Serialize the payload object for storage.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exchange::aggregate::OrderDraft;
    use crate::domain::shared::Quantity;

    fn sample_trade() -> Trade {
        Trade::new(
            Symbol::new("@X"),
            Cents::new(500),
            Quantity::new(10),
            OrderId::new("b1"),
            OrderId::new("s1"),
            TraderId::new("t1"),
            TraderId::new("t2"),
            OrderId::new("s1"),
            OrderId::new("b1"),
            Timestamp::parse("2026-07-01T12:00:00Z").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn trade_executed_payload_shape() {
        let event = MarketEvent::trade_executed(&sample_trade());
        assert_eq!(event.event_type(), "TRADE_EXECUTED");

        let json: serde_json::Value =
            serde_json::from_str(&event.payload_json().unwrap()).unwrap();
        assert_eq!(json["symbol"], "@X");
        assert_eq!(json["price_in_cents"], 500);
        assert_eq!(json["quantity"], 10);
        assert_eq!(json["buyer_id"], "t1");
        assert_eq!(json["seller_id"], "t2");
        assert_eq!(json["maker_order_id"], "s1");
        assert_eq!(json["taker_order_id"], "b1");
    }

    #[test]
    fn order_accepted_payload_uses_type_key_and_omits_missing_price() {
        let order = Order::accept(
            OrderDraft {
                trader_id: TraderId::new("t1"),
                symbol: Symbol::new("@X"),
                side: Side::Buy,
                order_type: OrderType::Limit,
                quantity: Quantity::new(10),
                limit_price: Some(Cents::new(500)),
                tif_seconds: None,
            },
            1,
            Timestamp::now(),
        );
        let event = MarketEvent::order_accepted(&order);
        assert_eq!(event.event_type(), "ORDER_ACCEPTED");

        let json: serde_json::Value =
            serde_json::from_str(&event.payload_json().unwrap()).unwrap();
        assert_eq!(json["type"], "LIMIT");
        assert_eq!(json["side"], "BUY");
        assert_eq!(json["limit_price_in_cents"], 500);
    }

    #[test]
    fn order_cancelled_payload_carries_reason() {
        let event = MarketEvent::order_cancelled(
            Symbol::new("@X"),
            OrderId::new("o1"),
            CancelCause::Requested,
        );
        assert_eq!(event.event_type(), "ORDER_CANCELLED");

        let json: serde_json::Value =
            serde_json::from_str(&event.payload_json().unwrap()).unwrap();
        assert_eq!(json["order_id"], "o1");
        assert_eq!(json["reason"], "REQUESTED");
    }

    #[test]
    fn order_expired_payload_is_minimal() {
        let event = MarketEvent::order_expired(Symbol::new("@X"), OrderId::new("o1"));
        assert_eq!(event.event_type(), "ORDER_EXPIRED");

        let json: serde_json::Value =
            serde_json::from_str(&event.payload_json().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({ "order_id": "o1" }));
    }

    #[test]
    fn book_changed_payload_carries_best_prices() {
        let event =
            MarketEvent::book_changed(Symbol::new("@X"), Some(Cents::new(490)), None);
        assert_eq!(event.event_type(), "BOOK_CHANGED");

        let json: serde_json::Value =
            serde_json::from_str(&event.payload_json().unwrap()).unwrap();
        assert_eq!(json["best_bid"], 490);
        assert_eq!(json["best_ask"], serde_json::Value::Null);
    }
}
