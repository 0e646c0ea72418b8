//! In-memory price-time-sequence order book for one symbol.
//!
//! Pure data structure, exclusively owned by the symbol's engine task.
//! Matching is split in two: [`Book::plan`] simulates against the
//! current book without touching it, and [`Book::apply`] replays a plan
//! after the store transaction commits. The persistent store defines
//! truth; the book never mutates for a plan that failed to commit.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::domain::exchange::value_objects::{OrderType, Side};
use crate::domain::shared::{Cents, OrderId, Quantity, TraderId};

/// A resting order, reduced to what matching needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestingOrder {
    /// Order ID.
    pub order_id: OrderId,
    /// Owning trader (for self-trade prevention).
    pub trader_id: TraderId,
    /// Unfilled quantity; always positive while resting.
    pub remaining: Quantity,
    /// Per-symbol sequence number (time priority).
    pub sequence: i64,
}

/// An incoming order about to be matched.
#[derive(Debug, Clone)]
pub struct IncomingOrder {
    /// Submitting trader.
    pub trader_id: TraderId,
    /// Taker side.
    pub side: Side,
    /// Order type.
    pub order_type: OrderType,
    /// Requested quantity.
    pub quantity: Quantity,
    /// Limit price; `None` crosses unconditionally.
    pub limit_price: Option<Cents>,
    /// Hard spending cap for unpriced buys (the reserved amount).
    pub cash_cap: Option<Cents>,
}

/// One planned execution slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFill {
    /// The maker matched against.
    pub maker_order_id: OrderId,
    /// The maker's owner.
    pub maker_trader_id: TraderId,
    /// Shares crossed.
    pub quantity: Quantity,
    /// Crossing price (the maker's price).
    pub price_in_cents: Cents,
}

/// Result of simulating an incoming order against the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPlan {
    /// Planned fills, best maker first.
    pub fills: Vec<PlannedFill>,
    /// Taker quantity left after the fills.
    pub remaining: Quantity,
    /// Whether the remainder should rest on the book.
    pub should_rest: bool,
}

impl MatchPlan {
    /// Total quantity crossed by the plan.
    #[must_use]
    pub fn filled_quantity(&self) -> Quantity {
        Quantity::new(self.fills.iter().map(|f| f.quantity.as_u32()).sum())
    }
}

/// Aggregated read-only view of the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// Resting buy quantity per price.
    pub bids: BTreeMap<i64, u32>,
    /// Resting sell quantity per price.
    pub asks: BTreeMap<i64, u32>,
    /// Best bid, if any.
    pub best_bid: Option<Cents>,
    /// Best ask, if any.
    pub best_ask: Option<Cents>,
    /// Quantity resting at the best bid.
    pub bid_size: Option<u32>,
    /// Quantity resting at the best ask.
    pub ask_size: Option<u32>,
}

/// Price-time-sequence order book.
///
/// Each side maps price to a FIFO level; buys iterate descending,
/// sells ascending; within a level, insertion order is sequence order.
/// Every resting order has positive remaining quantity.
#[derive(Debug, Default)]
pub struct Book {
    bids: BTreeMap<i64, VecDeque<RestingOrder>>,
    asks: BTreeMap<i64, VecDeque<RestingOrder>>,
    index: HashMap<OrderId, (Side, i64)>,
}

impl Book {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resting orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the book holds no resting orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Insert a resting order at the tail of its price level.
    pub fn add(&mut self, side: Side, price: Cents, order: RestingOrder) {
        debug_assert!(!order.remaining.is_zero());
        self.index
            .insert(order.order_id.clone(), (side, price.amount()));
        self.side_mut(side)
            .entry(price.amount())
            .or_default()
            .push_back(order);
    }

    /// Remove a resting order. No-op when absent.
    pub fn cancel(&mut self, order_id: &OrderId) -> Option<RestingOrder> {
        let (side, price) = self.index.remove(order_id)?;
        let levels = self.side_mut(side);
        let level = levels.get_mut(&price)?;
        let pos = level.iter().position(|o| &o.order_id == order_id)?;
        let removed = level.remove(pos);
        if level.is_empty() {
            levels.remove(&price);
        }
        removed
    }

    /// Best (highest) bid price.
    #[must_use]
    pub fn best_bid(&self) -> Option<Cents> {
        self.bids.keys().next_back().copied().map(Cents::new)
    }

    /// Best (lowest) ask price.
    #[must_use]
    pub fn best_ask(&self) -> Option<Cents> {
        self.asks.keys().next().copied().map(Cents::new)
    }

    /// First resting order on a side, by price-time-sequence priority.
    #[must_use]
    pub fn peek_best(&self, side: Side) -> Option<&RestingOrder> {
        match side {
            Side::Buy => self.bids.values().next_back().and_then(VecDeque::front),
            Side::Sell => self.asks.values().next().and_then(VecDeque::front),
        }
    }

    /// Simulate matching an incoming order. The book is not mutated.
    ///
    /// Walks eligible makers best price first, sequence order within a
    /// level. Makers owned by the taker are skipped in place (self-
    /// trade prevention) and keep their priority. Priced takers stop at
    /// their limit; unpriced buys stop when the cash cap can no longer
    /// afford a single share at the current level.
    #[must_use]
    pub fn plan(&self, incoming: &IncomingOrder) -> MatchPlan {
        let mut fills = Vec::new();
        let mut remaining = incoming.quantity;
        let mut cash_left = incoming.cash_cap;

        let opposite: Box<dyn Iterator<Item = (&i64, &VecDeque<RestingOrder>)>> =
            match incoming.side {
                Side::Buy => Box::new(self.asks.iter()),
                Side::Sell => Box::new(self.bids.iter().rev()),
            };

        'levels: for (&price_cents, level) in opposite {
            if remaining.is_zero() {
                break;
            }
            let price = Cents::new(price_cents);
            if let Some(limit) = incoming.limit_price {
                let crossable = match incoming.side {
                    Side::Buy => price <= limit,
                    Side::Sell => price >= limit,
                };
                if !crossable {
                    break;
                }
            }

            for maker in level {
                if remaining.is_zero() {
                    break 'levels;
                }
                if maker.trader_id == incoming.trader_id {
                    continue;
                }

                let mut qty = maker.remaining.min(remaining);
                if let Some(cap) = cash_left {
                    let affordable = (cap.amount() / price.amount()).max(0) as u32;
                    if affordable == 0 {
                        // Deeper levels only get more expensive.
                        break 'levels;
                    }
                    qty = qty.min(Quantity::new(affordable));
                }
                if qty.is_zero() {
                    continue;
                }

                fills.push(PlannedFill {
                    maker_order_id: maker.order_id.clone(),
                    maker_trader_id: maker.trader_id.clone(),
                    quantity: qty,
                    price_in_cents: price,
                });
                remaining = remaining.saturating_sub(qty);
                if let Some(cap) = cash_left {
                    cash_left = Some(cap - price.times(qty.as_u32()));
                }
            }
        }

        MatchPlan {
            should_rest: !remaining.is_zero() && incoming.order_type.may_rest(),
            fills,
            remaining,
        }
    }

    /// Replay a committed plan against the book.
    ///
    /// Consumed makers are decremented; zero-remaining makers are
    /// removed immediately. Returns `false` if any planned maker was
    /// missing or short, which means book and store diverged.
    #[must_use]
    pub fn apply(&mut self, plan: &MatchPlan) -> bool {
        for fill in &plan.fills {
            let Some(&(side, price)) = self.index.get(&fill.maker_order_id) else {
                return false;
            };
            let levels = self.side_mut(side);
            let Some(level) = levels.get_mut(&price) else {
                return false;
            };
            let Some(pos) = level
                .iter()
                .position(|o| o.order_id == fill.maker_order_id)
            else {
                return false;
            };
            if fill.quantity > level[pos].remaining {
                return false;
            }
            level[pos].remaining = level[pos].remaining.saturating_sub(fill.quantity);
            if level[pos].remaining.is_zero() {
                let _ = level.remove(pos);
                if level.is_empty() {
                    levels.remove(&price);
                }
                self.index.remove(&fill.maker_order_id);
            }
        }
        true
    }

    /// Best bid and ask as they will look once `plan` is applied and an
    /// optional remainder rests.
    ///
    /// Outbox events describing the post-commit book are appended
    /// inside the transaction, before the book itself mutates; this
    /// computes the prices those events carry.
    #[must_use]
    pub fn best_prices_after(
        &self,
        plan: &MatchPlan,
        resting: Option<(Side, Cents)>,
    ) -> (Option<Cents>, Option<Cents>) {
        let consumed: HashMap<&OrderId, u32> = plan
            .fills
            .iter()
            .map(|f| (&f.maker_order_id, f.quantity.as_u32()))
            .collect();

        let mut best_bid = best_surviving(self.bids.iter().rev(), &consumed);
        let mut best_ask = best_surviving(self.asks.iter(), &consumed);
        match resting {
            Some((Side::Buy, price)) => {
                best_bid = Some(best_bid.map_or(price, |b| b.max(price)));
            }
            Some((Side::Sell, price)) => {
                best_ask = Some(best_ask.map_or(price, |a| a.min(price)));
            }
            None => {}
        }
        (best_bid, best_ask)
    }

    /// Best bid and ask as they will look once `order_id` is removed.
    #[must_use]
    pub fn best_prices_without(&self, order_id: &OrderId) -> (Option<Cents>, Option<Cents>) {
        let consumed: HashMap<&OrderId, u32> = self
            .index
            .get_key_value(order_id)
            .map(|(id, _)| (id, u32::MAX))
            .into_iter()
            .collect();
        (
            best_surviving(self.bids.iter().rev(), &consumed),
            best_surviving(self.asks.iter(), &consumed),
        )
    }

    /// Aggregated view of the resting book.
    #[must_use]
    pub fn snapshot(&self) -> BookSnapshot {
        let aggregate = |levels: &BTreeMap<i64, VecDeque<RestingOrder>>| {
            levels
                .iter()
                .map(|(&price, level)| {
                    (price, level.iter().map(|o| o.remaining.as_u32()).sum())
                })
                .collect::<BTreeMap<i64, u32>>()
        };
        let bids = aggregate(&self.bids);
        let asks = aggregate(&self.asks);
        let best_bid = self.best_bid();
        let best_ask = self.best_ask();
        let bid_size = best_bid.and_then(|p| bids.get(&p.amount()).copied());
        let ask_size = best_ask.and_then(|p| asks.get(&p.amount()).copied());
        BookSnapshot {
            bids,
            asks,
            best_bid,
            best_ask,
            bid_size,
            ask_size,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<i64, VecDeque<RestingOrder>> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }
}

fn best_surviving<'a>(
    levels: impl Iterator<Item = (&'a i64, &'a VecDeque<RestingOrder>)>,
    consumed: &HashMap<&OrderId, u32>,
) -> Option<Cents> {
    for (&price, level) in levels {
        for order in level {
            let eaten = consumed.get(&order.order_id).copied().unwrap_or(0);
            if order.remaining.as_u32() > eaten {
                return Some(Cents::new(price));
            }
        }
    }
    None
}
