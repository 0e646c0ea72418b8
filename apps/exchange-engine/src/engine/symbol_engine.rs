//! Per-symbol matching engine.
//!
//! A single-writer consumer of the symbol's intent queue. Exactly one
//! intent is processed at a time per symbol; different symbols run in
//! parallel. Each submit runs validate -> transact (reserve, insert,
//! plan, settle, residual) -> commit, and only after the commit does
//! the in-memory book mutate. The store defines truth; the book never
//! diverges from committed state.
//!
//! Transient store failures retry the whole transaction with backoff
//! (re-planning is safe because nothing in memory changed). Integrity
//! failures halt this symbol's engine; other symbols keep running.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::domain::exchange::aggregate::{Order, OrderDraft};
use crate::domain::exchange::value_objects::{
    CancelCause, CancelOutcome, Fill, OrderType, RejectReason, Side,
};
use crate::domain::exchange::MarketEvent;
use crate::domain::shared::{Cents, OrderId, Quantity, Symbol, Timestamp, TraderId};
use crate::engine::book::{Book, IncomingOrder, MatchPlan, RestingOrder};
use crate::engine::intent::{CancelReply, EngineIntent, SnapshotReply, SubmitReply, SubmitRequest};
use crate::store::{
    LedgerError, LedgerStore, OrderStore, OutboxStore, RetryPolicy, Sequencer, Settlement,
    SettlementError, Store, StoreError, Tx,
};

/// Intent-processing failure, classified by how the engine reacts.
enum IntentError {
    /// Client error: reply synchronously, persist nothing.
    Reject(RejectReason),
    /// Worth retrying the whole transaction.
    Transient(String),
    /// Reply `INTERNAL` and drop the intent.
    Internal(String),
    /// Invariant violation: reply `INTERNAL` and halt this engine.
    Fatal(String),
}

impl From<StoreError> for IntentError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            Self::Transient(err.to_string())
        } else if matches!(err, StoreError::Integrity(_)) {
            Self::Fatal(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<LedgerError> for IntentError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCash { .. } => Self::Reject(RejectReason::InsufficientCash),
            LedgerError::InsufficientShares { .. } => {
                Self::Reject(RejectReason::InsufficientShares)
            }
            LedgerError::UnknownTrader(_) | LedgerError::InactiveTrader(_) => {
                Self::Reject(RejectReason::InactiveTrader)
            }
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<SettlementError> for IntentError {
    fn from(err: SettlementError) -> Self {
        match err {
            // Resources were reserved up front; running out mid-settle
            // means persistent state is inconsistent.
            SettlementError::Order(e) => Self::Fatal(e.to_string()),
            SettlementError::Ledger(LedgerError::Store(e)) => e.into(),
            SettlementError::Ledger(e) => Self::Fatal(e.to_string()),
            SettlementError::Store(e) => e.into(),
        }
    }
}

/// Everything a committed submit needs to finish up in memory.
struct SubmitOutcome {
    reply: SubmitReply,
    plan: MatchPlan,
    resting: Option<(Side, Cents, RestingOrder)>,
    last_price: Option<Cents>,
}

/// Outcome of a committed cancel.
struct CancelAction {
    outcome: CancelOutcome,
    remove_from_book: bool,
}

/// One symbol's matching engine.
pub struct SymbolEngine {
    symbol: Symbol,
    book: Book,
    store: Arc<Store>,
    ledger: LedgerStore,
    orders: OrderStore,
    sequencer: Sequencer,
    outbox: OutboxStore,
    settlement: Settlement,
    retry: RetryPolicy,
    slippage_cushion: Decimal,
    last_trade_price: Option<Cents>,
    rx: mpsc::Receiver<EngineIntent>,
    halted: bool,
}

impl SymbolEngine {
    /// Create an engine around a recovered book.
    #[must_use]
    pub fn new(
        symbol: Symbol,
        store: Arc<Store>,
        retry: RetryPolicy,
        slippage_cushion: Decimal,
        book: Book,
        last_trade_price: Option<Cents>,
        rx: mpsc::Receiver<EngineIntent>,
    ) -> Self {
        Self {
            symbol,
            book,
            store,
            ledger: LedgerStore::new(),
            orders: OrderStore::new(),
            sequencer: Sequencer::new(),
            outbox: OutboxStore::new(),
            settlement: Settlement::new(),
            retry,
            slippage_cushion,
            last_trade_price,
            rx,
            halted: false,
        }
    }

    /// Consume intents until shutdown, queue closure, or a halt.
    pub async fn run(mut self) {
        info!(symbol = %self.symbol, resting = self.book.len(), "Matching engine started");
        while let Some(intent) = self.rx.recv().await {
            match intent {
                EngineIntent::Submit { request, reply } => {
                    let out = self.handle_submit(request).await;
                    let _ = reply.send(out);
                }
                EngineIntent::Cancel {
                    order_id,
                    requested_by,
                    cause,
                    reply,
                } => {
                    let out = self.handle_cancel(&order_id, requested_by.as_ref(), cause).await;
                    let _ = reply.send(out);
                }
                EngineIntent::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot_reply());
                }
                EngineIntent::Shutdown => {
                    info!(symbol = %self.symbol, "Matching engine shutting down");
                    break;
                }
            }
            if self.halted {
                error!(
                    symbol = %self.symbol,
                    "Matching engine halted after invariant violation; symbol is offline"
                );
                break;
            }
        }
        info!(symbol = %self.symbol, "Matching engine stopped");
    }

    async fn handle_submit(&mut self, request: SubmitRequest) -> SubmitReply {
        if let Some(deadline) = request.deadline
            && Instant::now() >= deadline
        {
            debug!(symbol = %self.symbol, trader_id = %request.trader_id, "Intent expired in queue");
            return SubmitReply::rejected(RejectReason::Timeout);
        }

        let draft = OrderDraft {
            trader_id: request.trader_id,
            symbol: request.symbol,
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            limit_price: request.limit_price,
            tif_seconds: request.tif_seconds,
        };
        if let Err(reason) = draft.validate() {
            debug!(symbol = %self.symbol, %reason, "Submit rejected at validation");
            return SubmitReply::rejected(reason);
        }

        let mut schedule = self.retry.schedule();
        loop {
            match self.submit_once(&draft).await {
                Ok(outcome) => {
                    self.finish_submit(&outcome);
                    return outcome.reply;
                }
                Err(IntentError::Reject(reason)) => {
                    debug!(symbol = %self.symbol, trader_id = %draft.trader_id, %reason, "Submit rejected");
                    return SubmitReply::rejected(reason);
                }
                Err(IntentError::Transient(message)) => match schedule.next_delay() {
                    Some(delay) => {
                        warn!(
                            symbol = %self.symbol,
                            attempt = schedule.attempts_made(),
                            delay_ms = delay.as_millis() as u64,
                            message,
                            "Transient store failure; retrying submit"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(symbol = %self.symbol, message, "Submit retries exhausted");
                        return SubmitReply::rejected(RejectReason::Internal);
                    }
                },
                Err(IntentError::Internal(message)) => {
                    error!(symbol = %self.symbol, message, "Submit failed");
                    return SubmitReply::rejected(RejectReason::Internal);
                }
                Err(IntentError::Fatal(message)) => {
                    error!(symbol = %self.symbol, message, "Invariant violation during submit");
                    self.halted = true;
                    return SubmitReply::rejected(RejectReason::Internal);
                }
            }
        }
    }

    async fn submit_once(&self, draft: &OrderDraft) -> Result<SubmitOutcome, IntentError> {
        let now = Timestamp::now();
        let tx = self.store.begin().await.map_err(IntentError::from)?;
        match self.submit_in_tx(&tx, draft, now).await {
            Ok(outcome) => {
                tx.commit().await.map_err(IntentError::from)?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    debug!(symbol = %self.symbol, %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    async fn submit_in_tx(
        &self,
        tx: &Tx,
        draft: &OrderDraft,
        now: Timestamp,
    ) -> Result<SubmitOutcome, IntentError> {
        let account = self.ledger.require_active(tx, &draft.trader_id).await?;

        // Reserve resources before the order exists.
        let mut unpriced_reserve: Option<Cents> = None;
        let mut cash_cap: Option<Cents> = None;
        match draft.side {
            Side::Buy => {
                if let Some(limit) = draft.limit_price {
                    self.ledger
                        .reserve_cash(tx, &draft.trader_id, limit.times(draft.quantity.as_u32()))
                        .await?;
                } else {
                    // Market (or unpriced IOC) buy: worst-case estimate
                    // with the slippage cushion, capped at available
                    // cash for non-admins.
                    let best_ask = self
                        .book
                        .best_ask()
                        .ok_or(IntentError::Reject(RejectReason::NoLiquidity))?;
                    let estimate = self.cushioned_estimate(draft.quantity, best_ask);
                    let mut amount = if account.admin {
                        estimate
                    } else {
                        estimate.min(account.available_cash())
                    };
                    if amount.is_negative() {
                        amount = Cents::ZERO;
                    }
                    if amount.is_positive() {
                        self.ledger.reserve_cash(tx, &draft.trader_id, amount).await?;
                    }
                    unpriced_reserve = Some(amount);
                    cash_cap = Some(amount);
                }
            }
            Side::Sell => {
                self.ledger
                    .reserve_shares(tx, &draft.trader_id, &self.symbol, draft.quantity)
                    .await?;
            }
        }

        let sequence = self.sequencer.next(tx, &self.symbol).await?;
        let mut taker = Order::accept(draft.clone(), sequence, now);
        self.orders.insert(tx, &taker).await?;

        // Simulate against the book; nothing in memory mutates yet.
        let incoming = IncomingOrder {
            trader_id: draft.trader_id.clone(),
            side: draft.side,
            order_type: draft.order_type,
            quantity: draft.quantity,
            limit_price: draft.limit_price,
            cash_cap,
        };
        let plan = self.book.plan(&incoming);

        let mut fills = Vec::with_capacity(plan.fills.len());
        let mut spent = Cents::ZERO;
        let mut last_price = None;
        for planned in &plan.fills {
            let mut maker = self
                .orders
                .find(tx, &planned.maker_order_id)
                .await?
                .ok_or_else(|| {
                    IntentError::Fatal(format!(
                        "Maker {} present in book but missing from store",
                        planned.maker_order_id
                    ))
                })?;
            self.settlement
                .settle_fill(
                    tx,
                    &mut taker,
                    &mut maker,
                    planned.quantity,
                    planned.price_in_cents,
                    now,
                )
                .await?;
            fills.push(Fill::new(
                planned.maker_order_id.clone(),
                planned.quantity,
                planned.price_in_cents,
            ));
            spent += planned.price_in_cents.times(planned.quantity.as_u32());
            last_price = Some(planned.price_in_cents);
        }

        // Residual handling decides the taker's final state.
        let mut resting_at: Option<Cents> = None;
        if !taker.remaining().is_zero() {
            match draft.order_type {
                OrderType::Limit => {
                    if taker.filled_quantity().is_zero() {
                        taker
                            .rest()
                            .map_err(|e| IntentError::Fatal(e.to_string()))?;
                    }
                    let price = draft
                        .limit_price
                        .ok_or_else(|| IntentError::Fatal("Resting order without a price".into()))?;
                    resting_at = Some(price);
                    self.outbox
                        .append(tx, &MarketEvent::order_accepted(&taker))
                        .await?;
                }
                OrderType::Ioc => {
                    let remaining = taker.remaining();
                    taker
                        .cancel(CancelCause::ImmediateOrCancel)
                        .map_err(|e| IntentError::Fatal(e.to_string()))?;
                    match draft.side {
                        Side::Buy => {
                            if let Some(limit) = draft.limit_price {
                                self.ledger
                                    .release_cash(
                                        tx,
                                        &draft.trader_id,
                                        limit.times(remaining.as_u32()),
                                    )
                                    .await?;
                            }
                        }
                        Side::Sell => {
                            self.ledger
                                .release_shares(tx, &draft.trader_id, &self.symbol, remaining)
                                .await?;
                        }
                    }
                    self.outbox
                        .append(
                            tx,
                            &MarketEvent::order_cancelled(
                                self.symbol.clone(),
                                taker.id().clone(),
                                CancelCause::ImmediateOrCancel,
                            ),
                        )
                        .await?;
                }
                OrderType::Market => {
                    let remaining = taker.remaining();
                    taker
                        .cancel(CancelCause::NoLiquidity)
                        .map_err(|e| IntentError::Fatal(e.to_string()))?;
                    if draft.side == Side::Sell {
                        self.ledger
                            .release_shares(tx, &draft.trader_id, &self.symbol, remaining)
                            .await?;
                    }
                    self.outbox
                        .append(
                            tx,
                            &MarketEvent::order_cancelled(
                                self.symbol.clone(),
                                taker.id().clone(),
                                CancelCause::NoLiquidity,
                            ),
                        )
                        .await?;
                }
            }
        }

        // An unpriced buy reserved a lump estimate; whatever the fills
        // did not spend goes back, filled or not.
        if let Some(initial) = unpriced_reserve {
            self.ledger
                .release_cash(tx, &draft.trader_id, initial - spent)
                .await?;
        }

        self.orders
            .update_status(tx, taker.id(), taker.status(), taker.filled_quantity())
            .await?;

        if !plan.fills.is_empty() || resting_at.is_some() {
            let (best_bid, best_ask) = self
                .book
                .best_prices_after(&plan, resting_at.map(|p| (draft.side, p)));
            self.outbox
                .append(
                    tx,
                    &MarketEvent::book_changed(self.symbol.clone(), best_bid, best_ask),
                )
                .await?;
        }

        let resting = resting_at.map(|price| {
            (
                draft.side,
                price,
                RestingOrder {
                    order_id: taker.id().clone(),
                    trader_id: draft.trader_id.clone(),
                    remaining: taker.remaining(),
                    sequence,
                },
            )
        });

        Ok(SubmitOutcome {
            reply: SubmitReply::accepted(taker.id().clone(), taker.status(), fills),
            plan,
            resting,
            last_price,
        })
    }

    /// Apply a committed submit to the in-memory book.
    fn finish_submit(&mut self, outcome: &SubmitOutcome) {
        if !self.book.apply(&outcome.plan) {
            error!(
                symbol = %self.symbol,
                "Book diverged from committed plan; halting engine"
            );
            self.halted = true;
            return;
        }
        if let Some((side, price, resting)) = &outcome.resting {
            self.book.add(*side, *price, resting.clone());
        }
        if let Some(price) = outcome.last_price {
            self.last_trade_price = Some(price);
        }
    }

    async fn handle_cancel(
        &mut self,
        order_id: &OrderId,
        requested_by: Option<&TraderId>,
        cause: CancelCause,
    ) -> CancelReply {
        let mut schedule = self.retry.schedule();
        loop {
            match self.cancel_once(order_id, requested_by, cause).await {
                Ok(action) => {
                    if action.remove_from_book {
                        self.book.cancel(order_id);
                    }
                    return CancelReply {
                        outcome: action.outcome,
                    };
                }
                Err(IntentError::Reject(_)) => {
                    // Cancel has no client rejections; treat as unknown.
                    return CancelReply {
                        outcome: CancelOutcome::Unknown,
                    };
                }
                Err(IntentError::Transient(message)) => match schedule.next_delay() {
                    Some(delay) => {
                        warn!(
                            symbol = %self.symbol,
                            order_id = %order_id,
                            attempt = schedule.attempts_made(),
                            message,
                            "Transient store failure; retrying cancel"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(symbol = %self.symbol, order_id = %order_id, message, "Cancel retries exhausted");
                        return CancelReply {
                            outcome: CancelOutcome::Unknown,
                        };
                    }
                },
                Err(IntentError::Internal(message)) => {
                    error!(symbol = %self.symbol, order_id = %order_id, message, "Cancel failed");
                    return CancelReply {
                        outcome: CancelOutcome::Unknown,
                    };
                }
                Err(IntentError::Fatal(message)) => {
                    error!(symbol = %self.symbol, order_id = %order_id, message, "Invariant violation during cancel");
                    self.halted = true;
                    return CancelReply {
                        outcome: CancelOutcome::Unknown,
                    };
                }
            }
        }
    }

    async fn cancel_once(
        &self,
        order_id: &OrderId,
        requested_by: Option<&TraderId>,
        cause: CancelCause,
    ) -> Result<CancelAction, IntentError> {
        let tx = self.store.begin().await.map_err(IntentError::from)?;
        match self.cancel_in_tx(&tx, order_id, requested_by, cause).await {
            Ok(action) => {
                tx.commit().await.map_err(IntentError::from)?;
                Ok(action)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    debug!(symbol = %self.symbol, %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn cancel_in_tx(
        &self,
        tx: &Tx,
        order_id: &OrderId,
        requested_by: Option<&TraderId>,
        cause: CancelCause,
    ) -> Result<CancelAction, IntentError> {
        let Some(mut order) = self.orders.find(tx, order_id).await? else {
            return Ok(CancelAction {
                outcome: CancelOutcome::Unknown,
                remove_from_book: false,
            });
        };
        if let Some(requester) = requested_by
            && requester != order.trader_id()
        {
            return Ok(CancelAction {
                outcome: CancelOutcome::Unknown,
                remove_from_book: false,
            });
        }
        if order.symbol() != &self.symbol {
            warn!(symbol = %self.symbol, order_id = %order_id, "Cancel routed to wrong symbol");
            return Ok(CancelAction {
                outcome: CancelOutcome::Unknown,
                remove_from_book: false,
            });
        }
        if order.is_terminal() {
            return Ok(CancelAction {
                outcome: CancelOutcome::AlreadyTerminal,
                remove_from_book: false,
            });
        }
        if !order.status().is_resting() {
            warn!(symbol = %self.symbol, order_id = %order_id, status = %order.status(), "Cancel target is not resting");
            return Ok(CancelAction {
                outcome: CancelOutcome::Unknown,
                remove_from_book: false,
            });
        }

        order
            .cancel(cause)
            .map_err(|e| IntentError::Fatal(e.to_string()))?;

        // Give the residual reservation back.
        match order.side() {
            Side::Buy => {
                let residual = order.residual_cash_reservation();
                self.ledger
                    .release_cash(tx, order.trader_id(), residual)
                    .await?;
            }
            Side::Sell => {
                self.ledger
                    .release_shares(
                        tx,
                        order.trader_id(),
                        &self.symbol,
                        order.residual_share_reservation(),
                    )
                    .await?;
            }
        }

        self.orders
            .update_status(tx, order.id(), order.status(), order.filled_quantity())
            .await?;

        let event = if cause == CancelCause::Expired {
            MarketEvent::order_expired(self.symbol.clone(), order.id().clone())
        } else {
            MarketEvent::order_cancelled(self.symbol.clone(), order.id().clone(), cause)
        };
        self.outbox.append(tx, &event).await?;

        let (best_bid, best_ask) = self.book.best_prices_without(order_id);
        self.outbox
            .append(
                tx,
                &MarketEvent::book_changed(self.symbol.clone(), best_bid, best_ask),
            )
            .await?;

        Ok(CancelAction {
            outcome: CancelOutcome::Cancelled,
            remove_from_book: true,
        })
    }

    fn snapshot_reply(&self) -> SnapshotReply {
        SnapshotReply {
            book: self.book.snapshot(),
            last_price_in_cents: self.last_trade_price,
            timestamp: Timestamp::now(),
        }
    }

    /// Worst-case cash estimate for an unpriced buy: quantity times the
    /// best ask, padded by the slippage cushion, ceiled to whole cents.
    fn cushioned_estimate(&self, quantity: Quantity, best_ask: Cents) -> Cents {
        let notional = Decimal::from(best_ask.amount()) * Decimal::from(quantity.as_u32());
        let padded = (notional * self.slippage_cushion).ceil();
        Cents::new(padded.to_i64().unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn engine_for(symbol: &str, store: Arc<Store>) -> SymbolEngine {
        let sequencer = Sequencer::new();
        sequencer
            .ensure_symbol(&store, &Symbol::new(symbol))
            .await
            .unwrap();
        let (_tx, rx) = mpsc::channel(8);
        SymbolEngine::new(
            Symbol::new(symbol),
            store,
            RetryPolicy::default(),
            dec!(1.10),
            Book::new(),
            None,
            rx,
        )
    }

    fn submit(trader: &str, side: Side, order_type: OrderType, qty: u32, price: Option<i64>) -> SubmitRequest {
        SubmitRequest {
            trader_id: TraderId::new(trader),
            symbol: Symbol::new("@X"),
            side,
            order_type,
            quantity: Quantity::new(qty),
            limit_price: price.map(Cents::new),
            tif_seconds: None,
            deadline: None,
        }
    }

    #[tokio::test]
    async fn elapsed_deadline_times_out_without_touching_the_store() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let mut engine = engine_for("@X", Arc::clone(&store)).await;

        let mut request = submit("t1", Side::Buy, OrderType::Limit, 10, Some(500));
        request.deadline = Some(Instant::now() - std::time::Duration::from_millis(1));
        let reply = engine.handle_submit(request).await;
        assert_eq!(reply.rejection_reason, Some(RejectReason::Timeout));
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected_before_any_transaction() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let mut engine = engine_for("@X", Arc::clone(&store)).await;

        let reply = engine
            .handle_submit(submit("t1", Side::Buy, OrderType::Market, 10, Some(500)))
            .await;
        assert_eq!(reply.rejection_reason, Some(RejectReason::InvalidPrice));

        let reply = engine
            .handle_submit(submit("t1", Side::Buy, OrderType::Limit, 0, Some(500)))
            .await;
        assert_eq!(reply.rejection_reason, Some(RejectReason::InvalidQuantity));
    }

    #[tokio::test]
    async fn unknown_trader_is_rejected_as_inactive() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let mut engine = engine_for("@X", Arc::clone(&store)).await;

        let reply = engine
            .handle_submit(submit("ghost", Side::Buy, OrderType::Limit, 10, Some(500)))
            .await;
        assert_eq!(reply.rejection_reason, Some(RejectReason::InactiveTrader));
    }

    #[tokio::test]
    async fn market_buy_against_empty_book_has_no_liquidity() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let ledger = LedgerStore::new();
        let tx = store.begin().await.unwrap();
        ledger
            .open_account(&tx, &TraderId::new("t1"), false, Cents::new(100_000))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut engine = engine_for("@X", Arc::clone(&store)).await;
        let reply = engine
            .handle_submit(submit("t1", Side::Buy, OrderType::Market, 10, None))
            .await;
        assert_eq!(reply.rejection_reason, Some(RejectReason::NoLiquidity));

        // Nothing persisted: no orders, no reservations.
        let account = ledger
            .find_account_latest(&store, &TraderId::new("t1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.reserved_cash_in_cents, Cents::ZERO);
    }

    #[tokio::test]
    async fn cancel_unknown_order_is_unknown() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let mut engine = engine_for("@X", Arc::clone(&store)).await;

        let reply = engine
            .handle_cancel(&OrderId::new("ghost"), None, CancelCause::Requested)
            .await;
        assert_eq!(reply.outcome, CancelOutcome::Unknown);
    }

    #[tokio::test]
    async fn cushioned_estimate_ceils_to_whole_cents() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let engine = engine_for("@X", store).await;

        // 5 * 510 * 1.10 = 2805 exactly.
        assert_eq!(
            engine.cushioned_estimate(Quantity::new(5), Cents::new(510)),
            Cents::new(2805)
        );
        // 3 * 333 * 1.10 = 1098.9 -> 1099.
        assert_eq!(
            engine.cushioned_estimate(Quantity::new(3), Cents::new(333)),
            Cents::new(1099)
        );
    }
}
