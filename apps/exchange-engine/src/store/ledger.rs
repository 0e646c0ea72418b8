//! Ledger & position store.
//!
//! Cash balances, share positions, reservations, and the double-entry
//! ledger. Every mutation happens inside a caller-supplied transaction;
//! the two TRADE legs written by [`LedgerStore::settle_trade`] always
//! sum to zero cash and zero shares.

use thiserror::Error;
use tracing::debug;
use turso::Value;

use crate::domain::exchange::Trade;
use crate::domain::shared::{Cents, Quantity, Symbol, Timestamp, TradeId, TraderId};
use crate::store::db::{StoreError, Tx};
use crate::store::Store;

/// Ledger entry kinds.
mod kind {
    pub const TRADE_BUY: &str = "TRADE_BUY";
    pub const TRADE_SELL: &str = "TRADE_SELL";
    pub const RESERVE: &str = "RESERVE";
    pub const RELEASE: &str = "RELEASE";
    pub const ADMIN_ADJUST: &str = "ADMIN_ADJUST";
}

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Available cash cannot cover the requested reservation.
    #[error("Insufficient cash for {trader_id}: requested {requested}, available {available}")]
    InsufficientCash {
        /// Trader.
        trader_id: String,
        /// Requested reservation.
        requested: Cents,
        /// Available (balance minus reserved).
        available: Cents,
    },

    /// Available shares cannot cover the requested reservation.
    #[error(
        "Insufficient shares of {symbol} for {trader_id}: requested {requested}, available {available}"
    )]
    InsufficientShares {
        /// Trader.
        trader_id: String,
        /// Symbol.
        symbol: String,
        /// Requested share count.
        requested: u32,
        /// Available (position minus reserved).
        available: u32,
    },

    /// Trader does not exist.
    #[error("Unknown trader: {0}")]
    UnknownTrader(String),

    /// Trader exists but is deactivated.
    #[error("Inactive trader: {0}")]
    InactiveTrader(String),
}

impl LedgerError {
    /// Whether retrying the whole transaction may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }
}

/// A trader's cash account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraderAccount {
    /// Trader ID.
    pub trader_id: TraderId,
    /// Whether the trader may submit orders.
    pub active: bool,
    /// Admins bypass cash-sufficiency checks on buys.
    pub admin: bool,
    /// Cash balance.
    pub balance_in_cents: Cents,
    /// Cash earmarked against open buy orders.
    pub reserved_cash_in_cents: Cents,
    /// Account creation time.
    pub created_at: Timestamp,
}

impl TraderAccount {
    /// Cash not earmarked by open orders.
    #[must_use]
    pub fn available_cash(&self) -> Cents {
        self.balance_in_cents - self.reserved_cash_in_cents
    }
}

/// A trader's holding in one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Trader ID.
    pub trader_id: TraderId,
    /// Symbol.
    pub symbol: Symbol,
    /// Shares owned.
    pub quantity: Quantity,
    /// Shares earmarked against open sell orders.
    pub reserved_shares: Quantity,
    /// Banker's-rounded average acquisition cost.
    pub average_cost_in_cents: Cents,
}

impl Position {
    /// Shares not earmarked by open sell orders.
    #[must_use]
    pub fn available_shares(&self) -> Quantity {
        self.quantity.saturating_sub(self.reserved_shares)
    }
}

/// Repository for accounts, positions, and ledger entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerStore;

impl LedgerStore {
    /// Create the store handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Load an account inside a transaction.
    pub async fn find_account(
        &self,
        tx: &Tx,
        trader_id: &TraderId,
    ) -> Result<Option<TraderAccount>, StoreError> {
        let mut rows = tx
            .query(
                "SELECT trader_id, active, admin, balance_in_cents,
                        reserved_cash_in_cents, created_at
                 FROM trader_accounts WHERE trader_id = ?",
                vec![Value::Text(trader_id.as_str().to_string())],
            )
            .await?;
        match rows.next().await.map_err(StoreError::from)? {
            Some(row) => Ok(Some(row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Load an account outside any transaction (reads for diagnostics
    /// and tests).
    pub async fn find_account_latest(
        &self,
        store: &Store,
        trader_id: &TraderId,
    ) -> Result<Option<TraderAccount>, StoreError> {
        let conn = store.read_conn()?;
        let mut rows = conn
            .query(
                "SELECT trader_id, active, admin, balance_in_cents,
                        reserved_cash_in_cents, created_at
                 FROM trader_accounts WHERE trader_id = ?",
                vec![Value::Text(trader_id.as_str().to_string())],
            )
            .await
            .map_err(StoreError::from)?;
        match rows.next().await.map_err(StoreError::from)? {
            Some(row) => Ok(Some(row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Load an account, requiring it to exist and be active.
    pub async fn require_active(
        &self,
        tx: &Tx,
        trader_id: &TraderId,
    ) -> Result<TraderAccount, LedgerError> {
        let account = self
            .find_account(tx, trader_id)
            .await?
            .ok_or_else(|| LedgerError::UnknownTrader(trader_id.as_str().to_string()))?;
        if !account.active {
            return Err(LedgerError::InactiveTrader(trader_id.as_str().to_string()));
        }
        Ok(account)
    }

    /// Create a trader account.
    ///
    /// A non-zero opening balance is recorded as an ADMIN_ADJUST entry.
    pub async fn open_account(
        &self,
        tx: &Tx,
        trader_id: &TraderId,
        admin: bool,
        opening_balance: Cents,
    ) -> Result<(), LedgerError> {
        let now = Timestamp::now();
        tx.execute(
            "INSERT INTO trader_accounts
                (trader_id, active, admin, balance_in_cents, reserved_cash_in_cents, created_at)
             VALUES (?, 1, ?, ?, 0, ?)",
            vec![
                Value::Text(trader_id.as_str().to_string()),
                Value::Integer(i64::from(admin)),
                Value::Integer(opening_balance.amount()),
                Value::Text(now.to_rfc3339_micros()),
            ],
        )
        .await?;
        if !opening_balance.is_zero() {
            self.insert_entry(
                tx,
                None,
                trader_id,
                opening_balance,
                0,
                None,
                kind::ADMIN_ADJUST,
            )
            .await?;
        }
        debug!(trader_id = %trader_id, admin, "Trader account opened");
        Ok(())
    }

    /// Activate or deactivate a trader.
    pub async fn set_active(
        &self,
        tx: &Tx,
        trader_id: &TraderId,
        active: bool,
    ) -> Result<(), LedgerError> {
        let changed = tx
            .execute(
                "UPDATE trader_accounts SET active = ? WHERE trader_id = ?",
                vec![
                    Value::Integer(i64::from(active)),
                    Value::Text(trader_id.as_str().to_string()),
                ],
            )
            .await?;
        if changed == 0 {
            return Err(LedgerError::UnknownTrader(trader_id.as_str().to_string()));
        }
        Ok(())
    }

    /// Apply an out-of-band cash and/or share adjustment.
    ///
    /// Share adjustments (mint/burn) require a symbol and may not push
    /// a position negative.
    pub async fn admin_adjust(
        &self,
        tx: &Tx,
        trader_id: &TraderId,
        symbol: Option<&Symbol>,
        delta_cash: Cents,
        delta_shares: i64,
    ) -> Result<(), LedgerError> {
        if !delta_cash.is_zero() {
            let changed = tx
                .execute(
                    "UPDATE trader_accounts
                     SET balance_in_cents = balance_in_cents + ?
                     WHERE trader_id = ?",
                    vec![
                        Value::Integer(delta_cash.amount()),
                        Value::Text(trader_id.as_str().to_string()),
                    ],
                )
                .await?;
            if changed == 0 {
                return Err(LedgerError::UnknownTrader(trader_id.as_str().to_string()));
            }
        }

        if delta_shares != 0 {
            let symbol = symbol.ok_or_else(|| {
                StoreError::Integrity("Share adjustment without a symbol".to_string())
            })?;
            let position = self.find_position(tx, trader_id, symbol).await?;
            let current = position.as_ref().map_or(0, |p| i64::from(p.quantity.as_u32()));
            let updated = current + delta_shares;
            if updated < 0 {
                return Err(StoreError::Integrity(format!(
                    "Share adjustment would make {trader_id}:{symbol} negative"
                ))
                .into());
            }
            self.upsert_position_quantity(tx, trader_id, symbol, position.as_ref(), updated, None)
                .await?;
        }

        self.insert_entry(
            tx,
            None,
            trader_id,
            delta_cash,
            delta_shares,
            symbol,
            kind::ADMIN_ADJUST,
        )
        .await?;
        Ok(())
    }

    /// Earmark cash against a buy order.
    ///
    /// Admins bypass the sufficiency check (their balance may go
    /// negative at settlement); everyone still gets the reservation
    /// recorded.
    pub async fn reserve_cash(
        &self,
        tx: &Tx,
        trader_id: &TraderId,
        amount: Cents,
    ) -> Result<(), LedgerError> {
        let account = self
            .find_account(tx, trader_id)
            .await?
            .ok_or_else(|| LedgerError::UnknownTrader(trader_id.as_str().to_string()))?;

        if !account.admin && amount > account.available_cash() {
            return Err(LedgerError::InsufficientCash {
                trader_id: trader_id.as_str().to_string(),
                requested: amount,
                available: account.available_cash(),
            });
        }

        tx.execute(
            "UPDATE trader_accounts
             SET reserved_cash_in_cents = reserved_cash_in_cents + ?
             WHERE trader_id = ?",
            vec![
                Value::Integer(amount.amount()),
                Value::Text(trader_id.as_str().to_string()),
            ],
        )
        .await?;
        self.insert_entry(tx, None, trader_id, -amount, 0, None, kind::RESERVE)
            .await?;
        debug!(trader_id = %trader_id, amount = %amount, "Cash reserved");
        Ok(())
    }

    /// Return earmarked cash to the available balance.
    pub async fn release_cash(
        &self,
        tx: &Tx,
        trader_id: &TraderId,
        amount: Cents,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        let account = self
            .find_account(tx, trader_id)
            .await?
            .ok_or_else(|| LedgerError::UnknownTrader(trader_id.as_str().to_string()))?;
        if amount > account.reserved_cash_in_cents {
            return Err(StoreError::Integrity(format!(
                "Releasing {amount} exceeds reserved {} for {trader_id}",
                account.reserved_cash_in_cents
            ))
            .into());
        }

        tx.execute(
            "UPDATE trader_accounts
             SET reserved_cash_in_cents = reserved_cash_in_cents - ?
             WHERE trader_id = ?",
            vec![
                Value::Integer(amount.amount()),
                Value::Text(trader_id.as_str().to_string()),
            ],
        )
        .await?;
        self.insert_entry(tx, None, trader_id, amount, 0, None, kind::RELEASE)
            .await?;
        debug!(trader_id = %trader_id, amount = %amount, "Cash released");
        Ok(())
    }

    /// Earmark owned shares against a sell order.
    pub async fn reserve_shares(
        &self,
        tx: &Tx,
        trader_id: &TraderId,
        symbol: &Symbol,
        qty: Quantity,
    ) -> Result<(), LedgerError> {
        let position = self.find_position(tx, trader_id, symbol).await?;
        let available = position
            .as_ref()
            .map_or(Quantity::ZERO, Position::available_shares);
        if qty > available {
            return Err(LedgerError::InsufficientShares {
                trader_id: trader_id.as_str().to_string(),
                symbol: symbol.as_str().to_string(),
                requested: qty.as_u32(),
                available: available.as_u32(),
            });
        }

        tx.execute(
            "UPDATE positions SET reserved_shares = reserved_shares + ?
             WHERE trader_id = ? AND symbol = ?",
            vec![
                Value::Integer(i64::from(qty.as_u32())),
                Value::Text(trader_id.as_str().to_string()),
                Value::Text(symbol.as_str().to_string()),
            ],
        )
        .await?;
        self.insert_entry(
            tx,
            None,
            trader_id,
            Cents::ZERO,
            -i64::from(qty.as_u32()),
            Some(symbol),
            kind::RESERVE,
        )
        .await?;
        debug!(trader_id = %trader_id, symbol = %symbol, qty = %qty, "Shares reserved");
        Ok(())
    }

    /// Return earmarked shares to the available position.
    pub async fn release_shares(
        &self,
        tx: &Tx,
        trader_id: &TraderId,
        symbol: &Symbol,
        qty: Quantity,
    ) -> Result<(), LedgerError> {
        if qty.is_zero() {
            return Ok(());
        }
        let position = self
            .find_position(tx, trader_id, symbol)
            .await?
            .ok_or_else(|| {
                StoreError::Integrity(format!("No position {trader_id}:{symbol} to release"))
            })?;
        if qty > position.reserved_shares {
            return Err(StoreError::Integrity(format!(
                "Releasing {qty} exceeds reserved {} for {trader_id}:{symbol}",
                position.reserved_shares
            ))
            .into());
        }

        tx.execute(
            "UPDATE positions SET reserved_shares = reserved_shares - ?
             WHERE trader_id = ? AND symbol = ?",
            vec![
                Value::Integer(i64::from(qty.as_u32())),
                Value::Text(trader_id.as_str().to_string()),
                Value::Text(symbol.as_str().to_string()),
            ],
        )
        .await?;
        self.insert_entry(
            tx,
            None,
            trader_id,
            Cents::ZERO,
            i64::from(qty.as_u32()),
            Some(symbol),
            kind::RELEASE,
        )
        .await?;
        debug!(trader_id = %trader_id, symbol = %symbol, qty = %qty, "Shares released");
        Ok(())
    }

    /// Settle one executed trade.
    ///
    /// Buyer: reserved cash and balance both drop by the notional, the
    /// position grows at a banker's-rounded average cost. Seller:
    /// reserved shares and position both drop, the balance grows.
    /// Writes exactly two ledger entries that sum to zero.
    pub async fn settle_trade(&self, tx: &Tx, trade: &Trade) -> Result<(), LedgerError> {
        let cost = trade.notional();
        let qty = i64::from(trade.quantity.as_u32());

        // Buyer cash leg.
        let buyer = self
            .find_account(tx, &trade.buyer_id)
            .await?
            .ok_or_else(|| {
                StoreError::Integrity(format!("Buyer account missing: {}", trade.buyer_id))
            })?;
        if cost > buyer.reserved_cash_in_cents {
            return Err(StoreError::Integrity(format!(
                "Trade {} cost {cost} exceeds buyer reserve {}",
                trade.trade_id, buyer.reserved_cash_in_cents
            ))
            .into());
        }
        tx.execute(
            "UPDATE trader_accounts
             SET balance_in_cents = balance_in_cents - ?,
                 reserved_cash_in_cents = reserved_cash_in_cents - ?
             WHERE trader_id = ?",
            vec![
                Value::Integer(cost.amount()),
                Value::Integer(cost.amount()),
                Value::Text(trade.buyer_id.as_str().to_string()),
            ],
        )
        .await?;

        // Buyer share leg with average-cost update.
        let buyer_position = self.find_position(tx, &trade.buyer_id, &trade.symbol).await?;
        let (old_qty, old_avg) = buyer_position
            .as_ref()
            .map_or((0, Cents::ZERO), |p| (p.quantity.as_u32(), p.average_cost_in_cents));
        let new_avg = Cents::weighted_average(
            old_qty,
            old_avg,
            trade.quantity.as_u32(),
            trade.price_in_cents,
        );
        self.upsert_position_quantity(
            tx,
            &trade.buyer_id,
            &trade.symbol,
            buyer_position.as_ref(),
            i64::from(old_qty) + qty,
            Some(new_avg),
        )
        .await?;

        // Seller share leg.
        let seller_position = self
            .find_position(tx, &trade.seller_id, &trade.symbol)
            .await?
            .ok_or_else(|| {
                StoreError::Integrity(format!(
                    "Seller position missing: {}:{}",
                    trade.seller_id, trade.symbol
                ))
            })?;
        if trade.quantity > seller_position.reserved_shares
            || trade.quantity > seller_position.quantity
        {
            return Err(StoreError::Integrity(format!(
                "Trade {} quantity {} exceeds seller holding {} (reserved {})",
                trade.trade_id,
                trade.quantity,
                seller_position.quantity,
                seller_position.reserved_shares
            ))
            .into());
        }
        tx.execute(
            "UPDATE positions
             SET quantity = quantity - ?, reserved_shares = reserved_shares - ?
             WHERE trader_id = ? AND symbol = ?",
            vec![
                Value::Integer(qty),
                Value::Integer(qty),
                Value::Text(trade.seller_id.as_str().to_string()),
                Value::Text(trade.symbol.as_str().to_string()),
            ],
        )
        .await?;

        // Seller cash leg.
        tx.execute(
            "UPDATE trader_accounts SET balance_in_cents = balance_in_cents + ?
             WHERE trader_id = ?",
            vec![
                Value::Integer(cost.amount()),
                Value::Text(trade.seller_id.as_str().to_string()),
            ],
        )
        .await?;

        // The two legs sum to zero cash and zero shares.
        self.insert_entry(
            tx,
            Some(&trade.trade_id),
            &trade.buyer_id,
            -cost,
            qty,
            Some(&trade.symbol),
            kind::TRADE_BUY,
        )
        .await?;
        self.insert_entry(
            tx,
            Some(&trade.trade_id),
            &trade.seller_id,
            cost,
            -qty,
            Some(&trade.symbol),
            kind::TRADE_SELL,
        )
        .await?;

        debug!(
            trade_id = %trade.trade_id,
            symbol = %trade.symbol,
            price = %trade.price_in_cents,
            qty = %trade.quantity,
            "Trade settled"
        );
        Ok(())
    }

    /// Load a position inside a transaction.
    pub async fn find_position(
        &self,
        tx: &Tx,
        trader_id: &TraderId,
        symbol: &Symbol,
    ) -> Result<Option<Position>, StoreError> {
        let mut rows = tx
            .query(
                "SELECT trader_id, symbol, quantity, reserved_shares, average_cost_in_cents
                 FROM positions WHERE trader_id = ? AND symbol = ?",
                vec![
                    Value::Text(trader_id.as_str().to_string()),
                    Value::Text(symbol.as_str().to_string()),
                ],
            )
            .await?;
        match rows.next().await.map_err(StoreError::from)? {
            Some(row) => Ok(Some(row_to_position(&row)?)),
            None => Ok(None),
        }
    }

    /// Load a position outside any transaction.
    pub async fn find_position_latest(
        &self,
        store: &Store,
        trader_id: &TraderId,
        symbol: &Symbol,
    ) -> Result<Option<Position>, StoreError> {
        let conn = store.read_conn()?;
        let mut rows = conn
            .query(
                "SELECT trader_id, symbol, quantity, reserved_shares, average_cost_in_cents
                 FROM positions WHERE trader_id = ? AND symbol = ?",
                vec![
                    Value::Text(trader_id.as_str().to_string()),
                    Value::Text(symbol.as_str().to_string()),
                ],
            )
            .await
            .map_err(StoreError::from)?;
        match rows.next().await.map_err(StoreError::from)? {
            Some(row) => Ok(Some(row_to_position(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert_position_quantity(
        &self,
        tx: &Tx,
        trader_id: &TraderId,
        symbol: &Symbol,
        existing: Option<&Position>,
        new_quantity: i64,
        new_average: Option<Cents>,
    ) -> Result<(), StoreError> {
        if let Some(position) = existing {
            let avg = new_average.unwrap_or(position.average_cost_in_cents);
            tx.execute(
                "UPDATE positions SET quantity = ?, average_cost_in_cents = ?
                 WHERE trader_id = ? AND symbol = ?",
                vec![
                    Value::Integer(new_quantity),
                    Value::Integer(avg.amount()),
                    Value::Text(trader_id.as_str().to_string()),
                    Value::Text(symbol.as_str().to_string()),
                ],
            )
            .await?;
        } else {
            tx.execute(
                "INSERT INTO positions
                    (trader_id, symbol, quantity, reserved_shares, average_cost_in_cents)
                 VALUES (?, ?, ?, 0, ?)",
                vec![
                    Value::Text(trader_id.as_str().to_string()),
                    Value::Text(symbol.as_str().to_string()),
                    Value::Integer(new_quantity),
                    Value::Integer(new_average.unwrap_or(Cents::ZERO).amount()),
                ],
            )
            .await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_entry(
        &self,
        tx: &Tx,
        trade_id: Option<&TradeId>,
        trader_id: &TraderId,
        delta_cash: Cents,
        delta_shares: i64,
        symbol: Option<&Symbol>,
        entry_kind: &str,
    ) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO ledger_entries
                (trade_id, trader_id, delta_cash_in_cents, delta_shares, symbol, kind, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            vec![
                trade_id.map_or(Value::Null, |id| Value::Text(id.as_str().to_string())),
                Value::Text(trader_id.as_str().to_string()),
                Value::Integer(delta_cash.amount()),
                Value::Integer(delta_shares),
                symbol.map_or(Value::Null, |s| Value::Text(s.as_str().to_string())),
                Value::Text(entry_kind.to_string()),
                Value::Text(Timestamp::now().to_rfc3339_micros()),
            ],
        )
        .await?;
        Ok(())
    }
}

fn row_to_account(row: &turso::Row) -> Result<TraderAccount, StoreError> {
    Ok(TraderAccount {
        trader_id: TraderId::new(
            row.get::<String>(0)
                .map_err(|e| StoreError::MissingField(format!("trader_id: {e}")))?,
        ),
        active: row
            .get::<i64>(1)
            .map_err(|e| StoreError::MissingField(format!("active: {e}")))?
            != 0,
        admin: row
            .get::<i64>(2)
            .map_err(|e| StoreError::MissingField(format!("admin: {e}")))?
            != 0,
        balance_in_cents: Cents::new(
            row.get::<i64>(3)
                .map_err(|e| StoreError::MissingField(format!("balance_in_cents: {e}")))?,
        ),
        reserved_cash_in_cents: Cents::new(
            row.get::<i64>(4)
                .map_err(|e| StoreError::MissingField(format!("reserved_cash_in_cents: {e}")))?,
        ),
        created_at: parse_timestamp(
            &row.get::<String>(5)
                .map_err(|e| StoreError::MissingField(format!("created_at: {e}")))?,
        )?,
    })
}

fn row_to_position(row: &turso::Row) -> Result<Position, StoreError> {
    Ok(Position {
        trader_id: TraderId::new(
            row.get::<String>(0)
                .map_err(|e| StoreError::MissingField(format!("trader_id: {e}")))?,
        ),
        symbol: Symbol::new(
            row.get::<String>(1)
                .map_err(|e| StoreError::MissingField(format!("symbol: {e}")))?,
        ),
        quantity: Quantity::new(
            row.get::<i64>(2)
                .map_err(|e| StoreError::MissingField(format!("quantity: {e}")))? as u32,
        ),
        reserved_shares: Quantity::new(
            row.get::<i64>(3)
                .map_err(|e| StoreError::MissingField(format!("reserved_shares: {e}")))?
                as u32,
        ),
        average_cost_in_cents: Cents::new(
            row.get::<i64>(4)
                .map_err(|e| StoreError::MissingField(format!("average_cost_in_cents: {e}")))?,
        ),
    })
}

pub(crate) fn parse_timestamp(text: &str) -> Result<Timestamp, StoreError> {
    Timestamp::parse(text).map_err(|e| StoreError::Integrity(format!("Bad timestamp '{text}': {e}")))
}
