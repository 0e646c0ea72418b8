//! Persistence Layer
//!
//! Turso-backed stores for the exchange. Every mutating operation takes
//! a caller-supplied transaction handle so that one submitted intent
//! commits as a single atomic unit: order rows, trade rows, cash and
//! share movements, and outbox events either all persist or none do.

mod db;
mod ledger;
mod orders;
mod outbox;
mod retry;
mod sequencer;
mod settlement;
mod trades;

pub use db::{Store, StoreError, Tx};
pub use ledger::{LedgerError, LedgerStore, Position, TraderAccount};
pub use orders::OrderStore;
pub use outbox::{OutboxRow, OutboxStore};
pub use retry::{BackoffSchedule, RetryPolicy};
pub use sequencer::Sequencer;
pub use settlement::{Settlement, SettlementError};
pub use trades::TradeStore;
