// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Exchange Engine - Rust Core Library
//!
//! Order matching and settlement core for the Exchange virtual market.
//!
//! # Architecture
//!
//! One single-writer matching engine per symbol, a durable order
//! lifecycle in Turso, and a transactional market-data outbox:
//!
//! - **Domain**: value objects, the order aggregate, trades, events
//!   - `exchange`: order lifecycle, fills, trades, market events
//!   - `shared`: identifiers, integer-cent money, quantities, time
//! - **Store**: Turso repositories, all mutations on one transaction
//!   per intent
//!   - `ledger`: accounts, positions, reservations, double entry
//!   - `orders` / `trades`: lifecycle rows and insert-only fills
//!   - `sequencer`: per-symbol monotonic sequence numbers
//!   - `outbox`: events appended in lockstep with state changes
//!   - `settlement`: the all-or-nothing fill applicator
//! - **Engine**: in-memory books and the task-per-symbol runtime
//!   - `book`: price-time-sequence levels, plan/apply matching
//!   - `router`: bounded per-symbol queues, no global lock
//!   - `recovery` / `expiration`: restart rebuild and TIF retirement
//!
//! The store commits first; the book mutates only after. In-memory and
//! persistent state never diverge.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Layers
// =============================================================================

/// Configuration loading and validation.
pub mod config;

/// Domain layer - business logic with no infrastructure dependencies.
pub mod domain;

/// Engine layer - books, per-symbol engines, router, schedulers.
pub mod engine;

/// Store layer - Turso-backed persistence.
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::exchange::{
    CancelCause, CancelOutcome, Fill, MarketEvent, Order, OrderDraft, OrderStatus, OrderType,
    RejectReason, Side, Trade,
};
pub use domain::shared::{Cents, EventId, OrderId, Quantity, Symbol, Timestamp, TradeId, TraderId};

// Engine re-exports
pub use engine::{
    Book, BookSnapshot, CancelReply, EngineIntent, ExpirationScheduler, Router, SnapshotReply,
    SubmitReply, SubmitRequest, recover_engines,
};

// Store re-exports
pub use config::{ConfigError, EngineConfig};
pub use store::{
    LedgerError, LedgerStore, OrderStore, OutboxRow, OutboxStore, RetryPolicy, Sequencer,
    Settlement, Store, StoreError, TradeStore,
};
