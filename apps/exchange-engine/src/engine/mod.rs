//! Matching Engine Layer
//!
//! One single-writer engine task per symbol, each owning an in-memory
//! price-time-sequence [`Book`]. Intents flow through the [`Router`]'s
//! bounded per-symbol queues; the persistent store commits first and
//! only then does the book mutate, so the two can never diverge.

mod book;
mod expiration;
mod intent;
mod recovery;
mod router;
mod symbol_engine;

pub use book::{Book, BookSnapshot, IncomingOrder, MatchPlan, PlannedFill, RestingOrder};
pub use expiration::ExpirationScheduler;
pub use intent::{CancelReply, EngineIntent, SnapshotReply, SubmitReply, SubmitRequest};
pub use recovery::recover_engines;
pub use router::Router;
pub use symbol_engine::SymbolEngine;
