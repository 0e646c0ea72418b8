//! Domain Layer
//!
//! The innermost layer containing exchange business logic with zero
//! infrastructure dependencies. This layer defines:
//!
//! - **Aggregates**: Consistency boundaries with invariants
//! - **Value Objects**: Immutable domain types with equality by value
//! - **Domain Events**: Records published through the market-data outbox
//!
//! # Bounded Contexts
//!
//! - [`exchange`]: Order lifecycle, trades, fills, market-data events
//! - [`shared`]: Identifiers, money, quantities, timestamps

pub mod exchange;
pub mod shared;
