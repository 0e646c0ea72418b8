//! Configuration for the exchange engine.
//!
//! Everything is environment-driven with validated defaults; invalid
//! values fail startup naming the offending variable.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `DATABASE_URL` | `exchange.db` | Turso database path |
//! | `EXCHANGE_SYMBOLS` | *(empty)* | comma-separated symbols provisioned at bootstrap |
//! | `PER_SYMBOL_QUEUE_CAPACITY` | `1024` | bounded intent queue depth |
//! | `EXPIRATION_TICK_SECONDS` | `1` | expiration scheduler period |
//! | `MARKET_ORDER_SLIPPAGE_CUSHION` | `1.10` | market-buy reserve multiplier |
//! | `DB_MAX_RETRIES` | `5` | transient-error retry budget per intent |
//! | `DB_RETRY_BASE_MS` | `50` | first backoff step |
//! | `DB_RETRY_MAX_MS` | `1500` | backoff ceiling |

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::domain::shared::Symbol;
use crate::store::RetryPolicy;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held an unusable value.
    #[error("Invalid value for {var}: {message}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// What was wrong.
        message: String,
    },
}

/// Runtime configuration for the engine process.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Turso database path.
    pub database_url: String,
    /// Symbols to provision into the registry at bootstrap.
    pub symbols: Vec<Symbol>,
    /// Bounded intent queue depth per symbol.
    pub per_symbol_queue_capacity: usize,
    /// Expiration scheduler period.
    pub expiration_tick: Duration,
    /// Market-buy reserve multiplier.
    pub slippage_cushion: Decimal,
    /// Store retry policy for transient failures.
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "exchange.db".to_string(),
            symbols: Vec::new(),
            per_symbol_queue_capacity: 1024,
            expiration_tick: Duration::from_secs(1),
            slippage_cushion: dec!(1.10),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through a lookup function (testable).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);

        let symbols = lookup("EXCHANGE_SYMBOLS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Symbol::new)
            .collect::<Vec<_>>();
        for symbol in &symbols {
            symbol.validate().map_err(|e| ConfigError::InvalidValue {
                var: "EXCHANGE_SYMBOLS",
                message: e.to_string(),
            })?;
        }

        let per_symbol_queue_capacity = parse_or(
            &lookup,
            "PER_SYMBOL_QUEUE_CAPACITY",
            defaults.per_symbol_queue_capacity,
        )?;
        if per_symbol_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                var: "PER_SYMBOL_QUEUE_CAPACITY",
                message: "must be at least 1".to_string(),
            });
        }

        let tick_seconds: u64 = parse_or(&lookup, "EXPIRATION_TICK_SECONDS", 1)?;
        if tick_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                var: "EXPIRATION_TICK_SECONDS",
                message: "must be at least 1".to_string(),
            });
        }

        let slippage_cushion: Decimal =
            parse_or(&lookup, "MARKET_ORDER_SLIPPAGE_CUSHION", defaults.slippage_cushion)?;
        if slippage_cushion < Decimal::ONE {
            return Err(ConfigError::InvalidValue {
                var: "MARKET_ORDER_SLIPPAGE_CUSHION",
                message: "must be at least 1.0".to_string(),
            });
        }

        let max_retries: u32 = parse_or(&lookup, "DB_MAX_RETRIES", 5)?;
        if max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                var: "DB_MAX_RETRIES",
                message: "must be at least 1".to_string(),
            });
        }
        let base_ms: u64 = parse_or(&lookup, "DB_RETRY_BASE_MS", 50)?;
        let max_ms: u64 = parse_or(&lookup, "DB_RETRY_MAX_MS", 1500)?;
        if base_ms > max_ms {
            return Err(ConfigError::InvalidValue {
                var: "DB_RETRY_BASE_MS",
                message: format!("base {base_ms}ms exceeds ceiling {max_ms}ms"),
            });
        }

        Ok(Self {
            database_url,
            symbols,
            per_symbol_queue_capacity,
            expiration_tick: Duration::from_secs(tick_seconds),
            slippage_cushion,
            retry: RetryPolicy::new(max_retries, base_ms, max_ms),
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |var| map.get(var).map(|v| (*v).to_string())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = EngineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn parses_every_knob() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "/var/lib/exchange.db"),
            ("EXCHANGE_SYMBOLS", "@alice, @bob"),
            ("PER_SYMBOL_QUEUE_CAPACITY", "64"),
            ("EXPIRATION_TICK_SECONDS", "2"),
            ("MARKET_ORDER_SLIPPAGE_CUSHION", "1.25"),
            ("DB_MAX_RETRIES", "3"),
            ("DB_RETRY_BASE_MS", "10"),
            ("DB_RETRY_MAX_MS", "100"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "/var/lib/exchange.db");
        assert_eq!(
            config.symbols,
            vec![Symbol::new("@ALICE"), Symbol::new("@BOB")]
        );
        assert_eq!(config.per_symbol_queue_capacity, 64);
        assert_eq!(config.expiration_tick, Duration::from_secs(2));
        assert_eq!(config.slippage_cushion, dec!(1.25));
        assert_eq!(config.retry, RetryPolicy::new(3, 10, 100));
    }

    #[test]
    fn rejects_zero_queue_capacity() {
        let err = EngineConfig::from_lookup(lookup_from(&[("PER_SYMBOL_QUEUE_CAPACITY", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("PER_SYMBOL_QUEUE_CAPACITY"));
    }

    #[test]
    fn rejects_unparseable_number() {
        let err = EngineConfig::from_lookup(lookup_from(&[("DB_MAX_RETRIES", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("DB_MAX_RETRIES"));
    }

    #[test]
    fn rejects_cushion_below_one() {
        let err =
            EngineConfig::from_lookup(lookup_from(&[("MARKET_ORDER_SLIPPAGE_CUSHION", "0.9")]))
                .unwrap_err();
        assert!(err.to_string().contains("MARKET_ORDER_SLIPPAGE_CUSHION"));
    }

    #[test]
    fn rejects_base_delay_above_ceiling() {
        let err = EngineConfig::from_lookup(lookup_from(&[
            ("DB_RETRY_BASE_MS", "2000"),
            ("DB_RETRY_MAX_MS", "100"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DB_RETRY_BASE_MS"));
    }

    #[test]
    fn rejects_invalid_symbol() {
        let err = EngineConfig::from_lookup(lookup_from(&[("EXCHANGE_SYMBOLS", "@a b")]))
            .unwrap_err();
        assert!(err.to_string().contains("EXCHANGE_SYMBOLS"));
    }
}
