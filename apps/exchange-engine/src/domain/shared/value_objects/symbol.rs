//! Symbol value object for listed instruments.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// A listed symbol on the exchange.
///
/// Symbols come from a closed registry provisioned out-of-band; the
/// handle form (`@NAME`) is conventional but not required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Maximum accepted symbol length.
    pub const MAX_LEN: usize = 32;

    /// Create a new Symbol.
    ///
    /// The symbol is normalized to uppercase.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().to_uppercase())
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Validate the symbol for order submission.
    ///
    /// # Errors
    ///
    /// Returns error if the symbol is empty, too long, or contains
    /// characters outside `[A-Z0-9_@.]`.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: "Symbol cannot be empty".to_string(),
            });
        }
        if self.0.len() > Self::MAX_LEN {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: format!("Symbol exceeds {} characters", Self::MAX_LEN),
            });
        }
        let valid = self
            .0
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '_' | '@' | '.'));
        if !valid {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: format!("Symbol '{}' contains invalid characters", self.0),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_normalizes_to_uppercase() {
        let s = Symbol::new("@alice");
        assert_eq!(s.as_str(), "@ALICE");
    }

    #[test]
    fn symbol_display() {
        let s = Symbol::new("@X");
        assert_eq!(format!("{s}"), "@X");
    }

    #[test]
    fn symbol_validate_accepts_handles() {
        assert!(Symbol::new("@ALICE").validate().is_ok());
        assert!(Symbol::new("ACME_1").validate().is_ok());
        assert!(Symbol::new("A.B").validate().is_ok());
    }

    #[test]
    fn symbol_validate_rejects_empty() {
        assert!(Symbol::new("").validate().is_err());
    }

    #[test]
    fn symbol_validate_rejects_whitespace() {
        assert!(Symbol::new("A B").validate().is_err());
    }

    #[test]
    fn symbol_validate_rejects_too_long() {
        let long = "A".repeat(Symbol::MAX_LEN + 1);
        assert!(Symbol::new(long).validate().is_err());
    }

    #[test]
    fn symbol_equality_after_normalization() {
        assert_eq!(Symbol::new("@x"), Symbol::new("@X"));
    }
}
