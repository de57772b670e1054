//! Error types for the core domain.

use crate::ids::IdError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by domain validation and parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A stored or submitted enum value is not recognised.
    #[error("unknown {kind}: {value}")]
    UnknownVariant {
        /// Which enum was being parsed.
        kind: &'static str,
        /// The offending value.
        value: String,
    },

    /// A feature has no entry in the pricing table.
    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    /// A credit pack id is not on sale.
    #[error("unknown credit pack: {0}")]
    UnknownPack(String),

    /// Input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
