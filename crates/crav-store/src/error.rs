//! Error types for storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Key that was looked up.
        id: String,
    },

    /// Debit larger than the balance.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Credits requested.
        required: i64,
    },

    /// The spend was already refunded.
    #[error("transaction already refunded: {transaction_id}")]
    AlreadyRefunded {
        /// The spend transaction.
        transaction_id: String,
    },

    /// The external event was already applied.
    #[error("duplicate event: {event_id}")]
    DuplicateEvent {
        /// Provider event id.
        event_id: String,
    },

    /// Write violates a uniqueness or reference constraint.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Build a `NotFound` for `entity` keyed by `id`.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Decode(e) | sqlx::Error::ColumnDecode { source: e, .. } => {
                Self::Serialization(e.to_string())
            }
            sqlx::Error::Database(db_err)
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() =>
            {
                Self::Conflict(db_err.message().to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<crav_core::CoreError> for StoreError {
    fn from(err: crav_core::CoreError) -> Self {
        Self::Serialization(err.to_string())
    }
}
