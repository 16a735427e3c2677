//! Error types for the data layer.
//!
//! All storage failures are reported as [`DbError`]. Errors coming out of
//! [`sqlx`] are classified once, in [`DbError::from_sqlx`], so that unique
//! violations and serialization failures can be told apart from other
//! database errors by the layers above.

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for `serialization_failure`.
const SERIALIZATION_FAILURE: &str = "40001";

/// SQLSTATE for `deadlock_detected`.
const DEADLOCK_DETECTED: &str = "40P01";

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// No document matched the filter of a single-document operation.
    #[error("no matching document in {collection}")]
    NotFound {
        /// Collection (table) that was searched.
        collection: &'static str,
    },

    /// A write would violate a unique constraint.
    #[error("unique constraint {constraint} violated")]
    Duplicate {
        /// Name of the violated constraint.
        constraint: String,
    },

    /// A concurrent transaction committed a write to a document this
    /// transaction also wrote.
    #[error("write conflict with a concurrent transaction")]
    WriteConflict,

    /// A failure injected through a memory-backend fail point.
    #[error("injected failure at {operation}")]
    Injected {
        /// The operation the fail point was armed on.
        operation: String,
        /// Whether the failure should be retried.
        transient: bool,
    },

    /// A persisted row could not be decoded into a document.
    #[error("invalid row in {collection}: {reason}")]
    InvalidRow {
        /// Collection (table) the row came from.
        collection: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Classify a [`sqlx::Error`], mapping unique violations to
    /// [`DbError::Duplicate`].
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let duplicate = err.as_database_error().and_then(|db| {
            (db.code().as_deref() == Some(UNIQUE_VIOLATION))
                .then(|| db.constraint().unwrap_or("unique").to_owned())
        });
        match duplicate {
            Some(constraint) => Self::Duplicate { constraint },
            None => Self::Postgres(err),
        }
    }

    /// Whether re-running the whole transaction may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::WriteConflict => true,
            Self::Injected { transient, .. } => *transient,
            Self::Postgres(err) => err
                .as_database_error()
                .and_then(|db| db.code())
                .is_some_and(|code| code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED),
            _ => false,
        }
    }

    /// Whether this is a [`DbError::NotFound`].
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn invalid_row(collection: &'static str, reason: impl core::fmt::Display) -> Self {
        Self::InvalidRow {
            collection,
            reason: reason.to_string(),
        }
    }
}

/// Errors that can tell whether a failed transaction is worth retrying.
///
/// [`crate::UnitOfWork::run`] retries a transaction body only while its
/// error reports itself as transient.
pub trait Transient {
    /// Whether re-running the whole transaction may succeed.
    fn is_transient(&self) -> bool;
}

impl Transient for DbError {
    fn is_transient(&self) -> bool {
        Self::is_transient(self)
    }
}
