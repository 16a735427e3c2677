//! Backend dispatch for databases and transactions.
//!
//! Uses enum dispatch instead of trait objects because async methods are
//! not dyn-compatible. Every store matches on [`Transaction`] and runs the
//! backend-specific implementation of the same operation.

use skyticket_types::{ObjectId, object_id_from_slice};
use sqlx::Postgres;

use crate::error::DbError;
use crate::memory::{MemoryDatabase, MemoryTransaction};
use crate::postgres::PostgresPool;

/// A storage backend.
#[derive(Debug, Clone)]
pub enum Database {
    /// `PostgreSQL` via [`sqlx`].
    Postgres(PostgresPool),
    /// The in-process document store.
    Memory(MemoryDatabase),
}

impl Database {
    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if a `PostgreSQL` transaction cannot
    /// be started.
    pub async fn begin(&self) -> Result<Transaction, DbError> {
        match self {
            Self::Postgres(pool) => Ok(Transaction::Postgres(pool.begin().await?)),
            Self::Memory(db) => Ok(Transaction::Memory(db.begin())),
        }
    }

    /// Short backend name for logs.
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

impl From<PostgresPool> for Database {
    fn from(pool: PostgresPool) -> Self {
        Self::Postgres(pool)
    }
}

impl From<MemoryDatabase> for Database {
    fn from(db: MemoryDatabase) -> Self {
        Self::Memory(db)
    }
}

/// An open transaction on one of the backends.
///
/// Dropping a transaction without committing it rolls it back.
pub enum Transaction {
    /// A `PostgreSQL` transaction at `REPEATABLE READ`.
    Postgres(sqlx::Transaction<'static, Postgres>),
    /// A memory-backend transaction.
    Memory(MemoryTransaction),
}

impl Transaction {
    /// Make every write of this transaction durable and visible.
    ///
    /// # Errors
    ///
    /// Returns a transient [`DbError`] if a concurrent transaction won a
    /// write-write conflict.
    pub async fn commit(self) -> Result<(), DbError> {
        match self {
            Self::Postgres(tx) => tx.commit().await.map_err(DbError::from_sqlx),
            Self::Memory(tx) => tx.commit().await,
        }
    }

    /// Discard every write of this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the rollback statement fails.
    pub async fn rollback(self) -> Result<(), DbError> {
        match self {
            Self::Postgres(tx) => tx.rollback().await.map_err(DbError::from_sqlx),
            Self::Memory(tx) => {
                tx.rollback();
                Ok(())
            }
        }
    }
}

impl core::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Postgres(_) => f.write_str("Transaction::Postgres"),
            Self::Memory(tx) => write!(f, "Transaction::Memory({})", tx.id()),
        }
    }
}

/// Encode an id for a `BYTEA` column.
pub(crate) fn id_bytes(id: impl Into<ObjectId>) -> Vec<u8> {
    id.into().bytes().to_vec()
}

/// Decode an id read from a `BYTEA` column of `collection`.
pub(crate) fn decode_id<I: From<ObjectId>>(
    collection: &'static str,
    bytes: &[u8],
) -> Result<I, DbError> {
    object_id_from_slice(bytes)
        .map(I::from)
        .map_err(|e| DbError::invalid_row(collection, e))
}

#[cfg(test)]
mod tests {
    use skyticket_types::TicketId;

    use super::*;

    #[test]
    fn ids_roundtrip_through_bytea_encoding() {
        let id = TicketId::new();
        let decoded: Result<TicketId, _> = decode_id("tickets", &id_bytes(id));
        assert_eq!(decoded.ok(), Some(id));
    }

    #[test]
    fn short_bytea_is_an_invalid_row() {
        let decoded: Result<TicketId, _> = decode_id("tickets", &[0, 1, 2]);
        assert!(matches!(
            decoded,
            Err(DbError::InvalidRow { collection: "tickets", .. })
        ));
    }

    #[tokio::test]
    async fn memory_transactions_commit_through_the_enum() {
        let memory = MemoryDatabase::with_journal();
        let db = Database::from(memory.clone());
        assert_eq!(db.backend(), "memory");

        let tx = db.begin().await;
        assert!(matches!(tx, Ok(Transaction::Memory(_))));
        if let Ok(tx) = tx {
            assert!(tx.rollback().await.is_ok());
        }
        assert_eq!(memory.journal().len(), 2);
    }
}
