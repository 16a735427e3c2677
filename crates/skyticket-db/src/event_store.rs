//! Event store operations.
//!
//! Events are the root documents: tickets and reservations reference them,
//! and deleting one is the job of the cascade in the core crate, which
//! removes the dependants in the same transaction.

use chrono::{DateTime, Utc};
use skyticket_types::{Event, EventId, NewEvent};

use crate::database::{Transaction, decode_id, id_bytes};
use crate::error::DbError;
use crate::memory::Operation;

const COLLECTION: &str = "events";

/// Operations on the `events` collection, bound to one transaction.
pub struct EventStore<'a> {
    tx: &'a mut Transaction,
}

impl<'a> EventStore<'a> {
    /// Create an event store bound to an open transaction.
    pub const fn new(tx: &'a mut Transaction) -> Self {
        Self { tx }
    }

    /// Insert a new event with a freshly generated id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    pub async fn create(&mut self, event: NewEvent) -> Result<Event, DbError> {
        let event = event.with_id(EventId::new());
        match &mut *self.tx {
            Transaction::Postgres(tx) => {
                sqlx::query("INSERT INTO events (id, name, date, venue) VALUES ($1, $2, $3, $4)")
                    .bind(id_bytes(event.id))
                    .bind(event.name.as_str())
                    .bind(event.date)
                    .bind(event.venue.as_str())
                    .execute(&mut **tx)
                    .await
                    .map_err(DbError::from_sqlx)?;
            }
            Transaction::Memory(tx) => {
                tx.enter(Operation::InsertEvent).await?;
                tx.put(event.clone())?;
            }
        }
        tracing::debug!(event_id = %event.id, "Inserted event");
        Ok(event)
    }

    /// Look up an event by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no event has this id.
    pub async fn find_by_id(&mut self, id: EventId) -> Result<Event, DbError> {
        let found = match &mut *self.tx {
            Transaction::Postgres(tx) => sqlx::query_as::<_, EventRow>(
                "SELECT id, name, date, venue FROM events WHERE id = $1",
            )
            .bind(id_bytes(id))
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from_sqlx)?
            .map(EventRow::into_event)
            .transpose()?,
            Transaction::Memory(tx) => {
                tx.enter(Operation::FindEvents).await?;
                tx.get::<Event>(id).cloned()
            }
        };
        found.ok_or(DbError::NotFound {
            collection: COLLECTION,
        })
    }

    /// All events, ordered by id (which is creation order).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn find_all(&mut self) -> Result<Vec<Event>, DbError> {
        match &mut *self.tx {
            Transaction::Postgres(tx) => {
                sqlx::query_as::<_, EventRow>("SELECT id, name, date, venue FROM events ORDER BY id")
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(DbError::from_sqlx)?
                    .into_iter()
                    .map(EventRow::into_event)
                    .collect()
            }
            Transaction::Memory(tx) => {
                tx.enter(Operation::FindEvents).await?;
                Ok(tx.scan::<Event>().cloned().collect())
            }
        }
    }

    /// Replace every field of an existing event.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no event has `event.id`.
    pub async fn update(&mut self, event: &Event) -> Result<Event, DbError> {
        let updated = match &mut *self.tx {
            Transaction::Postgres(tx) => sqlx::query_as::<_, EventRow>(
                r"UPDATE events SET name = $2, date = $3, venue = $4
                  WHERE id = $1
                  RETURNING id, name, date, venue",
            )
            .bind(id_bytes(event.id))
            .bind(event.name.as_str())
            .bind(event.date)
            .bind(event.venue.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from_sqlx)?
            .map(EventRow::into_event)
            .transpose()?,
            Transaction::Memory(tx) => {
                tx.enter(Operation::UpdateEvent).await?;
                if tx.get::<Event>(event.id).is_some() {
                    tx.put(event.clone())?;
                    Some(event.clone())
                } else {
                    None
                }
            }
        };
        updated.ok_or(DbError::NotFound {
            collection: COLLECTION,
        })
    }

    /// Delete an event. Dependent tickets and reservations are not touched.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no event has this id.
    pub async fn delete(&mut self, id: EventId) -> Result<(), DbError> {
        let deleted = match &mut *self.tx {
            Transaction::Postgres(tx) => {
                sqlx::query("DELETE FROM events WHERE id = $1")
                    .bind(id_bytes(id))
                    .execute(&mut **tx)
                    .await
                    .map_err(DbError::from_sqlx)?
                    .rows_affected()
                    > 0
            }
            Transaction::Memory(tx) => {
                tx.enter(Operation::DeleteEvent).await?;
                tx.remove::<Event>(id).is_some()
            }
        };
        if !deleted {
            return Err(DbError::NotFound {
                collection: COLLECTION,
            });
        }
        tracing::debug!(event_id = %id, "Deleted event");
        Ok(())
    }
}

/// A row from the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    id: Vec<u8>,
    name: String,
    date: DateTime<Utc>,
    venue: String,
}

impl EventRow {
    fn into_event(self) -> Result<Event, DbError> {
        Ok(Event {
            id: decode_id(COLLECTION, &self.id)?,
            name: self.name,
            date: self.date,
            venue: self.venue,
        })
    }
}
