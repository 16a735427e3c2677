//! Reservation store operations.
//!
//! Reservations are looked up by the ticket they hold: the schema allows
//! one reservation row per ticket, and cancellation deletes the row.

use chrono::{DateTime, Utc};
use skyticket_types::{EventId, NewReservation, Reservation, ReservationId, TicketId};

use crate::database::{Transaction, decode_id, id_bytes};
use crate::error::DbError;
use crate::memory::Operation;

const COLLECTION: &str = "reservations";

/// Reservation selection. Unset fields do not constrain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservationFilter {
    /// Match this reservation id.
    pub id: Option<ReservationId>,
    /// Match reservations holding this ticket.
    pub ticket_id: Option<TicketId>,
    /// Match reservations under this event.
    pub event_id: Option<EventId>,
}

impl ReservationFilter {
    /// A filter matching every reservation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one reservation id.
    #[must_use]
    pub const fn id(mut self, id: ReservationId) -> Self {
        self.id = Some(id);
        self
    }

    /// Restrict to reservations holding one ticket.
    #[must_use]
    pub const fn ticket(mut self, ticket_id: TicketId) -> Self {
        self.ticket_id = Some(ticket_id);
        self
    }

    /// Restrict to one event.
    #[must_use]
    pub const fn event(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Whether `reservation` satisfies every set field.
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.id.is_none_or(|id| id == reservation.id)
            && self.ticket_id.is_none_or(|id| id == reservation.ticket_id)
            && self.event_id.is_none_or(|id| id == reservation.event_id)
    }
}

/// Operations on the `reservations` collection, bound to one transaction.
pub struct ReservationStore<'a> {
    tx: &'a mut Transaction,
}

impl<'a> ReservationStore<'a> {
    /// Create a reservation store bound to an open transaction.
    pub const fn new(tx: &'a mut Transaction) -> Self {
        Self { tx }
    }

    /// Insert a new, active reservation with a freshly generated id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Duplicate`] if the ticket already has a
    /// reservation row.
    pub async fn create(&mut self, reservation: NewReservation) -> Result<Reservation, DbError> {
        let reservation = reservation.with_id(ReservationId::new());
        match &mut *self.tx {
            Transaction::Postgres(tx) => {
                sqlx::query(
                    r"INSERT INTO reservations (id, ticket_id, event_id, customer_name, reserved_at, status)
                      VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(id_bytes(reservation.id))
                .bind(id_bytes(reservation.ticket_id))
                .bind(id_bytes(reservation.event_id))
                .bind(reservation.customer_name.as_str())
                .bind(reservation.reserved_at)
                .bind(reservation.status.as_str())
                .execute(&mut **tx)
                .await
                .map_err(DbError::from_sqlx)?;
            }
            Transaction::Memory(tx) => {
                tx.enter(Operation::InsertReservation).await?;
                tx.put(reservation.clone())?;
            }
        }
        tracing::debug!(
            reservation_id = %reservation.id,
            ticket_id = %reservation.ticket_id,
            "Inserted reservation"
        );
        Ok(reservation)
    }

    /// The first reservation (in id order) matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if nothing matches.
    pub async fn find_one(&mut self, filter: &ReservationFilter) -> Result<Reservation, DbError> {
        let found = match &mut *self.tx {
            Transaction::Postgres(tx) => sqlx::query_as::<_, ReservationRow>(
                r"SELECT id, ticket_id, event_id, customer_name, reserved_at, status
                  FROM reservations
                  WHERE ($1::BYTEA IS NULL OR id = $1)
                    AND ($2::BYTEA IS NULL OR ticket_id = $2)
                    AND ($3::BYTEA IS NULL OR event_id = $3)
                  ORDER BY id
                  LIMIT 1",
            )
            .bind(filter.id.map(id_bytes))
            .bind(filter.ticket_id.map(id_bytes))
            .bind(filter.event_id.map(id_bytes))
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from_sqlx)?
            .map(ReservationRow::into_reservation)
            .transpose()?,
            Transaction::Memory(tx) => {
                tx.enter(Operation::FindReservations).await?;
                tx.scan::<Reservation>().find(|r| filter.matches(r)).cloned()
            }
        };
        found.ok_or(DbError::NotFound {
            collection: COLLECTION,
        })
    }

    /// Replace the customer name on the reservation holding `ticket_id`
    /// and return the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the ticket has no reservation.
    pub async fn update_customer_name(
        &mut self,
        ticket_id: TicketId,
        customer_name: &str,
    ) -> Result<Reservation, DbError> {
        let updated = match &mut *self.tx {
            Transaction::Postgres(tx) => sqlx::query_as::<_, ReservationRow>(
                r"UPDATE reservations SET customer_name = $2
                  WHERE ticket_id = $1
                  RETURNING id, ticket_id, event_id, customer_name, reserved_at, status",
            )
            .bind(id_bytes(ticket_id))
            .bind(customer_name)
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from_sqlx)?
            .map(ReservationRow::into_reservation)
            .transpose()?,
            Transaction::Memory(tx) => {
                tx.enter(Operation::UpdateReservation).await?;
                let current = tx
                    .scan::<Reservation>()
                    .find(|r| r.ticket_id == ticket_id)
                    .cloned();
                match current {
                    Some(current) => {
                        let updated = Reservation {
                            customer_name: customer_name.to_owned(),
                            ..current
                        };
                        tx.put(updated.clone())?;
                        Some(updated)
                    }
                    None => None,
                }
            }
        };
        updated.ok_or(DbError::NotFound {
            collection: COLLECTION,
        })
    }

    /// Delete every reservation matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if nothing matched.
    pub async fn delete(&mut self, filter: &ReservationFilter) -> Result<(), DbError> {
        let deleted = match &mut *self.tx {
            Transaction::Postgres(tx) => sqlx::query(
                r"DELETE FROM reservations
                  WHERE ($1::BYTEA IS NULL OR id = $1)
                    AND ($2::BYTEA IS NULL OR ticket_id = $2)
                    AND ($3::BYTEA IS NULL OR event_id = $3)",
            )
            .bind(filter.id.map(id_bytes))
            .bind(filter.ticket_id.map(id_bytes))
            .bind(filter.event_id.map(id_bytes))
            .execute(&mut **tx)
            .await
            .map_err(DbError::from_sqlx)?
            .rows_affected(),
            Transaction::Memory(tx) => {
                tx.enter(Operation::DeleteReservations).await?;
                tx.remove_where::<Reservation>(|r| filter.matches(r))
            }
        };
        if deleted == 0 {
            return Err(DbError::NotFound {
                collection: COLLECTION,
            });
        }
        tracing::debug!(count = deleted, "Deleted reservations");
        Ok(())
    }

    /// Delete every reservation under an event, returning how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    pub async fn delete_by_event(&mut self, event_id: EventId) -> Result<u64, DbError> {
        let deleted = match &mut *self.tx {
            Transaction::Postgres(tx) => {
                sqlx::query("DELETE FROM reservations WHERE event_id = $1")
                    .bind(id_bytes(event_id))
                    .execute(&mut **tx)
                    .await
                    .map_err(DbError::from_sqlx)?
                    .rows_affected()
            }
            Transaction::Memory(tx) => {
                tx.enter(Operation::DeleteReservations).await?;
                tx.remove_where::<Reservation>(|r| r.event_id == event_id)
            }
        };
        tracing::debug!(event_id = %event_id, count = deleted, "Deleted reservations of event");
        Ok(deleted)
    }

    /// Delete every reservation holding a ticket, returning how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    pub async fn delete_by_ticket(&mut self, ticket_id: TicketId) -> Result<u64, DbError> {
        let deleted = match &mut *self.tx {
            Transaction::Postgres(tx) => {
                sqlx::query("DELETE FROM reservations WHERE ticket_id = $1")
                    .bind(id_bytes(ticket_id))
                    .execute(&mut **tx)
                    .await
                    .map_err(DbError::from_sqlx)?
                    .rows_affected()
            }
            Transaction::Memory(tx) => {
                tx.enter(Operation::DeleteReservations).await?;
                tx.remove_where::<Reservation>(|r| r.ticket_id == ticket_id)
            }
        };
        tracing::debug!(ticket_id = %ticket_id, count = deleted, "Deleted reservations of ticket");
        Ok(deleted)
    }
}

/// A row from the `reservations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ReservationRow {
    id: Vec<u8>,
    ticket_id: Vec<u8>,
    event_id: Vec<u8>,
    customer_name: String,
    reserved_at: DateTime<Utc>,
    status: String,
}

impl ReservationRow {
    fn into_reservation(self) -> Result<Reservation, DbError> {
        Ok(Reservation {
            id: decode_id(COLLECTION, &self.id)?,
            ticket_id: decode_id(COLLECTION, &self.ticket_id)?,
            event_id: decode_id(COLLECTION, &self.event_id)?,
            customer_name: self.customer_name,
            reserved_at: self.reserved_at,
            status: self
                .status
                .parse()
                .map_err(|e| DbError::invalid_row(COLLECTION, e))?,
        })
    }
}
