//! Ticket store operations, including the atomic reservation primitive.
//!
//! [`TicketStore::attempt_reserve`] is the single arbitration point for
//! concurrent reservations: it flips a ticket from `available` to
//! `reserved` in one conditional write, so among any number of concurrent
//! callers at most one observes `reserved = true` for a given ticket.

use skyticket_types::{EventId, NewTicket, Ticket, TicketId, TicketStatus};

use crate::database::{Transaction, decode_id, id_bytes};
use crate::error::DbError;
use crate::memory::Operation;

const COLLECTION: &str = "tickets";

/// Result of [`TicketStore::attempt_reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveOutcome {
    /// A ticket with this id exists under this event.
    pub found: bool,
    /// This call performed the AVAILABLE to RESERVED transition.
    pub reserved: bool,
}

/// Ticket selection. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    /// Match this ticket id.
    pub id: Option<TicketId>,
    /// Match tickets of this event.
    pub event_id: Option<EventId>,
    /// Match this seat label.
    pub seat_number: Option<String>,
}

impl TicketFilter {
    /// A filter matching every ticket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one ticket id.
    #[must_use]
    pub const fn id(mut self, id: TicketId) -> Self {
        self.id = Some(id);
        self
    }

    /// Restrict to one event.
    #[must_use]
    pub const fn event(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
        self
    }

    /// Restrict to one seat label.
    #[must_use]
    pub fn seat(mut self, seat_number: impl Into<String>) -> Self {
        self.seat_number = Some(seat_number.into());
        self
    }

    /// Whether `ticket` satisfies every set field.
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.id.is_none_or(|id| id == ticket.id)
            && self.event_id.is_none_or(|id| id == ticket.event_id)
            && self
                .seat_number
                .as_deref()
                .is_none_or(|seat| seat == ticket.seat_number)
    }
}

/// Operations on the `tickets` collection, bound to one transaction.
pub struct TicketStore<'a> {
    tx: &'a mut Transaction,
}

impl<'a> TicketStore<'a> {
    /// Create a ticket store bound to an open transaction.
    pub const fn new(tx: &'a mut Transaction) -> Self {
        Self { tx }
    }

    /// Insert a new, available ticket with a freshly generated id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Duplicate`] if the event already has a ticket
    /// with this seat label.
    pub async fn create(&mut self, ticket: NewTicket) -> Result<Ticket, DbError> {
        let ticket = ticket.with_id(TicketId::new());
        match &mut *self.tx {
            Transaction::Postgres(tx) => {
                sqlx::query(
                    r"INSERT INTO tickets (id, event_id, seat_number, price, status)
                      VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(id_bytes(ticket.id))
                .bind(id_bytes(ticket.event_id))
                .bind(ticket.seat_number.as_str())
                .bind(ticket.price)
                .bind(ticket.status.as_str())
                .execute(&mut **tx)
                .await
                .map_err(DbError::from_sqlx)?;
            }
            Transaction::Memory(tx) => {
                tx.enter(Operation::InsertTicket).await?;
                tx.put(ticket.clone())?;
            }
        }
        tracing::debug!(
            ticket_id = %ticket.id,
            event_id = %ticket.event_id,
            seat = %ticket.seat_number,
            "Inserted ticket"
        );
        Ok(ticket)
    }

    /// The first ticket (in id order) matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if nothing matches.
    pub async fn find_one(&mut self, filter: &TicketFilter) -> Result<Ticket, DbError> {
        let found = match &mut *self.tx {
            Transaction::Postgres(tx) => sqlx::query_as::<_, TicketRow>(
                r"SELECT id, event_id, seat_number, price, status
                  FROM tickets
                  WHERE ($1::BYTEA IS NULL OR id = $1)
                    AND ($2::BYTEA IS NULL OR event_id = $2)
                    AND ($3::TEXT IS NULL OR seat_number = $3)
                  ORDER BY id
                  LIMIT 1",
            )
            .bind(filter.id.map(id_bytes))
            .bind(filter.event_id.map(id_bytes))
            .bind(filter.seat_number.as_deref())
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from_sqlx)?
            .map(TicketRow::into_ticket)
            .transpose()?,
            Transaction::Memory(tx) => {
                tx.enter(Operation::FindTickets).await?;
                tx.scan::<Ticket>().find(|t| filter.matches(t)).cloned()
            }
        };
        found.ok_or(DbError::NotFound {
            collection: COLLECTION,
        })
    }

    /// Every ticket matching `filter`, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn find(&mut self, filter: &TicketFilter) -> Result<Vec<Ticket>, DbError> {
        match &mut *self.tx {
            Transaction::Postgres(tx) => sqlx::query_as::<_, TicketRow>(
                r"SELECT id, event_id, seat_number, price, status
                  FROM tickets
                  WHERE ($1::BYTEA IS NULL OR id = $1)
                    AND ($2::BYTEA IS NULL OR event_id = $2)
                    AND ($3::TEXT IS NULL OR seat_number = $3)
                  ORDER BY id",
            )
            .bind(filter.id.map(id_bytes))
            .bind(filter.event_id.map(id_bytes))
            .bind(filter.seat_number.as_deref())
            .fetch_all(&mut **tx)
            .await
            .map_err(DbError::from_sqlx)?
            .into_iter()
            .map(TicketRow::into_ticket)
            .collect(),
            Transaction::Memory(tx) => {
                tx.enter(Operation::FindTickets).await?;
                Ok(tx
                    .scan::<Ticket>()
                    .filter(|t| filter.matches(t))
                    .cloned()
                    .collect())
            }
        }
    }

    /// Replace the seat label and price of the ticket matched by id and
    /// event. The status column is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no ticket matches, or
    /// [`DbError::Duplicate`] if the new seat label is taken.
    pub async fn update(&mut self, ticket: &Ticket) -> Result<Ticket, DbError> {
        let updated = match &mut *self.tx {
            Transaction::Postgres(tx) => sqlx::query_as::<_, TicketRow>(
                r"UPDATE tickets SET seat_number = $3, price = $4
                  WHERE id = $1 AND event_id = $2
                  RETURNING id, event_id, seat_number, price, status",
            )
            .bind(id_bytes(ticket.id))
            .bind(id_bytes(ticket.event_id))
            .bind(ticket.seat_number.as_str())
            .bind(ticket.price)
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from_sqlx)?
            .map(TicketRow::into_ticket)
            .transpose()?,
            Transaction::Memory(tx) => {
                tx.enter(Operation::UpdateTicket).await?;
                match tx
                    .get::<Ticket>(ticket.id)
                    .filter(|current| current.event_id == ticket.event_id)
                    .cloned()
                {
                    Some(current) => {
                        let updated = Ticket {
                            seat_number: ticket.seat_number.clone(),
                            price: ticket.price,
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

    /// Delete every ticket matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if nothing matched.
    pub async fn delete(&mut self, filter: &TicketFilter) -> Result<(), DbError> {
        let deleted = match &mut *self.tx {
            Transaction::Postgres(tx) => sqlx::query(
                r"DELETE FROM tickets
                  WHERE ($1::BYTEA IS NULL OR id = $1)
                    AND ($2::BYTEA IS NULL OR event_id = $2)
                    AND ($3::TEXT IS NULL OR seat_number = $3)",
            )
            .bind(filter.id.map(id_bytes))
            .bind(filter.event_id.map(id_bytes))
            .bind(filter.seat_number.as_deref())
            .execute(&mut **tx)
            .await
            .map_err(DbError::from_sqlx)?
            .rows_affected(),
            Transaction::Memory(tx) => {
                tx.enter(Operation::DeleteTickets).await?;
                tx.remove_where::<Ticket>(|t| filter.matches(t))
            }
        };
        if deleted == 0 {
            return Err(DbError::NotFound {
                collection: COLLECTION,
            });
        }
        tracing::debug!(count = deleted, "Deleted tickets");
        Ok(())
    }

    /// Delete every ticket of an event, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    pub async fn delete_by_event(&mut self, event_id: EventId) -> Result<u64, DbError> {
        let deleted = match &mut *self.tx {
            Transaction::Postgres(tx) => sqlx::query("DELETE FROM tickets WHERE event_id = $1")
                .bind(id_bytes(event_id))
                .execute(&mut **tx)
                .await
                .map_err(DbError::from_sqlx)?
                .rows_affected(),
            Transaction::Memory(tx) => {
                tx.enter(Operation::DeleteTickets).await?;
                tx.remove_where::<Ticket>(|t| t.event_id == event_id)
            }
        };
        tracing::debug!(event_id = %event_id, count = deleted, "Deleted tickets of event");
        Ok(deleted)
    }

    /// Atomically flip a ticket from available to reserved.
    ///
    /// The status check and the write happen in one statement, so two
    /// callers can never both see `reserved = true`. A caller that loses
    /// the race either sees `reserved = false` or, when both ran
    /// concurrently, gets a transient conflict and sees `reserved = false`
    /// on retry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the statement fails.
    pub async fn attempt_reserve(
        &mut self,
        event_id: EventId,
        ticket_id: TicketId,
    ) -> Result<ReserveOutcome, DbError> {
        let outcome = match &mut *self.tx {
            Transaction::Postgres(tx) => {
                let (reserved, found) = sqlx::query_as::<_, (bool, bool)>(
                    r"WITH flipped AS (
                          UPDATE tickets SET status = 'reserved'
                          WHERE id = $1 AND event_id = $2 AND status = 'available'
                          RETURNING id
                      )
                      SELECT EXISTS (SELECT 1 FROM flipped) AS reserved,
                             EXISTS (SELECT 1 FROM flipped)
                               OR EXISTS (SELECT 1 FROM tickets WHERE id = $1 AND event_id = $2) AS found",
                )
                .bind(id_bytes(ticket_id))
                .bind(id_bytes(event_id))
                .fetch_one(&mut **tx)
                .await
                .map_err(DbError::from_sqlx)?;
                ReserveOutcome { found, reserved }
            }
            Transaction::Memory(tx) => {
                tx.enter(Operation::ReserveTicket).await?;
                match tx
                    .get::<Ticket>(ticket_id)
                    .filter(|t| t.event_id == event_id)
                    .cloned()
                {
                    None => ReserveOutcome {
                        found: false,
                        reserved: false,
                    },
                    Some(ticket) if ticket.is_available() => {
                        tx.put(Ticket {
                            status: TicketStatus::Reserved,
                            ..ticket
                        })?;
                        ReserveOutcome {
                            found: true,
                            reserved: true,
                        }
                    }
                    Some(_) => ReserveOutcome {
                        found: true,
                        reserved: false,
                    },
                }
            }
        };
        tracing::debug!(
            event_id = %event_id,
            ticket_id = %ticket_id,
            found = outcome.found,
            reserved = outcome.reserved,
            "Attempted ticket reservation"
        );
        Ok(outcome)
    }

    /// Atomically flip a ticket from reserved back to available. Returns
    /// whether this call performed the transition.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the statement fails.
    pub async fn release(&mut self, event_id: EventId, ticket_id: TicketId) -> Result<bool, DbError> {
        let released = match &mut *self.tx {
            Transaction::Postgres(tx) => {
                sqlx::query(
                    r"UPDATE tickets SET status = 'available'
                      WHERE id = $1 AND event_id = $2 AND status = 'reserved'",
                )
                .bind(id_bytes(ticket_id))
                .bind(id_bytes(event_id))
                .execute(&mut **tx)
                .await
                .map_err(DbError::from_sqlx)?
                .rows_affected()
                    > 0
            }
            Transaction::Memory(tx) => {
                tx.enter(Operation::ReleaseTicket).await?;
                match tx
                    .get::<Ticket>(ticket_id)
                    .filter(|t| t.event_id == event_id && t.status == TicketStatus::Reserved)
                    .cloned()
                {
                    Some(ticket) => {
                        tx.put(Ticket {
                            status: TicketStatus::Available,
                            ..ticket
                        })?;
                        true
                    }
                    None => false,
                }
            }
        };
        tracing::debug!(ticket_id = %ticket_id, released, "Released ticket");
        Ok(released)
    }
}

/// A row from the `tickets` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TicketRow {
    id: Vec<u8>,
    event_id: Vec<u8>,
    seat_number: String,
    price: i64,
    status: String,
}

impl TicketRow {
    fn into_ticket(self) -> Result<Ticket, DbError> {
        Ok(Ticket {
            id: decode_id(COLLECTION, &self.id)?,
            event_id: decode_id(COLLECTION, &self.event_id)?,
            seat_number: self.seat_number,
            price: self.price,
            status: self
                .status
                .parse()
                .map_err(|e| DbError::invalid_row(COLLECTION, e))?,
        })
    }
}
