//! Reservation coordinator: the reservation protocol and reservation
//! reads, renames, and cancellations.
//!
//! # Protocol
//!
//! ```text
//! parse ids ── find event ── date passed? ──yes──> EventAlreadyPassed (no writes)
//!                                  │no
//!                 ┌────────── UnitOfWork ──────────┐
//!                 │ attempt_reserve(event, ticket) │
//!                 │   found = false  -> abort      │──> TicketNotFound
//!                 │   reserved = false -> abort    │──> TicketAlreadyReserved
//!                 │   insert reservation (active)  │
//!                 └──────────── commit ────────────┘──> Reservation
//! ```
//!
//! Concurrent reservations of one ticket are arbitrated only by
//! [`skyticket_db::TicketStore::attempt_reserve`]; no in-process lock is
//! taken.

use futures::FutureExt;
use skyticket_db::{
    EventStore, ReservationFilter, ReservationStore, TicketFilter, TicketStore, Transaction,
    UnitOfWork,
};
use skyticket_types::{EventId, NewReservation, Reservation, Ticket, TicketId};

use crate::clock::Clock;
use crate::config::CancellationPolicy;
use crate::error::BookingError;

/// Reservation operations.
#[derive(Debug, Clone)]
pub struct ReservationCoordinator {
    uow: UnitOfWork,
    clock: Clock,
    policy: CancellationPolicy,
}

impl ReservationCoordinator {
    /// Create a coordinator running on `uow`.
    pub const fn new(uow: UnitOfWork, clock: Clock, policy: CancellationPolicy) -> Self {
        Self { uow, clock, policy }
    }

    /// The cancellation policy in effect.
    pub const fn cancellation_policy(&self) -> CancellationPolicy {
        self.policy
    }

    /// Reserve a ticket for a customer.
    ///
    /// Fails with [`BookingError::NotFound`] if the event does not exist,
    /// [`BookingError::EventAlreadyPassed`] if its date is before now (no
    /// transaction is opened in that case),
    /// [`BookingError::TicketNotFound`] if the ticket does not exist under
    /// the event, and [`BookingError::TicketAlreadyReserved`] if another
    /// reservation holds it.
    pub async fn create_reservation(
        &self,
        event_id: &str,
        ticket_id: &str,
        customer_name: &str,
    ) -> Result<Reservation, BookingError> {
        let event_id = EventId::parse(event_id)?;
        let ticket_id = TicketId::parse(ticket_id)?;

        let event = self
            .uow
            .run("find_event", move |tx| {
                async move {
                    EventStore::new(tx)
                        .find_by_id(event_id)
                        .await
                        .map_err(BookingError::from)
                }
                .boxed()
            })
            .await?;

        let now = self.clock.now();
        if event.has_passed(now) {
            tracing::info!(
                event_id = %event_id,
                event_date = %event.date,
                "Reservation refused, event already passed"
            );
            return Err(BookingError::EventAlreadyPassed);
        }

        let customer_name = customer_name.to_owned();
        let reservation = self
            .uow
            .run("create_reservation", move |tx| {
                let customer_name = customer_name.clone();
                async move {
                    let outcome = TicketStore::new(tx)
                        .attempt_reserve(event_id, ticket_id)
                        .await?;
                    if !outcome.found {
                        return Err(BookingError::TicketNotFound);
                    }
                    if !outcome.reserved {
                        return Err(BookingError::TicketAlreadyReserved);
                    }

                    ReservationStore::new(tx)
                        .create(NewReservation {
                            ticket_id,
                            event_id,
                            customer_name,
                            reserved_at: now,
                        })
                        .await
                        .map_err(BookingError::from)
                }
                .boxed()
            })
            .await?;

        tracing::info!(
            reservation_id = %reservation.id,
            ticket_id = %ticket_id,
            event_id = %event_id,
            "Reservation created"
        );
        Ok(reservation)
    }

    /// Fetch the reservation holding a ticket.
    ///
    /// Fails with [`BookingError::NotFound`] if the ticket does not exist
    /// under the event or has no reservation.
    pub async fn get_reservation(
        &self,
        event_id: &str,
        ticket_id: &str,
    ) -> Result<Reservation, BookingError> {
        let event_id = EventId::parse(event_id)?;
        let ticket_id = TicketId::parse(ticket_id)?;
        self.uow
            .run("get_reservation", move |tx| {
                async move {
                    let ticket = resolve_ticket(tx, event_id, ticket_id).await?;
                    ReservationStore::new(tx)
                        .find_one(&ReservationFilter::new().ticket(ticket.id))
                        .await
                        .map_err(BookingError::from)
                }
                .boxed()
            })
            .await
    }

    /// Replace the customer name on the reservation holding a ticket.
    /// Statuses and the event date are not consulted.
    ///
    /// Fails with [`BookingError::NotFound`] if the ticket does not exist
    /// under the event or has no reservation.
    pub async fn update_reservation(
        &self,
        event_id: &str,
        ticket_id: &str,
        customer_name: &str,
    ) -> Result<Reservation, BookingError> {
        let event_id = EventId::parse(event_id)?;
        let ticket_id = TicketId::parse(ticket_id)?;
        let customer_name = customer_name.to_owned();

        let reservation = self
            .uow
            .run("update_reservation", move |tx| {
                let customer_name = customer_name.clone();
                async move {
                    let ticket = resolve_ticket(tx, event_id, ticket_id).await?;
                    ReservationStore::new(tx)
                        .update_customer_name(ticket.id, &customer_name)
                        .await
                        .map_err(BookingError::from)
                }
                .boxed()
            })
            .await?;

        tracing::info!(reservation_id = %reservation.id, "Reservation updated");
        Ok(reservation)
    }

    /// Cancel the reservation holding a ticket by deleting it. Under
    /// [`CancellationPolicy::ReleaseTicket`] the ticket becomes available
    /// again in the same transaction.
    ///
    /// Fails with [`BookingError::NotFound`] if the ticket does not exist
    /// under the event or has no reservation.
    pub async fn cancel_reservation(&self, event_id: &str, ticket_id: &str) -> Result<(), BookingError> {
        let event_id = EventId::parse(event_id)?;
        let ticket_id = TicketId::parse(ticket_id)?;
        let policy = self.policy;

        let released = self
            .uow
            .run("cancel_reservation", move |tx| {
                async move {
                    let ticket = resolve_ticket(tx, event_id, ticket_id).await?;
                    ReservationStore::new(tx)
                        .delete(&ReservationFilter::new().ticket(ticket.id))
                        .await?;
                    let released = match policy {
                        CancellationPolicy::ReleaseTicket => {
                            TicketStore::new(tx).release(event_id, ticket.id).await?
                        }
                        CancellationPolicy::RetainTicketStatus => false,
                    };
                    Ok::<_, BookingError>(released)
                }
                .boxed()
            })
            .await?;

        tracing::info!(
            event_id = %event_id,
            ticket_id = %ticket_id,
            released,
            ?policy,
            "Reservation cancelled"
        );
        Ok(())
    }
}

/// Look up a ticket by id under an event.
async fn resolve_ticket(
    tx: &mut Transaction,
    event_id: EventId,
    ticket_id: TicketId,
) -> Result<Ticket, BookingError> {
    Ok(TicketStore::new(tx)
        .find_one(&TicketFilter::new().id(ticket_id).event(event_id))
        .await?)
}
