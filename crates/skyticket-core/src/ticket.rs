//! Ticket coordinator: creation and update policy, ticket reads.
//!
//! Seat labels are unique per event. The coordinator checks this with a
//! read before writing to report [`BookingError::SeatNumberTaken`] on the
//! common path; the unique index in both backends catches the concurrent
//! case, which is classified the same way.

use futures::FutureExt;
use skyticket_db::{EventStore, TicketFilter, TicketStore, UnitOfWork};
use skyticket_types::{EventId, NewTicket, Ticket, TicketId};

use crate::clock::Clock;
use crate::error::BookingError;

/// Fields replaced by [`TicketCoordinator::update_ticket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketUpdate {
    /// New seat label. `None` (or an empty label) keeps the current one.
    pub seat_number: Option<String>,
    /// New price in minor currency units.
    pub price: i64,
}

/// Ticket operations.
#[derive(Debug, Clone)]
pub struct TicketCoordinator {
    uow: UnitOfWork,
    clock: Clock,
}

impl TicketCoordinator {
    /// Create a coordinator running on `uow`.
    pub const fn new(uow: UnitOfWork, clock: Clock) -> Self {
        Self { uow, clock }
    }

    /// Create an available ticket under an upcoming event.
    ///
    /// Fails with [`BookingError::EventNotFound`] if the event does not
    /// exist, [`BookingError::EventAlreadyPassed`] if its date is before
    /// now, and [`BookingError::SeatNumberTaken`] if the event already has
    /// a ticket with this seat label.
    pub async fn create_ticket(
        &self,
        event_id: &str,
        seat_number: &str,
        price: i64,
    ) -> Result<Ticket, BookingError> {
        let event_id = EventId::parse(event_id)?;
        let seat_number = seat_number.to_owned();
        let now = self.clock.now();

        let ticket = self
            .uow
            .run("create_ticket", move |tx| {
                let seat_number = seat_number.clone();
                async move {
                    let event = EventStore::new(tx)
                        .find_by_id(event_id)
                        .await
                        .map_err(BookingError::missing_event)?;
                    if event.has_passed(now) {
                        return Err(BookingError::EventAlreadyPassed);
                    }

                    let mut tickets = TicketStore::new(tx);
                    let taken = tickets
                        .find(&TicketFilter::new().event(event_id).seat(seat_number.as_str()))
                        .await?;
                    if !taken.is_empty() {
                        return Err(BookingError::SeatNumberTaken);
                    }

                    tickets
                        .create(NewTicket {
                            event_id,
                            seat_number,
                            price,
                        })
                        .await
                        .map_err(BookingError::from)
                }
                .boxed()
            })
            .await?;

        tracing::info!(
            ticket_id = %ticket.id,
            event_id = %ticket.event_id,
            seat = %ticket.seat_number,
            "Ticket created"
        );
        Ok(ticket)
    }

    /// Replace the seat label and price of a ticket. Status is untouched.
    ///
    /// Fails with [`BookingError::NotFound`] if the ticket does not exist
    /// under the event, and [`BookingError::SeatNumberTaken`] if another
    /// ticket of the event holds the new seat label.
    pub async fn update_ticket(
        &self,
        ticket_id: &str,
        event_id: &str,
        update: TicketUpdate,
    ) -> Result<Ticket, BookingError> {
        let ticket_id = TicketId::parse(ticket_id)?;
        let event_id = EventId::parse(event_id)?;

        let ticket = self
            .uow
            .run("update_ticket", move |tx| {
                let update = update.clone();
                async move {
                    let mut tickets = TicketStore::new(tx);
                    let current = tickets
                        .find_one(&TicketFilter::new().id(ticket_id).event(event_id))
                        .await?;

                    let seat_number = update.seat_number.filter(|seat| !seat.is_empty());
                    if let Some(seat) = seat_number.as_deref() {
                        match tickets
                            .find_one(&TicketFilter::new().event(event_id).seat(seat))
                            .await
                        {
                            Ok(holder) if holder.id != ticket_id => {
                                return Err(BookingError::SeatNumberTaken);
                            }
                            Ok(_) => {}
                            Err(err) if err.is_not_found() => {}
                            Err(err) => return Err(err.into()),
                        }
                    }

                    let replacement = Ticket {
                        seat_number: seat_number.unwrap_or(current.seat_number),
                        price: update.price,
                        ..current
                    };
                    tickets
                        .update(&replacement)
                        .await
                        .map_err(BookingError::from)
                }
                .boxed()
            })
            .await?;

        tracing::info!(ticket_id = %ticket.id, event_id = %ticket.event_id, "Ticket updated");
        Ok(ticket)
    }

    /// Fetch one ticket of an event.
    pub async fn get_ticket(&self, ticket_id: &str, event_id: &str) -> Result<Ticket, BookingError> {
        let ticket_id = TicketId::parse(ticket_id)?;
        let event_id = EventId::parse(event_id)?;
        self.uow
            .run("get_ticket", move |tx| {
                async move {
                    TicketStore::new(tx)
                        .find_one(&TicketFilter::new().id(ticket_id).event(event_id))
                        .await
                        .map_err(BookingError::from)
                }
                .boxed()
            })
            .await
    }

    /// Every ticket of an event, in creation order.
    ///
    /// Fails with [`BookingError::EventNotFound`] if the event does not
    /// exist.
    pub async fn list_tickets(&self, event_id: &str) -> Result<Vec<Ticket>, BookingError> {
        let event_id = EventId::parse(event_id)?;
        self.uow
            .run("list_tickets", move |tx| {
                async move {
                    EventStore::new(tx)
                        .find_by_id(event_id)
                        .await
                        .map_err(BookingError::missing_event)?;
                    TicketStore::new(tx)
                        .find(&TicketFilter::new().event(event_id))
                        .await
                        .map_err(BookingError::from)
                }
                .boxed()
            })
            .await
    }
}
