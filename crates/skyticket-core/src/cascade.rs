//! Cascade coordinator: deletions that span collections.
//!
//! Deleting an event removes its reservations, then its tickets, then the
//! event itself, all in one transaction. Deleting a ticket removes the
//! ticket and any reservation holding it. A failure at any step rolls back
//! every earlier step.

use futures::FutureExt;
use skyticket_db::{EventStore, ReservationStore, TicketFilter, TicketStore, UnitOfWork};
use skyticket_types::{EventId, TicketId};

use crate::error::BookingError;

/// Counts of documents removed by [`CascadeCoordinator::delete_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CascadeSummary {
    /// Reservations removed.
    pub reservations: u64,
    /// Tickets removed.
    pub tickets: u64,
}

/// Multi-collection deletions.
#[derive(Debug, Clone)]
pub struct CascadeCoordinator {
    uow: UnitOfWork,
}

impl CascadeCoordinator {
    /// Create a coordinator running on `uow`.
    pub const fn new(uow: UnitOfWork) -> Self {
        Self { uow }
    }

    /// Delete an event together with its tickets and reservations.
    ///
    /// Fails with [`BookingError::NotFound`] if the event does not exist,
    /// in which case nothing is deleted.
    pub async fn delete_event(&self, event_id: &str) -> Result<CascadeSummary, BookingError> {
        let event_id = EventId::parse(event_id)?;
        let summary = self
            .uow
            .run("delete_event", move |tx| {
                async move {
                    let reservations = ReservationStore::new(tx).delete_by_event(event_id).await?;
                    let tickets = TicketStore::new(tx).delete_by_event(event_id).await?;
                    EventStore::new(tx).delete(event_id).await?;
                    Ok::<_, BookingError>(CascadeSummary {
                        reservations,
                        tickets,
                    })
                }
                .boxed()
            })
            .await?;

        tracing::info!(
            event_id = %event_id,
            reservations = summary.reservations,
            tickets = summary.tickets,
            "Event deleted"
        );
        Ok(summary)
    }

    /// Delete a ticket of an event and any reservation holding it.
    ///
    /// Fails with [`BookingError::NotFound`] if the ticket does not exist
    /// under the event, in which case nothing is deleted.
    pub async fn delete_ticket(&self, event_id: &str, ticket_id: &str) -> Result<(), BookingError> {
        let event_id = EventId::parse(event_id)?;
        let ticket_id = TicketId::parse(ticket_id)?;
        let reservations = self
            .uow
            .run("delete_ticket", move |tx| {
                async move {
                    TicketStore::new(tx)
                        .delete(&TicketFilter::new().id(ticket_id).event(event_id))
                        .await?;
                    ReservationStore::new(tx)
                        .delete_by_ticket(ticket_id)
                        .await
                        .map_err(BookingError::from)
                }
                .boxed()
            })
            .await?;

        tracing::info!(
            event_id = %event_id,
            ticket_id = %ticket_id,
            reservations,
            "Ticket deleted"
        );
        Ok(())
    }
}
