//! Event coordinator: create, read, and replace events.
//!
//! Deleting an event is not offered here because it must remove the
//! event's tickets and reservations too; see
//! [`crate::cascade::CascadeCoordinator::delete_event`].

use futures::FutureExt;
use skyticket_db::{EventStore, UnitOfWork};
use skyticket_types::{Event, EventId, NewEvent};

use crate::error::BookingError;

/// Event operations.
#[derive(Debug, Clone)]
pub struct EventCoordinator {
    uow: UnitOfWork,
}

impl EventCoordinator {
    /// Create a coordinator running on `uow`.
    pub const fn new(uow: UnitOfWork) -> Self {
        Self { uow }
    }

    /// Create an event.
    pub async fn create_event(&self, event: NewEvent) -> Result<Event, BookingError> {
        let event = self
            .uow
            .run("create_event", move |tx| {
                let event = event.clone();
                async move { EventStore::new(tx).create(event).await.map_err(BookingError::from) }.boxed()
            })
            .await?;
        tracing::info!(event_id = %event.id, date = %event.date, "Event created");
        Ok(event)
    }

    /// Fetch one event.
    pub async fn get_event(&self, event_id: &str) -> Result<Event, BookingError> {
        let event_id = EventId::parse(event_id)?;
        self.uow
            .run("get_event", move |tx| {
                async move {
                    EventStore::new(tx)
                        .find_by_id(event_id)
                        .await
                        .map_err(BookingError::from)
                }
                .boxed()
            })
            .await
    }

    /// Every event, in creation order.
    pub async fn list_events(&self) -> Result<Vec<Event>, BookingError> {
        self.uow
            .run("list_events", |tx| {
                async move { EventStore::new(tx).find_all().await.map_err(BookingError::from) }.boxed()
            })
            .await
    }

    /// Replace the name, date, and venue of an event.
    pub async fn update_event(&self, event_id: &str, fields: NewEvent) -> Result<Event, BookingError> {
        let event_id = EventId::parse(event_id)?;
        let event = self
            .uow
            .run("update_event", move |tx| {
                let event = fields.clone().with_id(event_id);
                async move { EventStore::new(tx).update(&event).await.map_err(BookingError::from) }.boxed()
            })
            .await?;
        tracing::info!(event_id = %event.id, "Event updated");
        Ok(event)
    }
}
