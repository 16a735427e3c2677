//! Document structs for events, tickets, and reservations.
//!
//! `New*` structs carry the caller-supplied fields of a document that does not
//! exist yet; the store assigns the id (and, for tickets, the initial status).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ReservationStatus, TicketStatus};
use crate::ids::{EventId, ReservationId, TicketId};

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A scheduled event that owns tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: EventId,
    /// Display name.
    pub name: String,
    /// When the event takes place.
    pub date: DateTime<Utc>,
    /// Where the event takes place.
    pub venue: String,
}

impl Event {
    /// Whether the event date lies strictly before `now`.
    pub fn has_passed(&self, now: DateTime<Utc>) -> bool {
        self.date < now
    }
}

/// Fields for creating or fully replacing an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Display name.
    pub name: String,
    /// When the event takes place.
    pub date: DateTime<Utc>,
    /// Where the event takes place.
    pub venue: String,
}

impl NewEvent {
    /// Attach an id, producing the stored document.
    pub fn with_id(self, id: EventId) -> Event {
        Event {
            id,
            name: self.name,
            date: self.date,
            venue: self.venue,
        }
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// A single seat for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique ticket identifier.
    pub id: TicketId,
    /// The owning event.
    pub event_id: EventId,
    /// Seat label, unique within the event (e.g. `"A12"`).
    pub seat_number: String,
    /// Price in minor currency units.
    pub price: i64,
    /// Reservation state.
    pub status: TicketStatus,
}

impl Ticket {
    /// Whether the ticket can still be reserved.
    pub fn is_available(&self) -> bool {
        self.status == TicketStatus::Available
    }
}

/// Fields for creating a ticket. New tickets always start
/// [`TicketStatus::Available`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    /// The owning event.
    pub event_id: EventId,
    /// Seat label, unique within the event.
    pub seat_number: String,
    /// Price in minor currency units.
    pub price: i64,
}

impl NewTicket {
    /// Attach an id, producing an available ticket.
    pub fn with_id(self, id: TicketId) -> Ticket {
        Ticket {
            id,
            event_id: self.event_id,
            seat_number: self.seat_number,
            price: self.price,
            status: TicketStatus::Available,
        }
    }
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// A customer's claim on exactly one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique reservation identifier.
    pub id: ReservationId,
    /// The reserved ticket.
    pub ticket_id: TicketId,
    /// The event owning the reserved ticket.
    pub event_id: EventId,
    /// Name of the customer holding the reservation.
    pub customer_name: String,
    /// When the reservation was made.
    pub reserved_at: DateTime<Utc>,
    /// Lifecycle state.
    pub status: ReservationStatus,
}

impl Reservation {
    /// Whether the reservation currently holds its ticket.
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }
}

/// Fields for creating a reservation. New reservations always start
/// [`ReservationStatus::Active`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    /// The reserved ticket.
    pub ticket_id: TicketId,
    /// The event owning the reserved ticket.
    pub event_id: EventId,
    /// Name of the customer.
    pub customer_name: String,
    /// When the reservation was made.
    pub reserved_at: DateTime<Utc>,
}

impl NewReservation {
    /// Attach an id, producing an active reservation.
    pub fn with_id(self, id: ReservationId) -> Reservation {
        Reservation {
            id,
            ticket_id: self.ticket_id,
            event_id: self.event_id,
            customer_name: self.customer_name,
            reserved_at: self.reserved_at,
            status: ReservationStatus::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn event_has_passed_is_strict() {
        let now = Utc::now();
        let event = NewEvent {
            name: "Launch".to_owned(),
            date: now,
            venue: "Hangar 1".to_owned(),
        }
        .with_id(EventId::new());

        assert!(!event.has_passed(now));
        assert!(event.has_passed(now + Duration::seconds(1)));
        assert!(!event.has_passed(now - Duration::days(1)));
    }

    #[test]
    fn new_ticket_starts_available() {
        let ticket = NewTicket {
            event_id: EventId::new(),
            seat_number: "A1".to_owned(),
            price: 4999,
        }
        .with_id(TicketId::new());

        assert!(ticket.is_available());
        assert_eq!(ticket.price, 4999);
    }

    #[test]
    fn new_reservation_starts_active() {
        let reservation = NewReservation {
            ticket_id: TicketId::new(),
            event_id: EventId::new(),
            customer_name: "Ada Lovelace".to_owned(),
            reserved_at: Utc::now(),
        }
        .with_id(ReservationId::new());

        assert!(reservation.is_active());
    }

    #[test]
    fn ticket_serializes_with_hex_ids_and_lowercase_status() {
        let ticket = NewTicket {
            event_id: EventId::parse("65a1f0c2e4b0a1b2c3d4e5f6").unwrap_or_default(),
            seat_number: "B7".to_owned(),
            price: 1250,
        }
        .with_id(TicketId::parse("65a1f0c2e4b0a1b2c3d4e5f7").unwrap_or_default());

        let value = serde_json::to_value(&ticket).unwrap_or_default();
        assert_eq!(value["event_id"], "65a1f0c2e4b0a1b2c3d4e5f6");
        assert_eq!(value["id"], "65a1f0c2e4b0a1b2c3d4e5f7");
        assert_eq!(value["status"], "available");
        assert_eq!(value["price"], 1250);
    }
}
