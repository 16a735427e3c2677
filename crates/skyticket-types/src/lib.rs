//! Shared type definitions for the SkyTicket reservation core.
//!
//! This crate is the single source of truth for the document types used
//! across the workspace: the storage layer persists them and the
//! coordinators hand them back to callers.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe wrappers around BSON object ids
//! - [`enums`] -- Ticket and reservation status enumerations
//! - [`structs`] -- Event, ticket, and reservation documents

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ReservationStatus, TicketStatus, UnknownStatus};
pub use ids::{
    EventId, IdError, OBJECT_ID_HEX_LEN, OBJECT_ID_LEN, ObjectId, ReservationId, TicketId,
    object_id_from_slice, parse_object_id,
};
pub use structs::{Event, NewEvent, NewReservation, NewTicket, Reservation, Ticket};
