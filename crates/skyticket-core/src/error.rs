//! Error taxonomy for the coordinators.
//!
//! Every coordinator operation fails with a [`BookingError`]. Storage
//! errors are classified where their meaning is known. Unique violations
//! map by constraint name, whether the statement or the commit reported
//! them: the seat index gives [`BookingError::SeatNumberTaken`], the
//! one-reservation-per-ticket index [`BookingError::TicketAlreadyReserved`].
//! A coordinator that looked up an event on behalf of a ticket turns a
//! missing document into [`BookingError::EventNotFound`]. Anything left over
//! is [`BookingError::Storage`].

use skyticket_db::{DbError, RESERVATION_TICKET_CONSTRAINT, TICKET_SEAT_CONSTRAINT, Transient};
use skyticket_types::IdError;

/// Errors returned by coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// An identifier was not 24 hex characters.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdError),

    /// No document matched.
    #[error("no matching document in {collection}")]
    NotFound {
        /// Collection that was searched.
        collection: &'static str,
    },

    /// The event a ticket was to be created under does not exist.
    #[error("event not found")]
    EventNotFound,

    /// The event date lies in the past.
    #[error("event has already passed")]
    EventAlreadyPassed,

    /// The ticket to reserve does not exist under the event.
    #[error("ticket not found")]
    TicketNotFound,

    /// Another reservation holds the ticket.
    #[error("ticket is already reserved")]
    TicketAlreadyReserved,

    /// Another ticket of the event uses the seat label.
    #[error("seat number is already taken")]
    SeatNumberTaken,

    /// The storage layer failed, including exhausted retries.
    #[error("storage error: {0}")]
    Storage(#[source] DbError),
}

/// The kind of a [`BookingError`], for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`BookingError::InvalidIdentifier`].
    InvalidIdentifier,
    /// See [`BookingError::NotFound`].
    NotFound,
    /// See [`BookingError::EventNotFound`].
    EventNotFound,
    /// See [`BookingError::EventAlreadyPassed`].
    EventAlreadyPassed,
    /// See [`BookingError::TicketNotFound`].
    TicketNotFound,
    /// See [`BookingError::TicketAlreadyReserved`].
    TicketAlreadyReserved,
    /// See [`BookingError::SeatNumberTaken`].
    SeatNumberTaken,
    /// See [`BookingError::Storage`].
    Storage,
}

impl BookingError {
    /// The payload-free kind of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::EventNotFound => ErrorKind::EventNotFound,
            Self::EventAlreadyPassed => ErrorKind::EventAlreadyPassed,
            Self::TicketNotFound => ErrorKind::TicketNotFound,
            Self::TicketAlreadyReserved => ErrorKind::TicketAlreadyReserved,
            Self::SeatNumberTaken => ErrorKind::SeatNumberTaken,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Classify a failed event lookup made on behalf of a ticket.
    pub(crate) fn missing_event(err: DbError) -> Self {
        if err.is_not_found() {
            Self::EventNotFound
        } else {
            err.into()
        }
    }
}

impl From<DbError> for BookingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { collection } => Self::NotFound { collection },
            DbError::Duplicate { ref constraint } if constraint == TICKET_SEAT_CONSTRAINT => {
                Self::SeatNumberTaken
            }
            DbError::Duplicate { ref constraint }
                if constraint == RESERVATION_TICKET_CONSTRAINT =>
            {
                Self::TicketAlreadyReserved
            }
            other => Self::Storage(other),
        }
    }
}

impl Transient for BookingError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_transient())
    }
}
