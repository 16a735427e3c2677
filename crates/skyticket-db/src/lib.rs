//! Data layer for the SkyTicket reservation core.
//!
//! Two interchangeable backends sit behind the [`Database`] enum:
//! `PostgreSQL` for production and an in-process transactional document
//! store for tests and embedding. The stores are short-lived views bound to
//! one open [`Transaction`], and [`UnitOfWork`] owns transaction boundaries
//! and retries.
//!
//! # Architecture
//!
//! ```text
//! UnitOfWork::run(body)
//!     |
//!     +-- Database::begin --> Transaction (Postgres | Memory)
//!     |
//!     +-- body(&mut tx)
//!     |     |-- EventStore       (events)
//!     |     |-- TicketStore      (tickets, attempt_reserve / release)
//!     |     +-- ReservationStore (reservations, keyed by ticket)
//!     |
//!     +-- commit, or retry the body on a transient conflict
//! ```
//!
//! # Modules
//!
//! - [`database`] -- Backend dispatch for databases and transactions
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`memory`] -- In-process document store with journal and fail points
//! - [`event_store`] -- Event CRUD
//! - [`ticket_store`] -- Ticket CRUD and the atomic reservation primitive
//! - [`reservation_store`] -- Reservation CRUD
//! - [`unit_of_work`] -- Transaction boundaries with retry
//! - [`error`] -- Shared error types

pub mod database;
pub mod error;
pub mod event_store;
pub mod memory;
pub mod postgres;
pub mod reservation_store;
pub mod ticket_store;
pub mod unit_of_work;

// Re-export primary types for convenience.
pub use database::{Database, Transaction};
pub use error::{DbError, Transient};
pub use event_store::EventStore;
pub use memory::{
    FailPoint, FailureMode, JournalEntry, MemoryDatabase, MemoryTransaction, Operation,
    RESERVATION_TICKET_CONSTRAINT, TICKET_SEAT_CONSTRAINT,
};
pub use postgres::{PostgresConfig, PostgresPool};
pub use reservation_store::{ReservationFilter, ReservationStore};
pub use ticket_store::{ReserveOutcome, TicketFilter, TicketStore};
pub use unit_of_work::{RetryPolicy, UnitOfWork};
