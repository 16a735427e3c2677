//! Coordinators for the SkyTicket reservation core.
//!
//! The coordinators implement the booking policies on top of the storage
//! layer in `skyticket-db`. Each public operation runs inside a
//! [`skyticket_db::UnitOfWork`] and reports a [`BookingError`].
//!
//! # Architecture
//!
//! ```text
//! TicketingService
//!   ├── EventCoordinator        create / get / list / update events
//!   ├── TicketCoordinator       seat and date policy for tickets
//!   ├── ReservationCoordinator  reserve, rename, cancel
//!   └── CascadeCoordinator      event and ticket deletion
//!             │
//!        UnitOfWork (retry on transient conflicts)
//!             │
//!        Database: PostgreSQL | in-memory
//! ```
//!
//! # Modules
//!
//! - [`config`] -- Layered service configuration
//! - [`telemetry`] -- `tracing` subscriber setup
//! - [`clock`] -- Source of "now" for date policies
//! - [`error`] -- Booking error taxonomy
//! - [`event`], [`ticket`], [`reservation`], [`cascade`] -- Coordinators
//! - [`service`] -- Wiring

pub mod cascade;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod reservation;
pub mod service;
pub mod telemetry;
pub mod ticket;

pub use cascade::{CascadeCoordinator, CascadeSummary};
pub use clock::Clock;
pub use config::{
    CancellationPolicy, ConfigError, DatabaseConfig, LogConfig, ReservationConfig, RetryConfig,
    ServiceConfig,
};
pub use error::{BookingError, ErrorKind};
pub use event::EventCoordinator;
pub use reservation::ReservationCoordinator;
pub use service::TicketingService;
pub use telemetry::init_tracing;
pub use ticket::{TicketCoordinator, TicketUpdate};
