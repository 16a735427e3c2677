//! Service wiring: one database, one unit of work, four coordinators.

use skyticket_db::{Database, MemoryDatabase, PostgresPool, UnitOfWork};

use crate::cascade::CascadeCoordinator;
use crate::clock::Clock;
use crate::config::ServiceConfig;
use crate::error::BookingError;
use crate::event::EventCoordinator;
use crate::reservation::ReservationCoordinator;
use crate::ticket::TicketCoordinator;

/// Entry point bundling the coordinators over a shared [`UnitOfWork`].
///
/// Cloning is cheap; every clone talks to the same database.
#[derive(Debug, Clone)]
pub struct TicketingService {
    events: EventCoordinator,
    tickets: TicketCoordinator,
    reservations: ReservationCoordinator,
    cascade: CascadeCoordinator,
}

impl TicketingService {
    /// Build the coordinators over `database` using the system clock.
    pub fn new(database: impl Into<Database>, config: &ServiceConfig) -> Self {
        Self::with_clock(database, config, Clock::System)
    }

    /// Build the coordinators over `database` with an explicit clock.
    pub fn with_clock(database: impl Into<Database>, config: &ServiceConfig, clock: Clock) -> Self {
        let database = database.into();
        let uow = UnitOfWork::new(database.clone(), config.retry_policy());
        Self {
            events: EventCoordinator::new(uow.clone()),
            tickets: TicketCoordinator::new(uow.clone(), clock),
            reservations: ReservationCoordinator::new(
                uow.clone(),
                clock,
                config.reservations.cancellation_policy,
            ),
            cascade: CascadeCoordinator::new(uow),
        }
    }

    /// A service over a fresh in-memory database.
    pub fn in_memory(config: &ServiceConfig) -> Self {
        Self::new(MemoryDatabase::new(), config)
    }

    /// Connect to `PostgreSQL` as configured and build the service.
    /// Pending migrations are applied when `database.run_migrations` is set.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] if the pool cannot connect or a
    /// migration fails.
    pub async fn connect(config: &ServiceConfig) -> Result<Self, BookingError> {
        let pool = PostgresPool::connect(&config.postgres_config())
            .await
            .map_err(BookingError::Storage)?;
        if config.database.run_migrations {
            pool.run_migrations().await.map_err(BookingError::Storage)?;
        }
        tracing::info!(
            max_connections = config.database.max_connections,
            policy = ?config.reservations.cancellation_policy,
            "Ticketing service connected"
        );
        Ok(Self::new(pool, config))
    }

    /// Event operations.
    pub const fn events(&self) -> &EventCoordinator {
        &self.events
    }

    /// Ticket operations.
    pub const fn tickets(&self) -> &TicketCoordinator {
        &self.tickets
    }

    /// Reservation operations.
    pub const fn reservations(&self) -> &ReservationCoordinator {
        &self.reservations
    }

    /// Event and ticket deletion.
    pub const fn cascade(&self) -> &CascadeCoordinator {
        &self.cascade
    }
}
