//! Shared fixtures for the coordinator scenario tests.

#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use skyticket_core::{CancellationPolicy, Clock, ServiceConfig, TicketingService};
use skyticket_db::MemoryDatabase;
use skyticket_types::{Event, NewEvent, Ticket};

/// Configuration with millisecond backoff so retry tests stay fast.
pub fn test_config(policy: CancellationPolicy) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 8;
    config.reservations.cancellation_policy = policy;
    config
}

/// A service over a fresh memory database, plus the database handle for
/// journal and fail point access.
pub fn memory_service(policy: CancellationPolicy) -> (MemoryDatabase, TicketingService) {
    let db = MemoryDatabase::with_journal();
    let service = TicketingService::new(db.clone(), &test_config(policy));
    (db, service)
}

/// A second service over the same database whose clock is frozen at `now`.
pub fn service_at(db: &MemoryDatabase, now: DateTime<Utc>) -> TicketingService {
    TicketingService::with_clock(
        db.clone(),
        &test_config(CancellationPolicy::default()),
        Clock::Fixed(now),
    )
}

/// Create an event `days` days from now (negative for the past).
pub async fn event_in_days(service: &TicketingService, days: i64) -> Event {
    service
        .events()
        .create_event(NewEvent {
            name: "Orbital Jazz Night".to_owned(),
            date: Utc::now() + chrono::Duration::days(days),
            venue: "Dock 7".to_owned(),
        })
        .await
        .unwrap()
}

/// Create a ticket for `seat` under `event`.
pub async fn ticket(service: &TicketingService, event: &Event, seat: &str) -> Ticket {
    service
        .tickets()
        .create_ticket(&event.id.to_string(), seat, 4999)
        .await
        .unwrap()
}

/// Upper bound for tests that must not hang.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);
