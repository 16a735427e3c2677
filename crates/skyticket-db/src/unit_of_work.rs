//! Transaction boundaries with retry on transient conflicts.
//!
//! A [`UnitOfWork`] opens a transaction, hands it to a body closure, and
//! commits if the body succeeds. Transient failures (write conflicts,
//! serialization failures, deadlocks) re-run the whole body on a fresh
//! transaction with exponential backoff. The body therefore must own its
//! inputs and touch nothing outside the transaction it is given.
//!
//! ```text
//! attempt 1 ── begin ── body ── commit ──> Ok
//!                         │        │
//!                         └─ transient error ── sleep(delay) ── attempt 2 ...
//! ```

use std::fmt::Display;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::sleep;

use crate::database::{Database, Transaction};
use crate::error::{DbError, Transient};

/// Default maximum number of attempts per transaction.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first retry, in milliseconds.
const DEFAULT_INITIAL_DELAY_MS: u64 = 10;

/// Default cap on the delay between retries, in milliseconds.
const DEFAULT_MAX_DELAY_MS: u64 = 500;

/// How often, and how patiently, a transaction is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for the doubling delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after `delay`, doubled and capped.
    fn next_delay(&self, delay: Duration) -> Duration {
        delay.saturating_mul(2).min(self.max_delay)
    }
}

/// Runs transaction bodies against one [`Database`].
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    database: Database,
    policy: RetryPolicy,
}

impl UnitOfWork {
    /// Create a unit of work with the given retry policy.
    pub const fn new(database: Database, policy: RetryPolicy) -> Self {
        Self { database, policy }
    }

    /// Run `body` inside a transaction, committing on success.
    ///
    /// If the body or the commit fails with a transient error, the
    /// transaction is discarded and the body re-run on a new one, up to
    /// [`RetryPolicy::max_attempts`] times. Any other error rolls back and
    /// is returned immediately. When attempts run out the last error is
    /// returned.
    ///
    /// `label` names the unit in logs.
    pub async fn run<T, E, F>(&self, label: &'static str, mut body: F) -> Result<T, E>
    where
        F: for<'t> FnMut(&'t mut Transaction) -> BoxFuture<'t, Result<T, E>>,
        E: From<DbError> + Transient + Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;
        let mut delay = self.policy.initial_delay;

        loop {
            attempt = attempt.saturating_add(1);

            match self.attempt(label, &mut body).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(unit = label, attempt, "Transaction succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_transient() => {
                    if attempt >= max_attempts {
                        tracing::error!(
                            unit = label,
                            attempt,
                            error = %error,
                            "Transaction failed after all retries"
                        );
                        return Err(error);
                    }

                    tracing::warn!(
                        unit = label,
                        attempt,
                        error = %error,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Transient transaction failure, retrying after delay"
                    );
                    sleep(delay).await;
                    delay = self.policy.next_delay(delay);
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn attempt<T, E, F>(&self, label: &'static str, body: &mut F) -> Result<T, E>
    where
        F: for<'t> FnMut(&'t mut Transaction) -> BoxFuture<'t, Result<T, E>>,
        E: From<DbError> + Transient + Display,
    {
        let mut tx = self.database.begin().await?;

        match body(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                tracing::debug!(unit = label, "Transaction committed");
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(unit = label, error = %rollback, "Rollback failed");
                }
                tracing::debug!(unit = label, error = %error, "Transaction rolled back");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::Utc;
    use futures::FutureExt;
    use skyticket_types::{Event, NewEvent, NewTicket, Ticket};

    use super::*;
    use crate::event_store::EventStore;
    use crate::ticket_store::TicketStore;
    use crate::memory::{FailPoint, FailureMode, JournalEntry, MemoryDatabase, Operation};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn show() -> NewEvent {
        NewEvent {
            name: "Matinee".to_owned(),
            date: Utc::now(),
            venue: "Main Hall".to_owned(),
        }
    }

    #[test]
    fn delay_doubles_up_to_the_cap() {
        let policy = fast_policy(5);
        let mut delay = policy.initial_delay;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(delay.as_millis());
            delay = policy.next_delay(delay);
        }
        assert_eq!(seen, vec![1, 2, 4, 4]);
    }

    #[tokio::test]
    async fn success_commits_once() {
        let memory = MemoryDatabase::with_journal();
        let uow = UnitOfWork::new(Database::Memory(memory.clone()), fast_policy(3));

        let event = uow
            .run("create_event", |tx| {
                async move { EventStore::new(tx).create(show()).await }.boxed()
            })
            .await
            .unwrap();

        let journal = memory.journal();
        assert!(journal.contains(&JournalEntry::Commit { tx: 1 }));
        assert_eq!(event.venue, "Main Hall");
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let memory = MemoryDatabase::with_journal();
        memory.arm(FailPoint {
            operation: Operation::InsertEvent,
            mode: FailureMode::Transient { times: 2 },
        });
        let uow = UnitOfWork::new(Database::Memory(memory.clone()), fast_policy(3));
        let calls = Arc::new(AtomicU32::new(0));

        let result = uow
            .run("create_event", |tx| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    EventStore::new(tx).create(show()).await
                }
                .boxed()
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let rollbacks = memory
            .journal()
            .iter()
            .filter(|entry| matches!(entry, JournalEntry::Rollback { .. }))
            .count();
        assert_eq!(rollbacks, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_return_the_last_error() {
        let memory = MemoryDatabase::with_journal();
        memory.arm(FailPoint {
            operation: Operation::Commit,
            mode: FailureMode::Transient { times: 10 },
        });
        let uow = UnitOfWork::new(Database::Memory(memory.clone()), fast_policy(3));

        let result: Result<_, DbError> = uow
            .run("create_event", |tx| {
                async move { EventStore::new(tx).create(show()).await }.boxed()
            })
            .await;

        assert!(result.is_err_and(|e| e.is_transient()));
        let begins = memory
            .journal()
            .iter()
            .filter(|entry| matches!(entry, JournalEntry::Begin { .. }))
            .count();
        assert_eq!(begins, 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let memory = MemoryDatabase::new();
        memory.arm(FailPoint {
            operation: Operation::InsertEvent,
            mode: FailureMode::Fatal,
        });
        let uow = UnitOfWork::new(Database::Memory(memory.clone()), fast_policy(5));
        let calls = Arc::new(AtomicU32::new(0));

        let result = uow
            .run("create_event", |tx| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    EventStore::new(tx).create(show()).await
                }
                .boxed()
            })
            .await;

        assert!(matches!(result, Err(DbError::Injected { transient: false, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn body_errors_roll_back_staged_writes() {
        let memory = MemoryDatabase::new();
        let uow = UnitOfWork::new(Database::Memory(memory.clone()), fast_policy(1));

        let result: Result<(), DbError> = uow
            .run("create_then_fail", |tx| {
                async move {
                    EventStore::new(tx).create(show()).await?;
                    Err(DbError::NotFound { collection: "tickets" })
                }
                .boxed()
            })
            .await;
        assert!(result.is_err_and(|e| e.is_not_found()));

        let events = uow
            .run("list", |tx| async move { EventStore::new(tx).find_all().await }.boxed())
            .await
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(memory.committed_version(), 0);
    }

    #[tokio::test]
    async fn ticket_insert_racing_an_event_delete_is_retried_against_fresh_state() {
        let memory = MemoryDatabase::new();
        let uow = UnitOfWork::new(Database::Memory(memory.clone()), fast_policy(3));
        let event = uow
            .run("create_event", |tx| {
                async move { EventStore::new(tx).create(show()).await }.boxed()
            })
            .await
            .unwrap();
        let event_id = event.id;
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let racer = memory.clone();

        let result = uow
            .run("create_ticket", move |tx| {
                let counter = Arc::clone(&counter);
                let racer = racer.clone();
                async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst);
                    EventStore::new(tx).find_by_id(event_id).await?;
                    if attempt == 0 {
                        let mut cascade = racer.begin();
                        assert!(cascade.remove::<Event>(event_id).is_some());
                        cascade.commit().await?;
                    }
                    let seat = NewTicket {
                        event_id,
                        seat_number: "A1".to_owned(),
                        price: 1500,
                    };
                    TicketStore::new(tx).create(seat).await
                }
                .boxed()
            })
            .await;

        // The first attempt's commit conflicts; the retry no longer finds the event.
        assert!(result.is_err_and(|e| e.is_not_found()));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(memory.begin().scan::<Ticket>().count(), 0);
    }
}
