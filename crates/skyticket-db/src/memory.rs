//! In-process transactional document store.
//!
//! The memory backend keeps committed state as copy-on-write maps, one per
//! collection. Every document carries the version of the commit that last
//! wrote it. A transaction works on a private copy taken at `begin` and
//! remembers the version it saw for every document it writes. At commit
//! the store latch is taken, those versions are compared with the current
//! committed ones (any difference is a [`DbError::WriteConflict`]), the
//! foreign and unique constraints of the SQL schema are re-checked, and the
//! new state is published in one step.
//!
//! A written ticket or reservation whose parent is gone from the merged
//! state is also a [`DbError::WriteConflict`]: another transaction deleted
//! the parent after this one read it, so a retry re-reads and decides again.
//!
//! ```text
//! begin ──> snapshot (Arc clones) ──> reads/writes on private copy
//!                                          │
//! commit ──> lock ──> validate versions ──> check references ──> check unique ──> publish
//! ```
//!
//! Two testing hooks are built in: a [`JournalEntry`] log of every
//! transaction's lifecycle (off unless the store was built with
//! [`MemoryDatabase::with_journal`]), and [`FailPoint`]s that make a chosen
//! [`Operation`] fail, fail a few times, or never complete.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use skyticket_types::{Event, EventId, Reservation, ReservationId, Ticket, TicketId};

use crate::error::DbError;

/// Unique constraint on a ticket's seat label within its event.
pub const TICKET_SEAT_CONSTRAINT: &str = "tickets_event_id_seat_number_key";

/// Unique constraint allowing one reservation per ticket.
pub const RESERVATION_TICKET_CONSTRAINT: &str = "reservations_ticket_id_key";

// ---------------------------------------------------------------------------
// Operations, journal, fail points
// ---------------------------------------------------------------------------

/// A storage operation performed by a memory transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Event lookups.
    FindEvents,
    /// Event insert.
    InsertEvent,
    /// Event replace.
    UpdateEvent,
    /// Event delete.
    DeleteEvent,
    /// Ticket lookups.
    FindTickets,
    /// Ticket insert.
    InsertTicket,
    /// Ticket seat/price replace.
    UpdateTicket,
    /// Single or bulk ticket delete.
    DeleteTickets,
    /// Conditional AVAILABLE to RESERVED flip.
    ReserveTicket,
    /// Conditional RESERVED to AVAILABLE flip.
    ReleaseTicket,
    /// Reservation lookups.
    FindReservations,
    /// Reservation insert.
    InsertReservation,
    /// Reservation customer-name update.
    UpdateReservation,
    /// Single or bulk reservation delete.
    DeleteReservations,
    /// Transaction commit.
    Commit,
}

impl Operation {
    /// Snake-case name used in logs and errors.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FindEvents => "find_events",
            Self::InsertEvent => "insert_event",
            Self::UpdateEvent => "update_event",
            Self::DeleteEvent => "delete_event",
            Self::FindTickets => "find_tickets",
            Self::InsertTicket => "insert_ticket",
            Self::UpdateTicket => "update_ticket",
            Self::DeleteTickets => "delete_tickets",
            Self::ReserveTicket => "reserve_ticket",
            Self::ReleaseTicket => "release_ticket",
            Self::FindReservations => "find_reservations",
            Self::InsertReservation => "insert_reservation",
            Self::UpdateReservation => "update_reservation",
            Self::DeleteReservations => "delete_reservations",
            Self::Commit => "commit",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an armed fail point does when its operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Fail every time with a non-retryable error.
    Fatal,
    /// Fail the next `times` calls with a retryable error, then disarm.
    Transient {
        /// Remaining failures.
        times: u32,
    },
    /// Never complete. Used to exercise cancellation.
    Stall,
}

/// A failure armed on one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailPoint {
    /// The operation to intercept.
    pub operation: Operation,
    /// How to fail it.
    pub mode: FailureMode,
}

/// One entry of the transaction journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalEntry {
    /// A transaction was opened.
    Begin {
        /// Transaction id.
        tx: u64,
    },
    /// A transaction performed an operation.
    Operation {
        /// Transaction id.
        tx: u64,
        /// The operation.
        operation: Operation,
    },
    /// A transaction published its writes.
    Commit {
        /// Transaction id.
        tx: u64,
    },
    /// A transaction ended without publishing.
    Rollback {
        /// Transaction id.
        tx: u64,
    },
}

impl JournalEntry {
    /// The transaction this entry belongs to.
    pub const fn tx(&self) -> u64 {
        match *self {
            Self::Begin { tx }
            | Self::Operation { tx, .. }
            | Self::Commit { tx }
            | Self::Rollback { tx } => tx,
        }
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct Versioned<D> {
    version: u64,
    doc: D,
}

/// Identity of one document across all collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum DocKey {
    Event(EventId),
    Ticket(TicketId),
    Reservation(ReservationId),
}

type Table<K, D> = Arc<BTreeMap<K, Versioned<D>>>;

#[derive(Debug, Clone, Default)]
pub(crate) struct Collections {
    events: Table<EventId, Event>,
    tickets: Table<TicketId, Ticket>,
    reservations: Table<ReservationId, Reservation>,
    version: u64,
}

/// A document type stored by the memory backend.
pub(crate) trait Document: Clone {
    type Key: Ord + Copy;

    fn key(&self) -> Self::Key;
    fn doc_key(key: Self::Key) -> DocKey;
    fn table(collections: &Collections) -> &Table<Self::Key, Self>;
    fn table_mut(collections: &mut Collections) -> &mut Table<Self::Key, Self>;

    /// Name of the unique constraint `self` and `other` would jointly
    /// violate, if any.
    fn conflicts_with(&self, other: &Self) -> Option<&'static str>;
}

impl Document for Event {
    type Key = EventId;

    fn key(&self) -> EventId {
        self.id
    }

    fn doc_key(key: EventId) -> DocKey {
        DocKey::Event(key)
    }

    fn table(collections: &Collections) -> &Table<EventId, Self> {
        &collections.events
    }

    fn table_mut(collections: &mut Collections) -> &mut Table<EventId, Self> {
        &mut collections.events
    }

    fn conflicts_with(&self, _other: &Self) -> Option<&'static str> {
        None
    }
}

impl Document for Ticket {
    type Key = TicketId;

    fn key(&self) -> TicketId {
        self.id
    }

    fn doc_key(key: TicketId) -> DocKey {
        DocKey::Ticket(key)
    }

    fn table(collections: &Collections) -> &Table<TicketId, Self> {
        &collections.tickets
    }

    fn table_mut(collections: &mut Collections) -> &mut Table<TicketId, Self> {
        &mut collections.tickets
    }

    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        (self.id != other.id
            && self.event_id == other.event_id
            && self.seat_number == other.seat_number)
            .then_some(TICKET_SEAT_CONSTRAINT)
    }
}

impl Document for Reservation {
    type Key = ReservationId;

    fn key(&self) -> ReservationId {
        self.id
    }

    fn doc_key(key: ReservationId) -> DocKey {
        DocKey::Reservation(key)
    }

    fn table(collections: &Collections) -> &Table<ReservationId, Self> {
        &collections.reservations
    }

    fn table_mut(collections: &mut Collections) -> &mut Table<ReservationId, Self> {
        &mut collections.reservations
    }

    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        (self.id != other.id && self.ticket_id == other.ticket_id)
            .then_some(RESERVATION_TICKET_CONSTRAINT)
    }
}

fn version_of<D: Document>(collections: &Collections, key: D::Key) -> Option<u64> {
    D::table(collections).get(&key).map(|entry| entry.version)
}

fn copy_doc<D: Document>(target: &mut Collections, source: &Collections, key: D::Key, version: u64) {
    let doc = D::table(source).get(&key).map(|entry| entry.doc.clone());
    let table = Arc::make_mut(D::table_mut(target));
    match doc {
        Some(doc) => {
            table.insert(key, Versioned { version, doc });
        }
        None => {
            table.remove(&key);
        }
    }
}

fn violation<D: Document>(collections: &Collections, key: D::Key) -> Option<&'static str> {
    let entry = D::table(collections).get(&key)?;
    D::table(collections)
        .values()
        .find_map(|other| entry.doc.conflicts_with(&other.doc))
}

impl Collections {
    fn version_of(&self, key: DocKey) -> Option<u64> {
        match key {
            DocKey::Event(id) => version_of::<Event>(self, id),
            DocKey::Ticket(id) => version_of::<Ticket>(self, id),
            DocKey::Reservation(id) => version_of::<Reservation>(self, id),
        }
    }

    fn copy_from(&mut self, source: &Self, key: DocKey, version: u64) {
        match key {
            DocKey::Event(id) => copy_doc::<Event>(self, source, id, version),
            DocKey::Ticket(id) => copy_doc::<Ticket>(self, source, id, version),
            DocKey::Reservation(id) => copy_doc::<Reservation>(self, source, id, version),
        }
    }

    fn violation(&self, key: DocKey) -> Option<&'static str> {
        match key {
            DocKey::Event(id) => violation::<Event>(self, id),
            DocKey::Ticket(id) => violation::<Ticket>(self, id),
            DocKey::Reservation(id) => violation::<Reservation>(self, id),
        }
    }

    /// Whether the document at `key` refers to a parent that does not
    /// exist, or is a deleted event or ticket that still has children.
    fn dangling(&self, key: DocKey) -> bool {
        match key {
            DocKey::Event(id) => {
                !self.events.contains_key(&id)
                    && (self.tickets.values().any(|t| t.doc.event_id == id)
                        || self.reservations.values().any(|r| r.doc.event_id == id))
            }
            DocKey::Ticket(id) => match self.tickets.get(&id) {
                Some(ticket) => !self.events.contains_key(&ticket.doc.event_id),
                None => self.reservations.values().any(|r| r.doc.ticket_id == id),
            },
            DocKey::Reservation(id) => self.reservations.get(&id).is_some_and(|reservation| {
                !self.tickets.contains_key(&reservation.doc.ticket_id)
                    || !self.events.contains_key(&reservation.doc.event_id)
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Shared {
    committed: Mutex<Collections>,
    journaling: bool,
    journal: Mutex<Vec<JournalEntry>>,
    fail_points: Mutex<Vec<FailPoint>>,
    next_tx: AtomicU64,
}

impl Shared {
    fn record(&self, entry: JournalEntry) {
        if self.journaling {
            self.journal.lock().push(entry);
        }
    }

    /// Consume the first fail point armed on `operation`, if any.
    fn trip(&self, operation: Operation) -> Option<FailureMode> {
        let mut points = self.fail_points.lock();
        let index = points.iter().position(|point| point.operation == operation)?;
        let mode = points.get(index)?.mode;
        match mode {
            FailureMode::Transient { times } => {
                let remaining = times.saturating_sub(1);
                if remaining == 0 {
                    points.remove(index);
                } else if let Some(point) = points.get_mut(index) {
                    point.mode = FailureMode::Transient { times: remaining };
                }
                (times > 0).then_some(mode)
            }
            other => Some(other),
        }
    }

    fn publish(
        &self,
        working: &Collections,
        touched: &BTreeMap<DocKey, Option<u64>>,
    ) -> Result<(), DbError> {
        if touched.is_empty() {
            return Ok(());
        }

        let mut committed = self.committed.lock();
        if touched
            .iter()
            .any(|(key, seen)| committed.version_of(*key) != *seen)
        {
            return Err(DbError::WriteConflict);
        }

        let version = committed.version.saturating_add(1);
        let mut next = committed.clone();
        next.version = version;
        for key in touched.keys() {
            next.copy_from(working, *key, version);
        }
        if touched.keys().any(|key| next.dangling(*key)) {
            return Err(DbError::WriteConflict);
        }
        if let Some(constraint) = touched.keys().find_map(|key| next.violation(*key)) {
            return Err(DbError::Duplicate {
                constraint: constraint.to_owned(),
            });
        }

        *committed = next;
        Ok(())
    }
}

/// Handle to an in-process document store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

impl MemoryDatabase {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that records every transaction in its
    /// journal.
    pub fn with_journal() -> Self {
        Self {
            shared: Arc::new(Shared {
                journaling: true,
                ..Shared::default()
            }),
        }
    }

    /// Open a transaction on a snapshot of the committed state.
    pub fn begin(&self) -> MemoryTransaction {
        let id = self
            .shared
            .next_tx
            .fetch_add(1, Ordering::Relaxed)
            .saturating_add(1);
        let working = self.shared.committed.lock().clone();
        self.shared.record(JournalEntry::Begin { tx: id });
        MemoryTransaction {
            id,
            shared: Arc::clone(&self.shared),
            working,
            touched: BTreeMap::new(),
            finished: false,
        }
    }

    /// Arm a fail point. Fail points on the same operation fire in the
    /// order they were armed.
    pub fn arm(&self, point: FailPoint) {
        tracing::debug!(operation = %point.operation, mode = ?point.mode, "Armed fail point");
        self.shared.fail_points.lock().push(point);
    }

    /// Disarm every fail point.
    pub fn clear_fail_points(&self) {
        self.shared.fail_points.lock().clear();
    }

    /// Copy of the journal so far. Always empty unless the store was
    /// built with [`MemoryDatabase::with_journal`].
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.shared.journal.lock().clone()
    }

    /// Empty the journal.
    pub fn clear_journal(&self) {
        self.shared.journal.lock().clear();
    }

    /// Number of commits that published at least one write.
    pub fn committed_version(&self) -> u64 {
        self.shared.committed.lock().version
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A transaction on a [`MemoryDatabase`].
///
/// Dropping it without calling [`MemoryTransaction::commit`] discards
/// every staged write.
#[derive(Debug)]
pub struct MemoryTransaction {
    id: u64,
    shared: Arc<Shared>,
    working: Collections,
    /// Version each written document had when first written here.
    touched: BTreeMap<DocKey, Option<u64>>,
    finished: bool,
}

impl MemoryTransaction {
    /// Journal id of this transaction.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Journal `operation` and apply any fail point armed on it.
    pub(crate) async fn enter(&self, operation: Operation) -> Result<(), DbError> {
        self.shared.record(JournalEntry::Operation {
            tx: self.id,
            operation,
        });
        match self.shared.trip(operation) {
            None => Ok(()),
            Some(FailureMode::Fatal) => Err(DbError::Injected {
                operation: operation.to_string(),
                transient: false,
            }),
            Some(FailureMode::Transient { .. }) => Err(DbError::Injected {
                operation: operation.to_string(),
                transient: true,
            }),
            Some(FailureMode::Stall) => {
                tracing::debug!(tx = self.id, %operation, "Stalling on fail point");
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    pub(crate) fn get<D: Document>(&self, key: D::Key) -> Option<&D> {
        D::table(&self.working).get(&key).map(|entry| &entry.doc)
    }

    pub(crate) fn scan<'a, D: Document + 'a>(&'a self) -> impl Iterator<Item = &'a D> + 'a
    where
        D::Key: 'a,
    {
        D::table(&self.working).values().map(|entry| &entry.doc)
    }

    /// Insert or replace a document.
    pub(crate) fn put<D: Document>(&mut self, doc: D) -> Result<(), DbError> {
        if let Some(constraint) = D::table(&self.working)
            .values()
            .find_map(|other| doc.conflicts_with(&other.doc))
        {
            return Err(DbError::Duplicate {
                constraint: constraint.to_owned(),
            });
        }

        let key = doc.key();
        let seen = version_of::<D>(&self.working, key);
        self.touched.entry(D::doc_key(key)).or_insert(seen);
        Arc::make_mut(D::table_mut(&mut self.working)).insert(
            key,
            Versioned {
                version: seen.unwrap_or_default(),
                doc,
            },
        );
        Ok(())
    }

    pub(crate) fn remove<D: Document>(&mut self, key: D::Key) -> Option<D> {
        let seen = version_of::<D>(&self.working, key)?;
        self.touched.entry(D::doc_key(key)).or_insert(Some(seen));
        Arc::make_mut(D::table_mut(&mut self.working))
            .remove(&key)
            .map(|entry| entry.doc)
    }

    /// Remove every document matching `predicate`, returning how many were
    /// removed.
    pub(crate) fn remove_where<D: Document>(&mut self, predicate: impl Fn(&D) -> bool) -> u64 {
        let keys: Vec<D::Key> = self
            .scan::<D>()
            .filter(|doc| predicate(*doc))
            .map(|doc| doc.key())
            .collect();
        keys.into_iter()
            .filter_map(|key| self.remove::<D>(key))
            .fold(0_u64, |count, _| count.saturating_add(1))
    }

    /// Validate and publish every staged write.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::WriteConflict`] if a concurrent transaction
    /// committed a write to a document written here, or
    /// [`DbError::Duplicate`] if publishing would break a unique constraint.
    pub async fn commit(mut self) -> Result<(), DbError> {
        self.enter(Operation::Commit).await?;
        let result = self.shared.publish(&self.working, &self.touched);
        self.finished = true;
        let entry = match result {
            Ok(()) => JournalEntry::Commit { tx: self.id },
            Err(_) => JournalEntry::Rollback { tx: self.id },
        };
        self.shared.record(entry);
        result
    }

    /// Discard every staged write.
    pub fn rollback(mut self) {
        self.finished = true;
        self.shared.record(JournalEntry::Rollback { tx: self.id });
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.record(JournalEntry::Rollback { tx: self.id });
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use skyticket_types::{NewEvent, NewReservation, NewTicket, ReservationId, TicketStatus};

    use super::*;

    fn event() -> Event {
        NewEvent {
            name: "Arena Night".to_owned(),
            date: Utc::now(),
            venue: "Main Hall".to_owned(),
        }
        .with_id(EventId::new())
    }

    async fn seed_event(db: &MemoryDatabase) -> EventId {
        let e = event();
        let mut tx = db.begin();
        assert!(tx.put(e.clone()).is_ok());
        assert!(tx.commit().await.is_ok());
        e.id
    }

    fn ticket(event_id: EventId, seat: &str) -> Ticket {
        NewTicket {
            event_id,
            seat_number: seat.to_owned(),
            price: 1000,
        }
        .with_id(TicketId::new())
    }

    #[tokio::test]
    async fn committed_writes_are_visible_to_later_transactions() {
        let db = MemoryDatabase::new();
        let e = event();
        let t = ticket(e.id, "A1");

        let mut tx = db.begin();
        assert!(tx.put(e).is_ok());
        assert!(tx.put(t.clone()).is_ok());
        assert!(tx.commit().await.is_ok());

        let tx = db.begin();
        assert_eq!(tx.get::<Ticket>(t.id), Some(&t));
        assert_eq!(db.committed_version(), 1);
    }

    #[tokio::test]
    async fn dropped_transaction_publishes_nothing() {
        let db = MemoryDatabase::with_journal();
        let t = ticket(EventId::new(), "A1");

        {
            let mut tx = db.begin();
            assert!(tx.put(t.clone()).is_ok());
        }

        let tx = db.begin();
        assert!(tx.get::<Ticket>(t.id).is_none());
        assert!(matches!(
            db.journal().as_slice(),
            [
                JournalEntry::Begin { tx: 1 },
                JournalEntry::Rollback { tx: 1 },
                JournalEntry::Begin { tx: 2 },
            ]
        ));
    }

    #[tokio::test]
    async fn snapshot_ignores_later_commits() {
        let db = MemoryDatabase::new();
        let t = ticket(seed_event(&db).await, "A1");

        let reader = db.begin();
        let mut writer = db.begin();
        assert!(writer.put(t.clone()).is_ok());
        assert!(writer.commit().await.is_ok());

        assert!(reader.get::<Ticket>(t.id).is_none());
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_document_conflict() {
        let db = MemoryDatabase::new();
        let t = ticket(seed_event(&db).await, "A1");
        let mut setup = db.begin();
        assert!(setup.put(t.clone()).is_ok());
        assert!(setup.commit().await.is_ok());

        let mut first = db.begin();
        let mut second = db.begin();
        let reserved = Ticket {
            status: TicketStatus::Reserved,
            ..t.clone()
        };
        assert!(first.put(reserved.clone()).is_ok());
        assert!(second.put(reserved).is_ok());

        assert!(first.commit().await.is_ok());
        let err = second.commit().await;
        assert!(matches!(err, Err(DbError::WriteConflict)));
    }

    #[tokio::test]
    async fn unique_seat_is_checked_at_commit() {
        let db = MemoryDatabase::new();
        let event_id = seed_event(&db).await;

        let mut first = db.begin();
        let mut second = db.begin();
        assert!(first.put(ticket(event_id, "A12")).is_ok());
        assert!(second.put(ticket(event_id, "A12")).is_ok());

        assert!(first.commit().await.is_ok());
        let err = second.commit().await;
        assert!(matches!(
            err,
            Err(DbError::Duplicate { ref constraint }) if constraint == TICKET_SEAT_CONSTRAINT
        ));
    }

    #[tokio::test]
    async fn unique_seat_is_checked_on_put() {
        let db = MemoryDatabase::new();
        let event_id = EventId::new();

        let mut tx = db.begin();
        assert!(tx.put(ticket(event_id, "A12")).is_ok());
        assert!(tx.put(ticket(event_id, "A12")).is_err());
        assert!(tx.put(ticket(EventId::new(), "A12")).is_ok());
    }

    #[tokio::test]
    async fn transient_fail_point_disarms_after_count() {
        let db = MemoryDatabase::new();
        db.arm(FailPoint {
            operation: Operation::FindTickets,
            mode: FailureMode::Transient { times: 2 },
        });

        let tx = db.begin();
        for _ in 0..2 {
            let err = tx.enter(Operation::FindTickets).await;
            assert!(err.is_err_and(|e| e.is_transient()));
        }
        assert!(tx.enter(Operation::FindTickets).await.is_ok());
    }

    #[tokio::test]
    async fn fatal_fail_point_stays_armed() {
        let db = MemoryDatabase::new();
        db.arm(FailPoint {
            operation: Operation::Commit,
            mode: FailureMode::Fatal,
        });

        for _ in 0..3 {
            let err = db.begin().commit().await;
            assert!(err.is_err_and(|e| !e.is_transient()));
        }

        db.clear_fail_points();
        assert!(db.begin().commit().await.is_ok());
    }

    #[tokio::test]
    async fn stall_fail_point_never_completes() {
        let db = MemoryDatabase::new();
        db.arm(FailPoint {
            operation: Operation::ReserveTicket,
            mode: FailureMode::Stall,
        });

        let tx = db.begin();
        let stalled = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            tx.enter(Operation::ReserveTicket),
        )
        .await;
        assert!(stalled.is_err());
    }

    #[tokio::test]
    async fn remove_where_counts_removed_documents() {
        let db = MemoryDatabase::new();
        let event_id = seed_event(&db).await;
        let other = seed_event(&db).await;

        let mut tx = db.begin();
        for seat in ["A1", "A2", "A3"] {
            assert!(tx.put(ticket(event_id, seat)).is_ok());
        }
        assert!(tx.put(ticket(other, "A1")).is_ok());

        let removed = tx.remove_where::<Ticket>(|t| t.event_id == event_id);
        assert_eq!(removed, 3);
        assert_eq!(tx.scan::<Ticket>().count(), 1);
        assert!(tx.commit().await.is_ok());
    }

    #[tokio::test]
    async fn ticket_committed_after_its_event_was_deleted_conflicts() {
        let db = MemoryDatabase::new();
        let event_id = seed_event(&db).await;

        let mut creator = db.begin();
        assert!(creator.get::<Event>(event_id).is_some());
        assert!(creator.put(ticket(event_id, "A1")).is_ok());

        let mut cascade = db.begin();
        assert_eq!(cascade.remove_where::<Ticket>(|t| t.event_id == event_id), 0);
        assert!(cascade.remove::<Event>(event_id).is_some());
        assert!(cascade.commit().await.is_ok());

        let err = creator.commit().await;
        assert!(matches!(err, Err(DbError::WriteConflict)));
        assert_eq!(db.begin().scan::<Ticket>().count(), 0);
    }

    #[tokio::test]
    async fn event_deleted_after_a_new_ticket_committed_conflicts() {
        let db = MemoryDatabase::new();
        let event_id = seed_event(&db).await;

        let mut cascade = db.begin();
        assert_eq!(cascade.remove_where::<Ticket>(|t| t.event_id == event_id), 0);
        assert!(cascade.remove::<Event>(event_id).is_some());

        let mut creator = db.begin();
        assert!(creator.put(ticket(event_id, "A1")).is_ok());
        assert!(creator.commit().await.is_ok());

        let err = cascade.commit().await;
        assert!(matches!(err, Err(DbError::WriteConflict)));
        let after = db.begin();
        assert!(after.get::<Event>(event_id).is_some());
        assert_eq!(after.scan::<Ticket>().count(), 1);
    }

    #[tokio::test]
    async fn reservation_without_its_ticket_is_rejected() {
        let db = MemoryDatabase::new();
        let event_id = seed_event(&db).await;
        let reservation = NewReservation {
            ticket_id: TicketId::new(),
            event_id,
            customer_name: "Ada".to_owned(),
            reserved_at: Utc::now(),
        }
        .with_id(ReservationId::new());

        let mut tx = db.begin();
        assert!(tx.put(reservation).is_ok());
        let err = tx.commit().await;
        assert!(matches!(err, Err(DbError::WriteConflict)));
        assert_eq!(db.committed_version(), 1);
    }

    #[tokio::test]
    async fn journal_is_off_by_default() {
        let db = MemoryDatabase::new();
        for _ in 0..10 {
            assert!(db.begin().commit().await.is_ok());
        }
        assert!(db.journal().is_empty());

        let journaled = MemoryDatabase::with_journal();
        assert!(journaled.begin().commit().await.is_ok());
        assert_eq!(journaled.journal().len(), 2);
    }
}
