//! Embedded storage engine.
//!
//! Tables live in memory behind one `RwLock`; durability comes from an
//! append-only journal of committed row events, replayed on open. A
//! transaction owns the write half of the lock for its whole lifetime, so
//! transactions execute strictly one at a time: serializable isolation by
//! construction. Reads outside a transaction take the read lock per call and
//! therefore see only committed state.

mod error;
mod journal;
mod tables;

pub use error::StoreError;
pub use tables::{BookingQuery, Tables};

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedRwLockWriteGuard, OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::model::{Booking, Event, ParkingSpot, User};
use journal::Journal;

/// Standard isolation levels. Every level executes under the same exclusive
/// table lock, so all of them behave as serializable; the requested level is
/// kept for the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct DbInner {
    tables: Arc<RwLock<Tables>>,
    journal: Mutex<Journal>,
}

/// Handle to one open database. Cheap to clone; all clones share state.
#[derive(Debug, Clone)]
pub struct Database {
    inner: Arc<DbInner>,
}

impl Database {
    /// Open (or create) the database under `dir`: replay the journal into
    /// fresh tables, then compact it so the log stays proportional to live
    /// rows rather than write history.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("spotbook.journal");

        let events = Journal::replay(&path)?;
        let mut tables = Tables::new();
        for event in &events {
            tables.apply(event);
        }

        let mut journal = Journal::open(&path)?;
        journal.compact(&tables.snapshot_events())?;

        info!(
            replayed = events.len(),
            users = tables.user_count(),
            spots = tables.spot_count(),
            bookings = tables.booking_count(),
            "database opened"
        );

        Ok(Self {
            inner: Arc::new(DbInner {
                tables: Arc::new(RwLock::new(tables)),
                journal: Mutex::new(journal),
            }),
        })
    }

    /// Run a read against the committed state. Blocks while a transaction
    /// holds the tables.
    pub async fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.inner.tables.read().await;
        f(&tables)
    }

    pub async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        self.write_event(Event::UserInserted { user }).await
    }

    pub async fn insert_spot(&self, spot: ParkingSpot) -> Result<(), StoreError> {
        self.write_event(Event::SpotInserted { spot }).await
    }

    /// Single-statement write outside any transaction: journal first, then
    /// apply, holding the writer lock across both.
    async fn write_event(&self, event: Event) -> Result<(), StoreError> {
        let mut tables = self.inner.tables.write().await;
        {
            let mut journal = self.inner.journal.lock().await;
            append_batch(&mut journal, std::slice::from_ref(&event))?;
        }
        metrics::counter!(crate::observability::JOURNAL_APPENDS_TOTAL).increment(1);
        tables.apply(&event);
        Ok(())
    }
}

/// Append a batch of events and fsync once.
fn append_batch(journal: &mut Journal, events: &[Event]) -> Result<(), StoreError> {
    let mut append_err: Option<std::io::Error> = None;
    for event in events {
        if let Err(e) = journal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (this batch is reported failed).
    let flush_err = journal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e.into());
    }
    if let Some(e) = flush_err {
        return Err(e.into());
    }
    Ok(())
}

// ── Connection pool ──────────────────────────────────────────────

/// Hands out connections up to a fixed limit; callers wait for a free slot.
pub struct Pool {
    db: Database,
    permits: Arc<Semaphore>,
}

impl Pool {
    pub fn new(db: Database, max_connections: usize) -> Self {
        Self {
            db,
            permits: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// Wait for a free slot and hand out a connection. Fails only once the
    /// pool has been closed.
    pub async fn acquire(&self) -> Result<Connection, StoreError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::PoolClosed)?;
        metrics::gauge!(crate::observability::POOL_CONNECTIONS_IN_USE).increment(1.0);
        Ok(Connection {
            db: self.db.clone(),
            tx: None,
            _permit: permit,
        })
    }

    /// Stop handing out connections. Outstanding connections stay valid.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

// ── Connections and transactions ─────────────────────────────────

#[derive(Debug)]
enum Undo {
    RemoveBooking(Ulid),
    RestoreBooking(Booking),
}

#[derive(Debug)]
struct ActiveTx {
    isolation: IsolationLevel,
    guard: OwnedRwLockWriteGuard<Tables>,
    undo: Vec<Undo>,
    pending: Vec<Event>,
}

fn undo_all(tx: &mut ActiveTx) {
    for undo in tx.undo.drain(..).rev() {
        match undo {
            Undo::RemoveBooking(id) => {
                tx.guard.remove_booking(&id);
            }
            Undo::RestoreBooking(b) => {
                tx.guard.put_booking(b);
            }
        }
    }
}

/// One pooled connection. At most one transaction at a time.
#[derive(Debug)]
pub struct Connection {
    db: Database,
    tx: Option<ActiveTx>,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    /// Begin a transaction, waiting for exclusive ownership of the tables.
    pub async fn begin(&mut self, isolation: IsolationLevel) -> Result<(), StoreError> {
        if self.tx.is_some() {
            return Err(StoreError::AlreadyInTransaction);
        }
        let guard = self.db.inner.tables.clone().write_owned().await;
        debug!(%isolation, "transaction started");
        self.tx = Some(ActiveTx {
            isolation,
            guard,
            undo: Vec::new(),
            pending: Vec::new(),
        });
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Durably journal the transaction's events, then publish them by
    /// dropping the table lock. A journal failure rolls the in-memory
    /// changes back so the tables never expose an uncommitted write.
    pub async fn commit(&mut self) -> Result<(), StoreError> {
        let mut tx = self.tx.take().ok_or(StoreError::NoActiveTransaction)?;
        if !tx.pending.is_empty() {
            let mut journal = self.db.inner.journal.lock().await;
            let result = append_batch(&mut journal, &tx.pending);
            drop(journal);
            if let Err(e) = result {
                undo_all(&mut tx);
                return Err(e);
            }
            metrics::counter!(crate::observability::JOURNAL_APPENDS_TOTAL)
                .increment(tx.pending.len() as u64);
        }
        debug!(isolation = %tx.isolation, events = tx.pending.len(), "transaction committed");
        Ok(())
    }

    /// Revert every change made in the transaction, newest first, then drop
    /// the table lock.
    pub fn rollback(&mut self) -> Result<(), StoreError> {
        let mut tx = self.tx.take().ok_or(StoreError::NoActiveTransaction)?;
        undo_all(&mut tx);
        debug!(isolation = %tx.isolation, "transaction rolled back");
        Ok(())
    }

    /// Transaction-scoped reads and writes.
    pub fn manager(&mut self) -> Result<TxManager<'_>, StoreError> {
        match self.tx.as_mut() {
            Some(tx) => Ok(TxManager { tx }),
            None => Err(StoreError::NoActiveTransaction),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Backstop only; the runner rolls back before releasing.
        if let Some(mut tx) = self.tx.take() {
            warn!("connection dropped with an open transaction; rolling back");
            undo_all(&mut tx);
        }
        metrics::gauge!(crate::observability::POOL_CONNECTIONS_IN_USE).decrement(1.0);
    }
}

/// Read/write surface of an open transaction. Reads see the transaction's
/// own uncommitted writes; every write records its inverse for rollback and
/// its journal event for commit.
pub struct TxManager<'a> {
    tx: &'a mut ActiveTx,
}

impl TxManager<'_> {
    pub fn tables(&self) -> &Tables {
        &self.tx.guard
    }

    pub fn insert_booking(&mut self, booking: Booking) {
        self.tx.undo.push(Undo::RemoveBooking(booking.id));
        self.tx.guard.put_booking(booking.clone());
        self.tx.pending.push(Event::BookingInserted { booking });
    }

    /// Replace an existing row, returning the prior one. None (and no
    /// recorded change) when the id is unknown.
    pub fn update_booking(&mut self, booking: Booking) -> Option<Booking> {
        self.tx.guard.booking(&booking.id)?;
        let prior = self.tx.guard.put_booking(booking.clone())?;
        self.tx.undo.push(Undo::RestoreBooking(prior.clone()));
        self.tx.pending.push(Event::BookingUpdated { booking });
        Some(prior)
    }

    /// Physically delete a row, returning it. None when the id is unknown.
    pub fn delete_booking(&mut self, id: Ulid) -> Option<Booking> {
        let prior = self.tx.guard.remove_booking(&id)?;
        self.tx.undo.push(Undo::RestoreBooking(prior.clone()));
        self.tx.pending.push(Event::BookingDeleted { id });
        Some(prior)
    }
}
