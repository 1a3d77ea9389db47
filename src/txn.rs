//! Transaction lifecycle around one pooled connection.
//!
//! The runner's guards make misuse inert instead of fatal: starting twice
//! keeps the first transaction, finalizing after release does nothing, and
//! releasing twice does nothing. Release is terminal and never errors; a
//! transaction still open at release time is rolled back so the connection
//! goes back to the pool clean.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::store::{Connection, IsolationLevel, Pool, StoreError, TxManager};

/// Isolation level for every booking-mutating transaction. The store
/// executes all levels serially, so this is the guarantee in force even if a
/// weaker level were requested.
pub const DEFAULT_ISOLATION: IsolationLevel = IsolationLevel::Serializable;

/// States: idle → active → (committed | rolled back) → released.
#[derive(Debug)]
pub struct TransactionRunner {
    conn: Option<Connection>,
    isolation: IsolationLevel,
}

impl TransactionRunner {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Some(conn),
            isolation: DEFAULT_ISOLATION,
        }
    }

    /// Begin the transaction. A second call while one is active is a no-op;
    /// a call after release fails.
    pub async fn start(&mut self) -> Result<(), StoreError> {
        let conn = self.conn.as_mut().ok_or(StoreError::ConnectionReleased)?;
        if conn.in_transaction() {
            return Ok(());
        }
        conn.begin(self.isolation).await?;
        metrics::counter!(crate::observability::TRANSACTIONS_STARTED_TOTAL).increment(1);
        Ok(())
    }

    /// Commit the active transaction. No-op after release or when nothing is
    /// active.
    pub async fn commit(&mut self) -> Result<(), StoreError> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(());
        };
        if !conn.in_transaction() {
            return Ok(());
        }
        conn.commit().await?;
        metrics::counter!(crate::observability::TRANSACTIONS_COMMITTED_TOTAL).increment(1);
        Ok(())
    }

    /// Roll the active transaction back. No-op after release or when nothing
    /// is active.
    pub fn rollback(&mut self) -> Result<(), StoreError> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(());
        };
        if !conn.in_transaction() {
            return Ok(());
        }
        conn.rollback()?;
        metrics::counter!(crate::observability::TRANSACTIONS_ROLLED_BACK_TOTAL).increment(1);
        Ok(())
    }

    /// Terminal: roll back anything still open and return the connection to
    /// the pool. Calling again is a no-op.
    pub fn release(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if conn.in_transaction() {
            warn!("releasing a runner with an open transaction; rolling back");
            if let Err(e) = conn.rollback() {
                warn!(error = %e, "rollback during release failed");
            }
            metrics::counter!(crate::observability::TRANSACTIONS_ROLLED_BACK_TOTAL).increment(1);
        }
        debug!("runner released");
    }

    /// Data access scoped to the active transaction.
    pub fn manager(&mut self) -> Result<TxManager<'_>, StoreError> {
        let conn = self.conn.as_mut().ok_or(StoreError::ConnectionReleased)?;
        conn.manager()
    }

    pub fn is_released(&self) -> bool {
        self.conn.is_none()
    }

    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::in_transaction)
    }
}

/// Produces runners bound to fresh pooled connections. No retry or backoff;
/// acquisition failure is fatal to the operation at hand.
pub struct TransactionFactory {
    pool: Arc<Pool>,
}

impl TransactionFactory {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool }
    }

    pub async fn create_transaction(&self) -> Result<TransactionRunner, StoreError> {
        let conn = self.pool.acquire().await?;
        Ok(TransactionRunner::new(conn))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ulid::Ulid;

    use super::*;
    use crate::model::{Booking, ParkingSpot, Role, Span, User};
    use crate::store::Database;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("spotbook_test_txn").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn seeded_factory(name: &str) -> (Database, TransactionFactory, Ulid, Ulid) {
        let db = Database::open(&test_dir(name)).unwrap();
        let user = User {
            id: Ulid::new(),
            first_name: "Test".into(),
            last_name: "User".into(),
            email: "test.user0@example.com".into(),
            role: Role::Standard,
            created_at: 0,
        };
        let spot = ParkingSpot {
            id: Ulid::new(),
            place_number: 1,
            created_at: 0,
        };
        db.insert_user(user.clone()).await.unwrap();
        db.insert_spot(spot.clone()).await.unwrap();
        let factory = TransactionFactory::new(Arc::new(Pool::new(db.clone(), 4)));
        (db, factory, user.id, spot.id)
    }

    fn booking(owner: Ulid, spot_id: Ulid, start: i64, end: i64) -> Booking {
        Booking {
            id: Ulid::new(),
            created_by: owner,
            spot_id,
            span: Span::new(start, end),
            created_at: 0,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let (db, factory, owner, spot) = seeded_factory("start_idempotent").await;
        let mut runner = factory.create_transaction().await.unwrap();

        runner.start().await.unwrap();
        runner.start().await.unwrap(); // second start keeps the first tx
        assert!(runner.in_transaction());

        runner.manager().unwrap().insert_booking(booking(owner, spot, 0, 100));
        runner.commit().await.unwrap();
        runner.release();

        assert_eq!(db.read(|t| t.booking_count()).await, 1);
    }

    #[tokio::test]
    async fn release_is_idempotent_and_terminal() {
        let (_db, factory, _, _) = seeded_factory("release_idempotent").await;
        let mut runner = factory.create_transaction().await.unwrap();

        runner.start().await.unwrap();
        runner.release();
        runner.release(); // no-op, must not panic or error
        assert!(runner.is_released());

        // Finalization after release is inert.
        runner.commit().await.unwrap();
        runner.rollback().unwrap();

        // But starting over on a released runner is an error.
        assert!(matches!(
            runner.start().await.unwrap_err(),
            StoreError::ConnectionReleased
        ));
        assert!(matches!(
            runner.manager().map(|_| ()).unwrap_err(),
            StoreError::ConnectionReleased
        ));
    }

    #[tokio::test]
    async fn release_rolls_back_open_transaction() {
        let (db, factory, owner, spot) = seeded_factory("release_rolls_back").await;
        let mut runner = factory.create_transaction().await.unwrap();

        runner.start().await.unwrap();
        runner.manager().unwrap().insert_booking(booking(owner, spot, 0, 100));
        runner.release(); // no commit

        assert_eq!(db.read(|t| t.booking_count()).await, 0);
    }

    #[tokio::test]
    async fn finalize_without_start_is_inert() {
        let (_db, factory, _, _) = seeded_factory("finalize_without_start").await;
        let mut runner = factory.create_transaction().await.unwrap();
        runner.commit().await.unwrap();
        runner.rollback().unwrap();
        assert!(!runner.in_transaction());
        runner.release();
    }

    #[tokio::test]
    async fn factory_propagates_closed_pool() {
        let db = Database::open(&test_dir("factory_closed_pool")).unwrap();
        let pool = Arc::new(Pool::new(db, 1));
        let factory = TransactionFactory::new(pool.clone());
        pool.close();
        assert!(matches!(
            factory.create_transaction().await.unwrap_err(),
            StoreError::PoolClosed
        ));
    }

    #[tokio::test]
    async fn released_runner_frees_its_pool_slot() {
        let db = Database::open(&test_dir("release_frees_slot")).unwrap();
        let pool = Arc::new(Pool::new(db, 1));
        let factory = TransactionFactory::new(pool.clone());

        let mut runner = factory.create_transaction().await.unwrap();
        assert_eq!(pool.available(), 0);
        runner.release();
        assert_eq!(pool.available(), 1);
    }
}
