//! Booking operations.
//!
//! Mutations run inside a serializable transaction obtained from the
//! factory: read the spot and any conflicting bookings, check overlap, write,
//! commit. Any failure after the transaction starts rolls back and the error
//! propagates unchanged; the runner is released on every path. Reads are
//! ambient and see only committed state.


use tracing::{error, info, warn};
use ulid::Ulid;

use crate::error::ServiceError;
use crate::model::{now_ms, Actor, Booking, BookingDetail, Ms, Span};
use crate::overlap;
use crate::policy::{self, Action};
use crate::store::Database;
use crate::txn::{TransactionFactory, TransactionRunner};

pub struct BookingService {
    db: Database,
    factory: TransactionFactory,
}

impl BookingService {
    pub fn new(db: Database, factory: TransactionFactory) -> Self {
        Self { db, factory }
    }

    /// Create a booking for `actor` on `spot_id` over `[start, end)`.
    ///
    /// The spot lookup, the conflict scan over the spot's existing bookings,
    /// and the insert all happen inside one serializable transaction, so two
    /// racing requests for the same spot resolve to one success and one
    /// `Conflict`.
    pub async fn create(
        &self,
        actor: &Actor,
        spot_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<Booking, ServiceError> {
        if end <= start {
            return Err(ServiceError::InvalidRange);
        }

        let mut runner = self.factory.create_transaction().await?;
        let result = self.create_in_tx(&mut runner, actor, spot_id, start, end).await;
        match &result {
            Ok(booking) => {
                metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
                info!(user = %actor.id, booking = %booking.id, spot = %spot_id, "booking created");
            }
            Err(e) => {
                note_failure(&mut runner, e, "create");
            }
        }
        runner.release();
        result
    }

    async fn create_in_tx(
        &self,
        runner: &mut TransactionRunner,
        actor: &Actor,
        spot_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<Booking, ServiceError> {
        runner.start().await?;

        let span = Span::new(start, end);
        let booking = {
            let mut m = runner.manager()?;
            if m.tables().spot(&spot_id).is_none() {
                return Err(ServiceError::NotFound("parking spot"));
            }
            for existing in m.tables().query_bookings().on_spot(spot_id).fetch() {
                overlap::check(span, existing.span)?;
            }

            let booking = Booking {
                id: Ulid::new(),
                created_by: actor.id,
                spot_id,
                span,
                created_at: now_ms(),
                updated_at: None,
            };
            m.insert_booking(booking.clone());
            booking
        };

        runner.commit().await?;
        Ok(booking)
    }

    /// Page of bookings with owner and spot joined in, plus the total count
    /// of rows visible to `actor` (the count ignores paging).
    pub async fn find_all(
        &self,
        actor: &Actor,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<BookingDetail>, usize), ServiceError> {
        let scope = policy::list_scope(actor);
        let page = self
            .db
            .read(|t| {
                let mut q = t.query_bookings();
                if let Some(owner) = scope {
                    q = q.owned_by(owner);
                }
                let total = q.count();
                let rows = q.skip(offset).take(limit).fetch_detail();
                (rows, total)
            })
            .await;
        Ok(page)
    }

    /// Booking by id, with owner and spot joined in. `NotFound` when absent,
    /// `Forbidden` when the role table denies the read.
    pub async fn find_one(&self, id: Ulid, actor: &Actor) -> Result<BookingDetail, ServiceError> {
        let detail = self
            .db
            .read(|t| t.booking_detail(&id))
            .await
            .ok_or(ServiceError::NotFound("booking"))?;
        policy::ensure(actor, &detail.booking, Action::Read)?;
        Ok(detail)
    }

    /// Re-window a booking, optionally moving it to another spot.
    ///
    /// The new window is first checked against the booking's own pre-update
    /// window, so an update overlapping the window it replaces fails
    /// `Conflict` even on the same spot. When the spot changes, the new
    /// window is additionally checked against the latest-ending booking on
    /// the target spot; earlier-ending bookings there are not consulted.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Ulid,
        new_spot: Option<Ulid>,
        start: Ms,
        end: Ms,
    ) -> Result<Booking, ServiceError> {
        let current = self.find_one(id, actor).await?.booking;

        if end <= start {
            return Err(ServiceError::InvalidRange);
        }
        let span = Span::new(start, end);
        overlap::check(span, current.span)?;

        let target_spot = new_spot.unwrap_or(current.spot_id);
        if target_spot != current.spot_id {
            let candidate = self
                .db
                .read(|t| {
                    if t.spot(&target_spot).is_none() {
                        return Err(ServiceError::NotFound("parking spot"));
                    }
                    Ok(t.query_bookings()
                        .on_spot(target_spot)
                        .order_by_end_desc()
                        .first())
                })
                .await?;
            if let Some(existing) = candidate {
                overlap::check(span, existing.span)?;
            }
        }

        let mut runner = self.factory.create_transaction().await?;
        let result = self
            .update_in_tx(&mut runner, &current, target_spot, span)
            .await;
        match &result {
            Ok(booking) => {
                metrics::counter!(crate::observability::BOOKINGS_UPDATED_TOTAL).increment(1);
                info!(user = %actor.id, booking = %booking.id, "booking updated");
            }
            Err(e) => {
                note_failure(&mut runner, e, "update");
            }
        }
        runner.release();
        result
    }

    async fn update_in_tx(
        &self,
        runner: &mut TransactionRunner,
        current: &Booking,
        spot_id: Ulid,
        span: Span,
    ) -> Result<Booking, ServiceError> {
        runner.start().await?;

        let mut updated = current.clone();
        updated.spot_id = spot_id;
        updated.span = span;
        updated.updated_at = Some(now_ms());
        {
            let mut m = runner.manager()?;
            // The row can vanish between the ambient read and this write.
            if m.update_booking(updated.clone()).is_none() {
                return Err(ServiceError::NotFound("booking"));
            }
        }

        runner.commit().await?;
        Ok(updated)
    }

    /// Physically delete a booking. Ownership is enforced twice: by
    /// `find_one`'s read gate and by an explicit write check here.
    pub async fn remove(&self, id: Ulid, actor: &Actor) -> Result<(), ServiceError> {
        let detail = self.find_one(id, actor).await?;
        policy::ensure(actor, &detail.booking, Action::Write)?;

        let mut runner = self.factory.create_transaction().await?;
        let result = self.remove_in_tx(&mut runner, id).await;
        match &result {
            Ok(()) => {
                metrics::counter!(crate::observability::BOOKINGS_REMOVED_TOTAL).increment(1);
                info!(user = %actor.id, booking = %id, "booking deleted");
            }
            Err(e) => {
                note_failure(&mut runner, e, "remove");
            }
        }
        runner.release();
        result
    }

    async fn remove_in_tx(
        &self,
        runner: &mut TransactionRunner,
        id: Ulid,
    ) -> Result<(), ServiceError> {
        runner.start().await?;
        {
            let mut m = runner.manager()?;
            if m.delete_booking(id).is_none() {
                return Err(ServiceError::NotFound("booking"));
            }
        }
        runner.commit().await?;
        Ok(())
    }
}

/// Roll back whatever the failed operation left open and log it. The caller
/// returns the original error untouched; a rollback failure is logged rather
/// than allowed to mask it.
fn note_failure(runner: &mut TransactionRunner, e: &ServiceError, op: &'static str) {
    if let Err(re) = runner.rollback() {
        warn!(error = %re, op, "rollback after failure also failed");
    }
    if matches!(e, ServiceError::Conflict) {
        metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
    }
    error!(error = %e, op, "booking operation failed");
}
