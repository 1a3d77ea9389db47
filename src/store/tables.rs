use std::collections::BTreeMap;

use ulid::Ulid;

use crate::model::*;

/// All persisted rows. One instance per database, guarded by the writer lock
/// in `store::Database`; nothing in here locks.
#[derive(Debug, Default)]
pub struct Tables {
    users: BTreeMap<Ulid, User>,
    spots: BTreeMap<Ulid, ParkingSpot>,
    bookings: BTreeMap<Ulid, Booking>,
    /// place_number → spot id, kept in sync with `spots`.
    places: BTreeMap<u32, Ulid>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Row primitives ───────────────────────────────────────

    pub fn user(&self, id: &Ulid) -> Option<&User> {
        self.users.get(id)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn spot(&self, id: &Ulid) -> Option<&ParkingSpot> {
        self.spots.get(id)
    }

    pub fn spot_by_place(&self, place_number: u32) -> Option<&ParkingSpot> {
        self.places.get(&place_number).and_then(|id| self.spots.get(id))
    }

    pub fn spot_count(&self) -> usize {
        self.spots.len()
    }

    pub fn spots(&self) -> impl Iterator<Item = &ParkingSpot> {
        self.spots.values()
    }

    pub fn insert_spot(&mut self, spot: ParkingSpot) {
        self.places.insert(spot.place_number, spot.id);
        self.spots.insert(spot.id, spot);
    }

    pub fn booking(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.get(id)
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    /// Insert-or-replace, returning the prior row if any.
    pub fn put_booking(&mut self, booking: Booking) -> Option<Booking> {
        self.bookings.insert(booking.id, booking)
    }

    pub fn remove_booking(&mut self, id: &Ulid) -> Option<Booking> {
        self.bookings.remove(id)
    }

    // ── Joined reads ─────────────────────────────────────────

    /// Booking with owner and spot materialized. None when the booking is
    /// absent; owner and spot rows always exist for a persisted booking
    /// (users and spots are never deleted).
    pub fn booking_detail(&self, id: &Ulid) -> Option<BookingDetail> {
        let booking = self.bookings.get(id)?;
        self.join_detail(booking)
    }

    fn join_detail(&self, booking: &Booking) -> Option<BookingDetail> {
        let owner = self.users.get(&booking.created_by)?;
        let spot = self.spots.get(&booking.spot_id)?;
        Some(BookingDetail {
            booking: booking.clone(),
            owner: owner.clone(),
            spot: spot.clone(),
        })
    }

    // ── Booking queries ──────────────────────────────────────

    pub fn query_bookings(&self) -> BookingQuery<'_> {
        BookingQuery {
            tables: self,
            owned_by: None,
            on_spot: None,
            end_desc: false,
            skip: 0,
            take: None,
        }
    }

    // ── Event application (journal replay) ───────────────────

    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::UserInserted { user } => self.insert_user(user.clone()),
            Event::SpotInserted { spot } => self.insert_spot(spot.clone()),
            Event::BookingInserted { booking } | Event::BookingUpdated { booking } => {
                self.put_booking(booking.clone());
            }
            Event::BookingDeleted { id } => {
                self.remove_booking(id);
            }
        }
    }

    /// Minimal event sequence that rebuilds the current contents. Insertion
    /// order does not matter on replay; rows are keyed by id.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(
            self.users.len() + self.spots.len() + self.bookings.len(),
        );
        for user in self.users.values() {
            events.push(Event::UserInserted { user: user.clone() });
        }
        for spot in self.spots.values() {
            events.push(Event::SpotInserted { spot: spot.clone() });
        }
        for booking in self.bookings.values() {
            events.push(Event::BookingInserted { booking: booking.clone() });
        }
        events
    }
}

/// Conditional booking read, repository style: chain filters, then fetch or
/// count. `count` honors the filters but ignores paging, so a paged fetch and
/// its total come from the same query.
pub struct BookingQuery<'a> {
    tables: &'a Tables,
    owned_by: Option<Ulid>,
    on_spot: Option<Ulid>,
    end_desc: bool,
    skip: usize,
    take: Option<usize>,
}

impl<'a> BookingQuery<'a> {
    pub fn owned_by(mut self, user_id: Ulid) -> Self {
        self.owned_by = Some(user_id);
        self
    }

    pub fn on_spot(mut self, spot_id: Ulid) -> Self {
        self.on_spot = Some(spot_id);
        self
    }

    /// Order results by window end, latest first. Default order is insertion
    /// order (ids are ULIDs, so monotone with creation time).
    pub fn order_by_end_desc(mut self) -> Self {
        self.end_desc = true;
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    pub fn take(mut self, n: usize) -> Self {
        self.take = Some(n);
        self
    }

    fn matches(&self, booking: &Booking) -> bool {
        if let Some(owner) = self.owned_by
            && booking.created_by != owner
        {
            return false;
        }
        if let Some(spot) = self.on_spot
            && booking.spot_id != spot
        {
            return false;
        }
        true
    }

    /// Rows matching the filters, ignoring skip/take.
    pub fn count(&self) -> usize {
        self.tables
            .bookings
            .values()
            .filter(|b| self.matches(b))
            .count()
    }

    pub fn fetch(self) -> Vec<Booking> {
        let mut rows: Vec<Booking> = self
            .tables
            .bookings
            .values()
            .filter(|b| self.matches(b))
            .cloned()
            .collect();
        if self.end_desc {
            rows.sort_by(|a, b| b.span.end.cmp(&a.span.end));
        }
        let take = self.take.unwrap_or(usize::MAX);
        rows.into_iter().skip(self.skip).take(take).collect()
    }

    pub fn first(self) -> Option<Booking> {
        self.take(1).fetch().pop()
    }

    /// Like `fetch`, with owner and spot joined onto every row.
    pub fn fetch_detail(self) -> Vec<BookingDetail> {
        let tables = self.tables;
        self.fetch()
            .iter()
            .filter_map(|b| tables.join_detail(b))
            .collect()
    }
}
