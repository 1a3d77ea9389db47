use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the only time type.
pub type Ms = i64;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// Fixed per user; this core never mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Standard,
    Admin,
}

/// The already-authenticated identity an operation runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Ulid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Ulid, role: Role) -> Self {
        Self { id, role }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Ulid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: Ms,
}

impl User {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}

/// A bookable parking spot. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub id: Ulid,
    pub place_number: u32,
    pub created_at: Ms,
}

/// One reservation of one spot by one user.
///
/// Invariants: `span.end > span.start`, and no two bookings on the same spot
/// overlap. Both are enforced at write time by the service, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    /// Owning user. Never re-pointed after creation.
    pub created_by: Ulid,
    /// Reserved spot. `update` may re-point this.
    pub spot_id: Ulid,
    pub span: Span,
    pub created_at: Ms,
    /// None until the first update.
    pub updated_at: Option<Ms>,
}

/// The journal record format: one committed row change per event, flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    UserInserted { user: User },
    SpotInserted { spot: ParkingSpot },
    BookingInserted { booking: Booking },
    BookingUpdated { booking: Booking },
    BookingDeleted { id: Ulid },
}

// ── Query result types ───────────────────────────────────────────

/// A booking with its owner and spot joined in, fully materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDetail {
    pub booking: Booking,
    pub owner: User,
    pub spot: ParkingSpot,
}
