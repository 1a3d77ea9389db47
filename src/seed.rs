//! Startup seeding of users and parking spots.
//!
//! Mirrors a fresh deployment: a fixed roster of ten users (eight standard,
//! two admin) and a configurable number of parking spots. Both steps skip
//! themselves once the target count is reached, so repeated boots do not
//! multiply rows.

use tracing::info;
use ulid::Ulid;

use crate::model::{now_ms, ParkingSpot, Role, User};
use crate::store::{Database, StoreError};

const FIRST_NAMES: [&str; 8] =
    ["John", "Jane", "Alice", "Bob", "Charlie", "Diana", "Edward", "Fiona"];
const LAST_NAMES: [&str; 8] =
    ["Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis"];

/// Eight standard users followed by two admins.
const TARGET_USERS: usize = 10;

pub async fn seed_users(db: &Database) -> Result<Vec<User>, StoreError> {
    let current = db.read(|t| t.user_count()).await;
    if current >= TARGET_USERS {
        info!("target user count already reached, skipping user seed");
        return Ok(Vec::new());
    }

    let mut users = Vec::with_capacity(TARGET_USERS);
    for i in 0..TARGET_USERS {
        let role = if i < 8 { Role::Standard } else { Role::Admin };
        let first = FIRST_NAMES[i % FIRST_NAMES.len()];
        let last = LAST_NAMES[i % LAST_NAMES.len()];
        let user = User {
            id: Ulid::new(),
            first_name: first.into(),
            last_name: last.into(),
            email: format!("{}.{}{i}@example.com", first.to_lowercase(), last.to_lowercase()),
            role,
            created_at: now_ms(),
        };
        info!("seeding {role:?} user {}", user.email);
        db.insert_user(user.clone()).await?;
        users.push(user);
    }
    Ok(users)
}

/// Create parking spots up to `target`, numbering places from 1.
pub async fn seed_spots(db: &Database, target: usize) -> Result<Vec<ParkingSpot>, StoreError> {
    let current = db.read(|t| t.spot_count()).await;
    if current >= target {
        info!("target parking spot count already reached, skipping spot seed");
        return Ok(Vec::new());
    }

    let mut spots = Vec::with_capacity(target - current);
    for i in current..target {
        let spot = ParkingSpot {
            id: Ulid::new(),
            place_number: i as u32 + 1,
            created_at: now_ms(),
        };
        db.insert_spot(spot.clone()).await?;
        info!("created parking spot {} at place {}", spot.id, spot.place_number);
        spots.push(spot);
    }
    Ok(spots)
}
