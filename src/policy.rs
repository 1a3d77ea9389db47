use crate::error::ServiceError;
use crate::model::{Actor, Booking, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
}

/// Role table: Standard actors reach only their own bookings, admins reach
/// everything. Read and write paths both dispatch through here.
pub fn can_access(actor: &Actor, booking: &Booking, action: Action) -> bool {
    match (actor.role, action) {
        (Role::Admin, Action::Read | Action::Write) => true,
        (Role::Standard, Action::Read | Action::Write) => booking.created_by == actor.id,
    }
}

/// List scope under the same table: None means every booking is visible,
/// Some(id) restricts to rows owned by that user.
pub fn list_scope(actor: &Actor) -> Option<ulid::Ulid> {
    match actor.role {
        Role::Admin => None,
        Role::Standard => Some(actor.id),
    }
}

/// Fails with `Forbidden` when the table denies access.
pub fn ensure(actor: &Actor, booking: &Booking, action: Action) -> Result<(), ServiceError> {
    if can_access(actor, booking, action) {
        return Ok(());
    }
    Err(ServiceError::Forbidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;
    use ulid::Ulid;

    fn booking_owned_by(owner: Ulid) -> Booking {
        Booking {
            id: Ulid::new(),
            created_by: owner,
            spot_id: Ulid::new(),
            span: Span::new(0, 1),
            created_at: 0,
            updated_at: None,
        }
    }

    #[test]
    fn standard_reaches_own_booking() {
        let actor = Actor::new(Ulid::new(), Role::Standard);
        let b = booking_owned_by(actor.id);
        assert!(can_access(&actor, &b, Action::Read));
        assert!(can_access(&actor, &b, Action::Write));
    }

    #[test]
    fn standard_denied_on_others_booking() {
        let actor = Actor::new(Ulid::new(), Role::Standard);
        let b = booking_owned_by(Ulid::new());
        assert!(!can_access(&actor, &b, Action::Read));
        assert!(!can_access(&actor, &b, Action::Write));
    }

    #[test]
    fn admin_reaches_everything() {
        let admin = Actor::new(Ulid::new(), Role::Admin);
        let own = booking_owned_by(admin.id);
        let other = booking_owned_by(Ulid::new());
        for b in [&own, &other] {
            assert!(can_access(&admin, b, Action::Read));
            assert!(can_access(&admin, b, Action::Write));
        }
    }

    #[test]
    fn ensure_maps_to_forbidden() {
        let actor = Actor::new(Ulid::new(), Role::Standard);
        let b = booking_owned_by(Ulid::new());
        let err = ensure(&actor, &b, Action::Write).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));
    }

    #[test]
    fn list_scope_follows_role() {
        let standard = Actor::new(Ulid::new(), Role::Standard);
        let admin = Actor::new(Ulid::new(), Role::Admin);
        assert_eq!(list_scope(&standard), Some(standard.id));
        assert_eq!(list_scope(&admin), None);
    }
}
