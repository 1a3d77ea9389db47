//! Overlap rule for booking windows.
//!
//! Interval edges are treated asymmetrically: a start edge falling inside an
//! interval is judged on `[start, end)`, an end edge on `(start, end]`, and
//! both directions (new inside existing, existing inside new) are checked.
//! Back-to-back windows never conflict.

use crate::error::ServiceError;
use crate::model::{Ms, Span};

/// True when `[new_start, new_end)` conflicts with `[existing_start, existing_end)`.
pub fn overlaps(new_start: Ms, new_end: Ms, existing_start: Ms, existing_end: Ms) -> bool {
    (existing_start <= new_start && new_start < existing_end)
        || (existing_start < new_end && new_end <= existing_end)
        || (new_start <= existing_start && existing_start < new_end)
        || (new_start < existing_end && existing_end <= new_end)
}

/// Fails with `Conflict` when the requested window overlaps the existing one.
pub fn check(new: Span, existing: Span) -> Result<(), ServiceError> {
    if overlaps(new.start, new.end, existing.start, existing.end) {
        return Err(ServiceError::Conflict);
    }
    Ok(())
}
