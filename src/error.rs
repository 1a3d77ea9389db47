use crate::store::StoreError;

#[derive(Debug)]
pub enum ServiceError {
    /// Requested window has `end <= start`.
    InvalidRange,
    /// Referenced booking or spot does not exist.
    NotFound(&'static str),
    /// Requested window overlaps an existing booking on the spot.
    Conflict,
    /// Actor's role does not permit the operation on this booking.
    Forbidden,
    Store(StoreError),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::InvalidRange => {
                write!(f, "end date must be after start date")
            }
            ServiceError::NotFound(what) => write!(f, "{what} not found"),
            ServiceError::Conflict => {
                write!(f, "parking spot is already booked for the selected time range")
            }
            ServiceError::Forbidden => {
                write!(f, "you are not allowed to access this booking")
            }
            ServiceError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Store(e)
    }
}
