#[derive(Debug)]
pub enum StoreError {
    /// Pool has been closed; no more connections will be handed out.
    PoolClosed,
    /// `begin` on a connection that already has a transaction open.
    AlreadyInTransaction,
    /// Commit/rollback/manager access without an open transaction.
    NoActiveTransaction,
    /// Operation on a runner whose connection has been released.
    ConnectionReleased,
    Journal(std::io::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::PoolClosed => write!(f, "connection pool is closed"),
            StoreError::AlreadyInTransaction => {
                write!(f, "transaction already active on this connection")
            }
            StoreError::NoActiveTransaction => write!(f, "no active transaction"),
            StoreError::ConnectionReleased => write!(f, "connection already released"),
            StoreError::Journal(e) => write!(f, "journal error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Journal(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Journal(e)
    }
}
