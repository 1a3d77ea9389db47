use std::net::SocketAddr;

// ── Booking operations (request-driven) ─────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "spotbook_bookings_created_total";

/// Counter: bookings re-windowed or moved.
pub const BOOKINGS_UPDATED_TOTAL: &str = "spotbook_bookings_updated_total";

/// Counter: bookings physically deleted.
pub const BOOKINGS_REMOVED_TOTAL: &str = "spotbook_bookings_removed_total";

/// Counter: create/update attempts rejected for overlapping an existing window.
pub const BOOKING_CONFLICTS_TOTAL: &str = "spotbook_booking_conflicts_total";

/// Gauge: bookings currently stored, sampled by the heartbeat.
pub const BOOKINGS_LIVE: &str = "spotbook_bookings_live";

// ── Store internals (resource utilization) ──────────────────────

/// Counter: transactions started.
pub const TRANSACTIONS_STARTED_TOTAL: &str = "spotbook_transactions_started_total";

/// Counter: transactions committed.
pub const TRANSACTIONS_COMMITTED_TOTAL: &str = "spotbook_transactions_committed_total";

/// Counter: transactions rolled back, explicitly or by cleanup.
pub const TRANSACTIONS_ROLLED_BACK_TOTAL: &str = "spotbook_transactions_rolled_back_total";

/// Gauge: pool connections currently handed out.
pub const POOL_CONNECTIONS_IN_USE: &str = "spotbook_pool_connections_in_use";

/// Counter: events appended to the journal.
pub const JOURNAL_APPENDS_TOTAL: &str = "spotbook_journal_appends_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
