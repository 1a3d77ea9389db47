//! Environment-driven configuration.

/// Runtime settings, all read from `SPOTBOOK_*` environment variables.
/// Anything unset or unparsable falls back to its default.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    pub max_connections: usize,
    pub parking_spots: usize,
    pub metrics_port: Option<u16>,
    pub heartbeat_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir =
            std::env::var("SPOTBOOK_DATA_DIR").unwrap_or_else(|_| "./spotbook-data".into());
        let max_connections: usize = std::env::var("SPOTBOOK_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(32);
        let parking_spots: usize = std::env::var("SPOTBOOK_PARKING_SPOTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        let metrics_port: Option<u16> = std::env::var("SPOTBOOK_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok());
        let heartbeat_secs: u64 = std::env::var("SPOTBOOK_HEARTBEAT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Self { data_dir, max_connections, parking_spots, metrics_port, heartbeat_secs }
    }
}
