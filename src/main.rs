use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use spotbook::config::Config;
use spotbook::model::Role;
use spotbook::service::BookingService;
use spotbook::store::{Database, Pool};
use spotbook::txn::TransactionFactory;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    spotbook::observability::init(config.metrics_port);

    let db = Database::open(Path::new(&config.data_dir))?;
    spotbook::seed::seed_users(&db).await?;
    spotbook::seed::seed_spots(&db, config.parking_spots).await?;

    let pool = Arc::new(Pool::new(db.clone(), config.max_connections));
    let factory = TransactionFactory::new(pool.clone());
    let service = BookingService::new(db.clone(), factory);

    info!("spotbook store open");
    info!("  data_dir: {}", config.data_dir);
    info!("  max_connections: {}", config.max_connections);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let heartbeat = tokio::spawn(run_heartbeat(
        db.clone(),
        service,
        Duration::from_secs(config.heartbeat_secs),
    ));

    // Graceful shutdown: wait for SIGTERM/ctrl-c, then drain open transactions
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    shutdown.await;

    info!("shutdown signal received");
    heartbeat.abort();
    pool.close();

    // Wait for in-flight transactions to release their connections (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if pool.available() == config.max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = config.max_connections - pool.available();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    info!("spotbook stopped");
    Ok(())
}

/// Background task that periodically reads the store as an admin and
/// publishes the live booking count.
async fn run_heartbeat(db: Database, service: BookingService, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;

        let admin = db
            .read(|t| t.users().find(|u| u.role == Role::Admin).map(|u| u.actor()))
            .await;
        let Some(admin) = admin else {
            tracing::debug!("heartbeat skipped: no admin user");
            continue;
        };

        match service.find_all(&admin, 1, 0).await {
            Ok((_, total)) => {
                metrics::gauge!(spotbook::observability::BOOKINGS_LIVE).set(total as f64);
                info!("heartbeat: {total} bookings live");
            }
            Err(e) => tracing::warn!("heartbeat read failed: {e}"),
        }
    }
}
