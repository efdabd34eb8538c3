use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use feedhub_core::{scheduler::SchedulerService, storage::Database, AppConfig, DaemonServer};

/// Run the daemon in the foreground until interrupted
pub async fn run(db: Arc<Database>, config: Arc<AppConfig>) -> Result<()> {
    println!("Starting feedhub daemon...");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Ctrl+C flips the shutdown flag for both services
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_signal.send(true);
    });

    let scheduler = SchedulerService::new(db.clone(), config.clone());
    let scheduler_rx = shutdown_rx.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_rx).await;
    });

    let server = DaemonServer::new(db, config.clone());
    println!(
        "Daemon started (PID: {}). Socket: {}",
        std::process::id(),
        config.socket_path().display()
    );
    println!(
        "  Aggregate interval: {} seconds",
        config.sync.aggregate_interval_secs
    );

    server.run(shutdown_rx).await?;

    let _ = scheduler_handle.await;
    println!("Daemon stopped.");

    Ok(())
}
