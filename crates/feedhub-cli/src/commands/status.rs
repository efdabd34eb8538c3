use anyhow::Result;

use feedhub_core::{AppConfig, DaemonClient};

pub async fn run(config: &AppConfig) -> Result<()> {
    let client = DaemonClient::new(config.socket_path());

    match client.status().await {
        Ok(status) => {
            println!("Daemon is running.");
            println!("  Uptime: {} seconds", status.uptime_secs);
            println!(
                "  Background scheduler: {}",
                if status.scheduler_running {
                    "enabled"
                } else {
                    "disabled"
                }
            );
        }
        Err(_) => {
            println!("Daemon is not running.");
            println!("Start it with: feedhub serve");
        }
    }

    Ok(())
}
