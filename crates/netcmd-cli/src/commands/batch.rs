use std::time::Duration;

use anyhow::Result;

use netcmd_core::dispatch::send_batch;

use super::Session;

pub async fn run(session: &Session, delay_ms: Option<u64>) -> Result<()> {
    if session.library.is_empty() {
        println!("No commands in the library.");
        println!(
            "\nAdd [[commands]] entries to {}",
            netcmd_core::AppConfig::config_path().display()
        );
        return Ok(());
    }

    let delay =
        Duration::from_millis(delay_ms.unwrap_or(session.config.schedule.batch_delay_ms));
    let handle = session.spawn_controller().await?;

    let report = send_batch(&handle, &session.destination, &session.library, delay).await;
    handle.shutdown().await?;

    let report = report?;
    println!("\nBatch complete:");
    println!("  Sent: {}", report.sent);
    println!("  Failed: {}", report.failed);

    Ok(())
}
