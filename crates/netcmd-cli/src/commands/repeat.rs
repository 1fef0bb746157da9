use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use netcmd_core::dispatch::RepeatSchedule;

use super::Session;

pub async fn run(
    session: &Session,
    payload: Option<&str>,
    name: Option<&str>,
    interval_ms: Option<u64>,
    count: Option<u32>,
) -> Result<()> {
    let command = session.resolve(payload, name)?;
    let interval =
        Duration::from_millis(interval_ms.unwrap_or(session.config.schedule.interval_ms));

    let mut schedule = RepeatSchedule::new(interval);
    if let Some(count) = count {
        schedule = schedule.with_limit(count);
    }

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let handle = session.spawn_controller().await?;
    println!(
        "Repeating \"{}\" to {} every {} ms. Press Ctrl+C to stop.",
        command.name,
        session.destination,
        interval.as_millis()
    );

    let report = schedule
        .run(&handle, &session.destination, &command, shutdown_rx)
        .await;
    handle.shutdown().await?;

    let report = report?;
    println!("\nStopped after {} sends ({} failed).", report.attempted(), report.failed);
    Ok(())
}
