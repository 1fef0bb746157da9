use anyhow::Result;

use super::Session;

pub async fn run(session: &Session) -> Result<()> {
    let handle = session.spawn_controller().await?;

    // Bind failures are already on the event log; just exit non-zero
    if let Err(e) = handle.start(session.local_port).await {
        handle.shutdown().await?;
        return Err(e.into());
    }

    println!("Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    handle.stop().await.ok();
    // Waits for the close to complete
    handle.shutdown().await?;
    Ok(())
}
