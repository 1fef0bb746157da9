use anyhow::Result;

use netcmd_core::dispatch::send_command;

use super::Session;

pub async fn run(session: &Session, payload: Option<&str>, name: Option<&str>) -> Result<()> {
    let command = session.resolve(payload, name)?;
    let handle = session.spawn_controller().await?;

    let result = send_command(&handle, &session.destination, &command).await;
    handle.shutdown().await?;

    result?;
    Ok(())
}
