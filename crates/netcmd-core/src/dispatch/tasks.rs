use std::time::Duration;

use crate::library::Command;
use crate::transport::{ControllerHandle, Endpoint, SendRequest};
use crate::{Error, Result};

/// Outcome of several sends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub sent: u32,
    pub failed: u32,
}

impl BatchReport {
    pub fn attempted(&self) -> u32 {
        self.sent + self.failed
    }

    pub(crate) fn record(&mut self, result: &Result<()>) {
        if result.is_ok() {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Send a single library command to `destination`
pub async fn send_command(
    handle: &ControllerHandle,
    destination: &Endpoint,
    command: &Command,
) -> Result<()> {
    tracing::info!("Sending command \"{}\" to {}", command.name, destination);
    handle
        .send(SendRequest::new(destination.clone(), command.payload.clone()))
        .await
}

/// Send every command in order, pausing `delay` between them.
///
/// A failed send does not stop the batch; a controller that has shut down
/// does.
pub async fn send_batch<'a>(
    handle: &ControllerHandle,
    destination: &Endpoint,
    commands: impl IntoIterator<Item = &'a Command>,
    delay: Duration,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();

    for (i, command) in commands.into_iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = send_command(handle, destination, command).await;
        if let Err(Error::ControllerClosed) = result {
            return Err(Error::ControllerClosed);
        }
        if let Err(ref e) = result {
            tracing::warn!("Command \"{}\" failed: {}", command.name, e);
        }
        report.record(&result);
    }

    tracing::info!(
        "Batch finished: {} sent, {} failed",
        report.sent,
        report.failed
    );
    Ok(report)
}
