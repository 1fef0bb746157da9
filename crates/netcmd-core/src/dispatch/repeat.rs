use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::tasks::{send_command, BatchReport};
use crate::library::Command;
use crate::transport::{ControllerHandle, Endpoint};
use crate::{Error, Result};

/// Resend one command at a fixed interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatSchedule {
    pub interval: Duration,
    /// Stop after this many attempts; `None` runs until shutdown
    pub limit: Option<u32>,
}

impl RepeatSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Send on every tick until the limit is reached or `shutdown` flips to
    /// `true`. The first send happens one interval after the call.
    pub async fn run(
        &self,
        handle: &ControllerHandle,
        destination: &Endpoint,
        command: &Command,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        if self.interval.is_zero() {
            return Err(Error::Config("repeat interval must be non-zero".to_string()));
        }
        if self.limit == Some(0) {
            return Ok(report);
        }

        info!(
            "Repeating \"{}\" to {} every {}ms",
            command.name,
            destination,
            self.interval.as_millis()
        );

        let mut interval = tokio::time::interval(self.interval);
        // Skip the first tick (fires immediately)
        interval.tick().await;

        loop {
            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        debug!("Repeat schedule received shutdown signal");
                        break;
                    }
                }

                _ = interval.tick() => {
                    let result = send_command(handle, destination, command).await;
                    if let Err(Error::ControllerClosed) = result {
                        return Err(Error::ControllerClosed);
                    }
                    if let Err(ref e) = result {
                        warn!("Scheduled send {} failed: {}", report.attempted() + 1, e);
                    }
                    report.record(&result);

                    if self.limit.is_some_and(|limit| report.attempted() >= limit) {
                        break;
                    }
                }
            }
        }

        info!(
            "Repeat schedule stopped: {} sent, {} failed",
            report.sent, report.failed
        );
        Ok(report)
    }
}
