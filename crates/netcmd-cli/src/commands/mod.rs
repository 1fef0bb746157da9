use std::sync::Arc;

use anyhow::{bail, Result};

use netcmd_core::{AppConfig, Command, CommandLibrary, Controller, ControllerHandle, Endpoint};

use crate::observer::ConsoleObserver;

pub mod batch;
pub mod console;
pub mod list;
pub mod listen;
pub mod repeat;
pub mod send;

/// Settings shared by every subcommand, with CLI overrides applied
pub struct Session {
    pub config: AppConfig,
    pub destination: Endpoint,
    pub local_port: u16,
    pub library: CommandLibrary,
}

impl Session {
    pub fn new(
        config: AppConfig,
        ip: Option<String>,
        port: Option<u16>,
        local_port: Option<u16>,
    ) -> Self {
        let destination = Endpoint::new(
            ip.unwrap_or_else(|| config.network.dest_ip.clone()),
            port.unwrap_or(config.network.dest_port),
        );
        let local_port = local_port.unwrap_or(config.network.local_port);
        let library = CommandLibrary::from_commands(config.commands.iter().cloned());

        Self {
            config,
            destination,
            local_port,
            library,
        }
    }

    /// Start a controller that prints its events to stdout
    pub async fn spawn_controller(&self) -> Result<ControllerHandle> {
        let handle = Controller::spawn(&self.config.network, Arc::new(ConsoleObserver)).await?;
        Ok(handle)
    }

    /// Pick the command to send: a library entry by name or inline hex
    pub fn resolve(&self, payload: Option<&str>, name: Option<&str>) -> Result<Command> {
        resolve(&self.library, payload, name)
    }
}

fn resolve(library: &CommandLibrary, payload: Option<&str>, name: Option<&str>) -> Result<Command> {
    match (payload, name) {
        (_, Some(name)) => Ok(library.require(name)?.clone()),
        (Some(payload), None) => Ok(Command::new("inline", payload)),
        (None, None) => bail!("either a hex payload or --command <NAME> is required"),
    }
}
