//! Line-oriented interactive console
//!
//! Keeps one controller alive for the whole session so the listener and the
//! client socket persist between commands.

use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use netcmd_core::dispatch::{send_batch, send_command, BatchReport, RepeatSchedule};
use netcmd_core::{Command, ControllerHandle, Endpoint};

use super::Session;

const HELP: &str = "\
Commands:
  start [port]          start the listener (default: configured local port)
  stop                  stop the listener
  send <name|hex>       send a library command or raw hex
  batch                 send every library command once
  repeat <ms> <name|hex> resend on a timer until `halt`
  halt                  stop the running repeat
  add <name> <hex>      add or update a library command
  rm <name>             remove a library command
  list                  show the library
  dest <ip> <port>      change the destination
  status                show listener state and destination
  help                  this text
  quit                  exit";

/// One parsed console line
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Start(Option<u16>),
    Stop,
    Send(String),
    Batch,
    Repeat { interval_ms: u64, target: String },
    Halt,
    Add { name: String, payload: String },
    Remove(String),
    List,
    Dest(Endpoint),
    Status,
    Help,
    Quit,
    Empty,
}

fn parse_line(line: &str) -> std::result::Result<Input, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match word.to_ascii_lowercase().as_str() {
        "" => Input::Empty,
        "start" if rest.is_empty() => Input::Start(None),
        "start" => Input::Start(Some(parse_port(rest)?)),
        "stop" => Input::Stop,
        "send" if !rest.is_empty() => Input::Send(rest.to_string()),
        "batch" => Input::Batch,
        "repeat" => {
            let (ms, target) = rest
                .split_once(char::is_whitespace)
                .ok_or("usage: repeat <ms> <name|hex>")?;
            let interval_ms: u64 = ms.parse().map_err(|_| format!("invalid interval '{}'", ms))?;
            if interval_ms == 0 {
                return Err("interval must be greater than zero".to_string());
            }
            Input::Repeat {
                interval_ms,
                target: target.trim().to_string(),
            }
        }
        "halt" => Input::Halt,
        "add" => {
            let (name, payload) = rest
                .split_once(char::is_whitespace)
                .ok_or("usage: add <name> <hex>")?;
            Input::Add {
                name: name.to_string(),
                payload: payload.trim().to_string(),
            }
        }
        "rm" if !rest.is_empty() => Input::Remove(rest.to_string()),
        "list" => Input::List,
        "dest" => {
            let endpoint = match rest.split_once(char::is_whitespace) {
                Some((ip, port)) => {
                    let endpoint = Endpoint::new(ip, parse_port(port.trim())?);
                    endpoint.validate().map_err(|e| e.to_string())?;
                    endpoint
                }
                None => rest.parse()?,
            };
            Input::Dest(endpoint)
        }
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command '{}', try `help`", other)),
    };

    Ok(input)
}

fn parse_port(text: &str) -> std::result::Result<u16, String> {
    match text.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(format!("invalid port '{}': expected 1-65535", text)),
    }
}

struct RunningRepeat {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<netcmd_core::Result<BatchReport>>,
}

struct Console {
    session: Session,
    handle: ControllerHandle,
    repeat: Option<RunningRepeat>,
}

impl Console {
    /// Library entry by name, otherwise the text itself as hex
    fn target(&self, text: &str) -> Command {
        match self.session.library.get(text) {
            Some(command) => command.clone(),
            None => Command::new("inline", text),
        }
    }

    /// Returns `false` when the console should exit
    async fn execute(&mut self, input: Input) -> Result<bool> {
        match input {
            Input::Empty => {}
            Input::Start(port) => {
                // Errors are reported through the event log
                let _ = self.handle.start(port.unwrap_or(self.session.local_port)).await;
            }
            Input::Stop => {
                let _ = self.handle.stop().await;
            }
            Input::Send(text) => {
                let command = self.target(&text);
                let _ = send_command(&self.handle, &self.session.destination, &command).await;
            }
            Input::Batch => {
                if self.session.library.is_empty() {
                    println!("No commands in the library.");
                } else {
                    let delay = Duration::from_millis(self.session.config.schedule.batch_delay_ms);
                    let report = send_batch(
                        &self.handle,
                        &self.session.destination,
                        &self.session.library,
                        delay,
                    )
                    .await?;
                    println!("Batch: {} sent, {} failed", report.sent, report.failed);
                }
            }
            Input::Repeat {
                interval_ms,
                target,
            } => {
                self.halt().await;
                let command = self.target(&target);
                let destination = self.session.destination.clone();
                let handle = self.handle.clone();
                let (shutdown, shutdown_rx) = watch::channel(false);
                let schedule = RepeatSchedule::new(Duration::from_millis(interval_ms));

                let task = tokio::spawn(async move {
                    schedule
                        .run(&handle, &destination, &command, shutdown_rx)
                        .await
                });
                self.repeat = Some(RunningRepeat { shutdown, task });
                println!("Repeating every {} ms; `halt` to stop.", interval_ms);
            }
            Input::Halt => {
                if self.repeat.is_none() {
                    println!("No repeat is running.");
                }
                self.halt().await;
            }
            Input::Add { name, payload } => match self.session.library.upsert(&name, &payload) {
                Ok(true) => println!("Command \"{}\" updated.", name),
                Ok(false) => println!("Command \"{}\" added.", name),
                Err(e) => println!("{}", e),
            },
            Input::Remove(name) => match self.session.library.remove(&name) {
                Some(_) => println!("Command \"{}\" removed.", name),
                None => println!("No command named \"{}\".", name),
            },
            Input::List => {
                for command in &self.session.library {
                    println!("  {:<16} {}", command.name, command.payload);
                }
                if self.session.library.is_empty() {
                    println!("  (empty)");
                }
            }
            Input::Dest(endpoint) => {
                println!("Destination set to {}", endpoint);
                self.session.destination = endpoint;
            }
            Input::Status => {
                let state = self.handle.state().await?;
                println!("Listener: {}", state);
                println!("Destination: {}", self.session.destination);
                if self.repeat.is_some() {
                    println!("Repeat: running");
                }
            }
            Input::Help => println!("{}", HELP),
            Input::Quit => return Ok(false),
        }
        Ok(true)
    }

    async fn halt(&mut self) {
        if let Some(repeat) = self.repeat.take() {
            let _ = repeat.shutdown.send(true);
            match repeat.task.await {
                Ok(Ok(report)) => println!(
                    "Repeat stopped: {} sent, {} failed",
                    report.sent, report.failed
                ),
                Ok(Err(e)) => warn!("Repeat ended with error: {}", e),
                Err(e) => warn!("Repeat task failed: {}", e),
            }
        }
    }
}

pub async fn run(session: Session) -> Result<()> {
    let handle = session.spawn_controller().await?;
    println!(
        "netcmd console. Destination {}, local port {}. Type `help` for commands.",
        session.destination, session.local_port
    );

    let mut console = Console {
        session,
        handle,
        repeat: None,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break;
                };
                match parse_line(&line) {
                    Ok(input) => {
                        if !console.execute(input).await? {
                            break;
                        }
                    }
                    Err(message) => println!("{}", message),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    console.halt().await;
    console.handle.shutdown().await?;
    Ok(())
}
