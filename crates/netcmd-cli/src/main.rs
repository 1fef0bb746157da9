use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netcmd_core::AppConfig;

mod commands;
mod observer;

use commands::Session;

#[derive(Parser)]
#[command(name = "netcmd")]
#[command(author, version, about = "Send hex command payloads over UDP and watch the replies")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to ~/.config/netcmd/config.toml)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Destination address (overrides network.dest_ip)
    #[arg(long, global = true)]
    ip: Option<String>,

    /// Destination port (overrides network.dest_port)
    #[arg(short = 'p', long, global = true)]
    port: Option<u16>,

    /// Local listening port (overrides network.local_port)
    #[arg(short = 'l', long = "local-port", global = true)]
    local_port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console (default)
    Console,
    /// Send one payload
    Send {
        /// Hex payload, e.g. "A0 B1 C2"
        payload: Option<String>,
        /// Send a library command by name instead
        #[arg(short = 'n', long)]
        command: Option<String>,
    },
    /// Send every library command once, in order
    Batch {
        /// Pause between commands (overrides schedule.batch_delay_ms)
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Resend one payload on a timer until Ctrl+C
    Repeat {
        /// Hex payload
        payload: Option<String>,
        /// Repeat a library command by name instead
        #[arg(short = 'n', long)]
        command: Option<String>,
        /// Interval between sends (overrides schedule.interval_ms)
        #[arg(short = 'i', long)]
        interval_ms: Option<u64>,
        /// Stop after this many sends
        #[arg(long)]
        count: Option<u32>,
    },
    /// Listen for datagrams until Ctrl+C
    Listen,
    /// List library commands
    List {
        /// Print the library as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Initialize logging; stdout is reserved for the event log
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let session = Session::new(config, cli.ip, cli.port, cli.local_port);

    match cli.command {
        Some(Commands::Console) | None => commands::console::run(session).await,
        Some(Commands::Send { payload, command }) => {
            commands::send::run(&session, payload.as_deref(), command.as_deref()).await
        }
        Some(Commands::Batch { delay_ms }) => commands::batch::run(&session, delay_ms).await,
        Some(Commands::Repeat {
            payload,
            command,
            interval_ms,
            count,
        }) => {
            commands::repeat::run(
                &session,
                payload.as_deref(),
                command.as_deref(),
                interval_ms,
                count,
            )
            .await
        }
        Some(Commands::Listen) => commands::listen::run(&session).await,
        Some(Commands::List { json }) => commands::list::run(&session, json),
    }
}
