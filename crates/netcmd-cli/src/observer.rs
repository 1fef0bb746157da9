use chrono::Local;

use netcmd_core::{LogEvent, LogKind, Observer, ServerStatus};

/// Prints controller events to stdout as `[HH:MM:SS] KIND  message`
#[derive(Debug, Default)]
pub struct ConsoleObserver;

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

fn label(kind: LogKind) -> &'static str {
    match kind {
        LogKind::Info => "INFO ",
        LogKind::Sent => "SENT ",
        LogKind::Recv => "RECV ",
        LogKind::Error => "ERROR",
    }
}

impl Observer for ConsoleObserver {
    fn on_log(&self, event: LogEvent) {
        println!("[{}] {} {}", timestamp(), label(event.kind), event.message);
    }

    fn on_status(&self, status: ServerStatus) {
        match status.port {
            Some(port) if status.running => {
                println!("[{}] ----- listener running (port {})", timestamp(), port)
            }
            _ => println!("[{}] ----- listener stopped", timestamp()),
        }
    }
}
