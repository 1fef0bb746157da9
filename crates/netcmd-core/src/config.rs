use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::library::Command;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Seed entries for the command library
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Destination address for outgoing commands
    #[serde(default = "default_dest_ip")]
    pub dest_ip: String,
    /// Destination port for outgoing commands
    #[serde(default = "default_dest_port")]
    pub dest_port: u16,
    /// Local port the listener binds to
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    /// Receive buffer size in bytes; longer datagrams are truncated
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            dest_ip: default_dest_ip(),
            dest_port: default_dest_port(),
            local_port: default_local_port(),
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Interval between repeated sends in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Pause between commands of a batch in milliseconds (0 = back to back)
    #[serde(default)]
    pub batch_delay_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            batch_delay_ms: 0,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_dest_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_dest_port() -> u16 {
    9000
}

fn default_local_port() -> u16 {
    9001
}

fn default_recv_buffer_size() -> usize {
    65535 // largest UDP payload
}

fn default_interval_ms() -> u64 {
    1000
}

impl AppConfig {
    /// Load configuration from the default path or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Get the configuration file path
    /// Always uses ~/.config/netcmd/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("netcmd")
            .join("config.toml")
    }
}
