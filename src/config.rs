//! Configuration system using Figment.
//!
//! This module provides strongly-typed configuration loading for the node.
//! Configuration is loaded from:
//! 1. a TOML file (base configuration, see `config/node.toml`)
//! 2. Environment variables (prefixed with `MOTION_NODE_`)
//!
//! # Example
//! ```no_run
//! use motion_node::config::NodeConfig;
//!
//! # fn main() -> Result<(), figment::Error> {
//! let config = NodeConfig::load()?;
//! println!("Application: {}", config.application.name);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Wireless network credentials
    pub wifi: WifiConfig,
    /// Cloud endpoint settings
    pub cloud: CloudConfig,
    /// Modem serial link settings
    pub modem: ModemConfig,
    /// Durable event storage settings
    pub storage: StorageConfig,
    /// Motion input settings
    pub motion: MotionConfig,
    /// Upload scheduling settings
    pub uplink: UplinkConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Wireless network credentials handed to the modem during boot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiConfig {
    /// Network SSID
    pub ssid: String,
    /// Network password
    pub password: String,
}

/// Cloud endpoint the readings are uploaded to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Write API key embedded in the upload request
    pub api_key: String,
    /// Endpoint host
    #[serde(default = "default_host")]
    pub host: String,
    /// Endpoint TCP port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Serial link to the radio modem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModemConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0")
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// Interval between liveness probes while the modem boots, in ms
    #[serde(default = "default_probe_interval")]
    pub probe_interval_ms: u32,
    /// Deadline for a pending send before it is abandoned, in ms
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u32,
    /// Settling delay between boot commands, in ms
    #[serde(default = "default_settle")]
    pub settle_ms: u64,
}

/// Durable event storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the backing image file
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

/// Motion input source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Path of the GPIO value file carrying the sensor level
    pub gpio_path: PathBuf,
}

/// Upload scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UplinkConfig {
    /// Interval between upload triggers, in ms
    #[serde(default = "default_uplink_interval")]
    pub interval_ms: u32,
}

// Default value functions
fn default_host() -> String {
    "api.thingspeak.com".to_string()
}

fn default_port() -> u16 {
    80
}

fn default_baud() -> u32 {
    4800
}

fn default_probe_interval() -> u32 {
    2000
}

fn default_send_timeout() -> u32 {
    10_000
}

fn default_settle() -> u64 {
    200
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("motion-node.nv")
}

fn default_uplink_interval() -> u32 {
    30_000
}

impl NodeConfig {
    /// Load configuration from `config/node.toml` and environment variables
    ///
    /// Environment variables can override configuration with prefix
    /// `MOTION_NODE_`. Example: `MOTION_NODE_APPLICATION_LOG_LEVEL=debug`
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("config/node.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("MOTION_NODE_").split("_"))
            .extract()
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.wifi.ssid.is_empty() {
            return Err("wifi.ssid must not be empty".to_string());
        }

        if self.cloud.api_key.is_empty() {
            return Err("cloud.api_key must not be empty".to_string());
        }

        if self.cloud.port == 0 {
            return Err("cloud.port must be non-zero".to_string());
        }

        if self.modem.baud_rate == 0 {
            return Err("modem.baud_rate must be non-zero".to_string());
        }

        if self.modem.probe_interval_ms == 0 {
            return Err("modem.probe_interval_ms must be non-zero".to_string());
        }

        if self.modem.send_timeout_ms == 0 {
            return Err("modem.send_timeout_ms must be non-zero".to_string());
        }

        Ok(())
    }
}
