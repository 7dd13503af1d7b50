//! Configuration module for the shaping node.
//!
//! Loads configuration from YAML files and environment variables. Every field
//! has a default, so the node starts without any file present.

use std::net::IpAddr;
use std::path::PathBuf;

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

use crate::shaping::ShapingParameters;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub content: ContentConfig,
    pub shaping: ShapingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface whose IPv4 address is bound, and whose traffic is shaped.
    pub interface: String,
    /// Explicit bind address. Skips the interface lookup when set.
    pub bind_address: Option<IpAddr>,
    pub content_port: u16,
    pub control_port: u16,
    /// Answer value errors with 400 instead of 200.
    pub strict_status: bool,
    /// Grace period per listener before its serving task is aborted.
    pub shutdown_timeout_secs: u64,
}

/// Static content configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Directory served on the content port.
    pub root: PathBuf,
    /// DASH manifest expected inside `root`.
    pub manifest: String,
}

/// Traffic shaper configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShapingConfig {
    /// Path to the wondershaper executable.
    pub program: PathBuf,
    /// Parameters applied at startup.
    pub initial: ShapingParameters,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DASH_SHAPER__*)
    /// 2. config/local.yaml (if exists)
    /// 3. config/default.yaml (if exists)
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("DASH_SHAPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            bind_address: None,
            content_port: 8080,
            control_port: 8088,
            strict_status: false,
            shutdown_timeout_secs: 5,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/dash_contents"),
            manifest: "stream.mpd".to_string(),
        }
    }
}

impl Default for ShapingConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/wondershaper"),
            initial: ShapingParameters::default(),
        }
    }
}
