use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use domain::automation::Rule;
use domain::node::Node;

use crate::transport::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_PATH, DEFAULT_RECONNECT_DELAY, Endpoint, ReconnectPolicy,
};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    pub host: String,
    /// Set when the hub is served from an HTTPS origin; forces `wss`
    #[serde(default)]
    pub secure_origin: bool,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}
fn default_reconnect_delay() -> u64 {
    DEFAULT_RECONNECT_DELAY.as_secs()
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl TransportConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::resolve(&self.host, self.secure_origin).with_path(&self.path)
    }

    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::from_secs(self.reconnect_delay_secs),
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AutomationConfig {
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
    #[serde(default = "default_auto_off_tick")]
    pub auto_off_tick_secs: u64,
}

fn default_tick() -> u64 {
    5
}
fn default_auto_off_tick() -> u64 {
    1
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick(),
            auto_off_tick_secs: default_auto_off_tick(),
        }
    }
}

impl AutomationConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }

    pub fn auto_off_tick(&self) -> Duration {
        Duration::from_secs(self.auto_off_tick_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HubConfig {
    pub transport: TransportConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Rule snapshot written while running; replaces `rules` on the next start
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl HubConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("transport.host", "localhost")?
            // Local config file is REQUIRED
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(true))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. HUB__TRANSPORT__HOST=nodehub)
            .add_source(Environment::with_prefix("HUB").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
