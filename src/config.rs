use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use crate::board::SortOrder;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub polls: PollsConfig,
    pub ui: UiConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process store, nothing leaves this machine
    Memory,
    /// PostgREST endpoint
    Rest,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "demo" => Ok(BackendKind::Memory),
            "rest" | "postgrest" | "supabase" => Ok(BackendKind::Rest),
            _ => Err(anyhow::anyhow!("Unknown backend: {}", s)),
        }
    }
}

/// Backing store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Project URL, e.g. https://xyz.supabase.co
    pub url: Option<String>,
    /// Anonymous API key sent as `apikey` and bearer token
    pub api_key: Option<String>,
    /// How often the REST backend polls for remote changes
    pub poll_interval_ms: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            url: None,
            api_key: None,
            poll_interval_ms: 2000,
            timeout_secs: 10,
        }
    }
}

/// Poll behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollsConfig {
    /// Expiry offered for new polls
    pub default_expiry_hours: u32,
    /// Countdown refresh cadence
    pub clock_tick_secs: u64,
    /// How long a +1 cue stays on screen
    pub celebration_ms: u64,
}

impl Default for PollsConfig {
    fn default() -> Self {
        Self {
            default_expiry_hours: 24,
            clock_tick_secs: 60,
            celebration_ms: 1500,
        }
    }
}

/// UI customization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Color preset: default, catppuccin-mocha, nord
    pub theme: String,
    pub default_sort: SortOrder,
    pub show_expired: bool,
    /// Event loop tick in milliseconds
    pub status_interval_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            default_sort: SortOrder::Newest,
            show_expired: false,
            status_interval_ms: 200,
        }
    }
}

/// Local vote ledger settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Ledger file (empty = default data dir)
    pub path: Option<String>,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("livepoll");

        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory")?;

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from file, or create default if not exists
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .context("Failed to read config file")?;

            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;

            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(&path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    pub fn ledger_path(&self) -> Result<PathBuf> {
        match self.ledger.path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => Ok(PathBuf::from(path)),
            None => crate::ledger::VoteLedger::default_path(),
        }
    }
}
