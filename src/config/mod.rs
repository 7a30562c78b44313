//! # Configuration Management Module
//!
//! Typed TOML configuration for the clanforge engine. Every tunable the
//! rules engine consumes lives here with a documented default, so a missing
//! or partial config file never prevents startup.
//!
//! ## Configuration Structure
//!
//! - [`FactionConfig`] - naming rules, membership/ally/claim limits
//! - [`PowerConfig`] - the power economy constants and freeze duration
//! - [`CostConfig`] - money charged for creation and claiming
//! - [`CooldownConfig`] - teleport and message-throttle cooldowns
//! - [`StorageConfig`] - mirror store location
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use clanforge::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("power per member: {}", config.power.power_per_member);
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub faction: FactionConfig,
    #[serde(default)]
    pub power: PowerConfig,
    #[serde(default)]
    pub costs: CostConfig,
    #[serde(default)]
    pub cooldowns: CooldownConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactionConfig {
    /// Faction name length bounds. Names outside the range are rejected at
    /// creation.
    #[serde(default = "default_min_name_length")]
    pub min_name_length: usize,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    #[serde(default = "default_max_members")]
    pub max_members: usize,
    #[serde(default = "default_max_allies")]
    pub max_allies: usize,
    #[serde(default = "default_max_claims")]
    pub max_claims: usize,
    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,
    /// Seconds a pending invite stays valid.
    #[serde(default = "default_invite_expiry_secs")]
    pub invite_expiry_secs: i64,
    /// Worlds where faction rules apply. Empty means every world.
    #[serde(default)]
    pub worlds: Vec<String>,
}

fn default_min_name_length() -> usize {
    3
}

fn default_max_name_length() -> usize {
    16
}

fn default_max_members() -> usize {
    10
}

fn default_max_allies() -> usize {
    3
}

fn default_max_claims() -> usize {
    20
}

fn default_max_description_length() -> usize {
    120
}

fn default_invite_expiry_secs() -> i64 {
    60
}

impl Default for FactionConfig {
    fn default() -> Self {
        Self {
            min_name_length: default_min_name_length(),
            max_name_length: default_max_name_length(),
            max_members: default_max_members(),
            max_allies: default_max_allies(),
            max_claims: default_max_claims(),
            max_description_length: default_max_description_length(),
            invite_expiry_secs: default_invite_expiry_secs(),
            worlds: Vec::new(),
        }
    }
}

impl FactionConfig {
    /// True when faction rules apply in the named world. An empty allowlist
    /// covers every world.
    pub fn applies_in_world(&self, world: &str) -> bool {
        self.worlds.is_empty() || self.worlds.iter().any(|w| w == world)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerConfig {
    /// Faction power granted at creation.
    #[serde(default = "default_initial_power")]
    pub initial_power: i64,
    /// Each member raises the faction power ceiling by this much. The
    /// ceiling is always derived live from the member count.
    #[serde(default = "default_power_per_member")]
    pub power_per_member: i64,
    /// Personal power gained by a killer.
    #[serde(default = "default_power_per_kill")]
    pub power_per_kill: f64,
    /// Personal power lost by a victim.
    #[serde(default = "default_power_per_death")]
    pub power_per_death: f64,
    /// Summed member power required to hold one claim. Falling below
    /// `claims * power_per_claim` freezes the faction.
    #[serde(default = "default_power_per_claim")]
    pub power_per_claim: f64,
    /// Faction power required per held claim when claiming another chunk.
    #[serde(default = "default_claims_per_power")]
    pub claims_per_power: i64,
    /// Faction power required for the first alliance.
    #[serde(default = "default_first_ally_power")]
    pub first_ally_power: i64,
    /// Additional faction power required per alliance beyond the first.
    #[serde(default = "default_additional_ally_increment")]
    pub additional_ally_increment: i64,
    /// Seconds of raid protection once power collapses.
    #[serde(default = "default_freeze_duration_secs")]
    pub freeze_duration_secs: i64,
    /// Starting and ceiling values for personal power.
    #[serde(default = "default_player_initial_power")]
    pub player_initial_power: f64,
    #[serde(default = "default_player_max_power")]
    pub player_max_power: f64,
}

fn default_initial_power() -> i64 {
    20
}

fn default_power_per_member() -> i64 {
    20
}

fn default_power_per_kill() -> f64 {
    5.0
}

fn default_power_per_death() -> f64 {
    10.0
}

fn default_power_per_claim() -> f64 {
    5.0
}

fn default_claims_per_power() -> i64 {
    2
}

fn default_first_ally_power() -> i64 {
    50
}

fn default_additional_ally_increment() -> i64 {
    25
}

fn default_freeze_duration_secs() -> i64 {
    600
}

fn default_player_initial_power() -> f64 {
    10.0
}

fn default_player_max_power() -> f64 {
    100.0
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            initial_power: default_initial_power(),
            power_per_member: default_power_per_member(),
            power_per_kill: default_power_per_kill(),
            power_per_death: default_power_per_death(),
            power_per_claim: default_power_per_claim(),
            claims_per_power: default_claims_per_power(),
            first_ally_power: default_first_ally_power(),
            additional_ally_increment: default_additional_ally_increment(),
            freeze_duration_secs: default_freeze_duration_secs(),
            player_initial_power: default_player_initial_power(),
            player_max_power: default_player_max_power(),
        }
    }
}

impl PowerConfig {
    /// Faction power required to hold one more alliance when `ally_count`
    /// alliances already exist.
    pub fn ally_power_requirement(&self, ally_count: usize) -> i64 {
        self.first_ally_power + self.additional_ally_increment * ally_count as i64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostConfig {
    #[serde(default = "default_create_cost")]
    pub create: f64,
    #[serde(default = "default_claim_cost")]
    pub claim: f64,
}

fn default_create_cost() -> f64 {
    100.0
}

fn default_claim_cost() -> f64 {
    25.0
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            create: default_create_cost(),
            claim: default_claim_cost(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Seconds between uses of the home teleport.
    #[serde(default = "default_home_cooldown_secs")]
    pub home_secs: i64,
    /// Throttle for repeated protection messages to the same player.
    #[serde(default = "default_message_throttle_secs")]
    pub protection_message_secs: i64,
    /// Throttle for toggling border display.
    #[serde(default = "default_border_toggle_secs")]
    pub border_toggle_secs: i64,
}

fn default_home_cooldown_secs() -> i64 {
    5
}

fn default_message_throttle_secs() -> i64 {
    3
}

fn default_border_toggle_secs() -> i64 {
    3
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            home_secs: default_home_cooldown_secs(),
            protection_message_secs: default_message_throttle_secs(),
            border_toggle_secs: default_border_toggle_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: Some("clanforge.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}
