//! Configuration management with validation and defaults.
//!
//! Nested sections with sensible defaults, preset factories, and a loader
//! supporting TOML files plus `DICEHOUSE_*` environment overrides.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

/// Top-level configuration for a casino core instance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DicehouseConfig {
    pub game: GameConfig,
    pub ledger: LedgerConfig,
    pub bonus: BonusConfig,
    pub promo: PromoConfig,
}

impl Default for DicehouseConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            ledger: LedgerConfig::default(),
            bonus: BonusConfig::default(),
            promo: PromoConfig::default(),
        }
    }
}

/// Payout engine settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameConfig {
    /// House edge in basis points (500 = 5%).
    pub house_edge_bps: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { house_edge_bps: 500 }
    }
}

/// Ledger settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Minimum withdrawal in whole currency units.
    pub min_withdrawal: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { min_withdrawal: 500 }
    }
}

/// Bonus wagering policies.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BonusConfig {
    pub wager_progress: WagerProgressPolicy,
    pub stacking: BonusStackingPolicy,
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            wager_progress: WagerProgressPolicy::AllStakes,
            stacking: BonusStackingPolicy::Accumulate,
        }
    }
}

/// Promo engine settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromoConfig {
    /// Seed the built-in demo catalog at startup.
    pub seed_demo_codes: bool,
}

impl Default for PromoConfig {
    fn default() -> Self {
        Self { seed_demo_codes: false }
    }
}

/// Which stakes advance the bonus wagering requirement.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WagerProgressPolicy {
    /// Every stake counts, regardless of funding source.
    AllStakes,
    /// Only stakes funded from the bonus balance count.
    BonusFundedOnly,
}

impl FromStr for WagerProgressPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_stakes" => Ok(Self::AllStakes),
            "bonus_funded_only" => Ok(Self::BonusFundedOnly),
            other => Err(format!("unknown wager progress policy: {}", other)),
        }
    }
}

/// How a new bonus grant interacts with an outstanding one.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BonusStackingPolicy {
    /// Grants add to the outstanding bonus balance and requirement.
    Accumulate,
    /// A new grant supersedes the outstanding bonus balance and requirement.
    Replace,
}

impl FromStr for BonusStackingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accumulate" => Ok(Self::Accumulate),
            "replace" => Ok(Self::Replace),
            other => Err(format!("unknown bonus stacking policy: {}", other)),
        }
    }
}

/// Configuration validation and factory methods.
impl DicehouseConfig {
    /// Configuration matching the public demo deployment: default economics
    /// plus the built-in promo catalog.
    pub fn demo() -> Self {
        Self {
            promo: PromoConfig { seed_demo_codes: true },
            ..Default::default()
        }
    }

    /// House edge as a decimal fraction.
    pub fn house_edge(&self) -> Decimal {
        Decimal::from(self.game.house_edge_bps) / Decimal::from(10_000u32)
    }

    /// Minimum withdrawal as a decimal amount.
    pub fn min_withdrawal(&self) -> Decimal {
        Decimal::from(self.ledger.min_withdrawal)
    }

    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game.house_edge_bps >= 10_000 {
            return Err(ConfigError::InvalidValue {
                field: "game.house_edge_bps".to_string(),
                value: self.game.house_edge_bps.to_string(),
                reason: "house edge must be below 100%".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Configuration loader with environment variable support.
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path.
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables.
    pub fn load(&self) -> Result<DicehouseConfig, ConfigError> {
        let mut config = if let Some(ref path) = self.config_path {
            self.load_from_file(path)?
        } else {
            DicehouseConfig::default()
        };

        self.apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file.
    fn load_from_file(&self, path: &str) -> Result<DicehouseConfig, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to parse TOML: {}", e)))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&self, config: &mut DicehouseConfig) -> Result<(), ConfigError> {
        if let Ok(bps) = env::var("DICEHOUSE_HOUSE_EDGE_BPS") {
            config.game.house_edge_bps = bps.parse().map_err(|_| ConfigError::InvalidValue {
                field: "DICEHOUSE_HOUSE_EDGE_BPS".to_string(),
                value: bps,
                reason: "Invalid basis point value".to_string(),
            })?;
        }

        if let Ok(min) = env::var("DICEHOUSE_MIN_WITHDRAWAL") {
            config.ledger.min_withdrawal = min.parse().map_err(|_| ConfigError::InvalidValue {
                field: "DICEHOUSE_MIN_WITHDRAWAL".to_string(),
                value: min,
                reason: "Invalid amount".to_string(),
            })?;
        }

        if let Ok(policy) = env::var("DICEHOUSE_WAGER_PROGRESS") {
            config.bonus.wager_progress =
                policy.parse().map_err(|reason| ConfigError::InvalidValue {
                    field: "DICEHOUSE_WAGER_PROGRESS".to_string(),
                    value: policy.clone(),
                    reason,
                })?;
        }

        if let Ok(policy) = env::var("DICEHOUSE_BONUS_STACKING") {
            config.bonus.stacking =
                policy.parse().map_err(|reason| ConfigError::InvalidValue {
                    field: "DICEHOUSE_BONUS_STACKING".to_string(),
                    value: policy.clone(),
                    reason,
                })?;
        }

        if let Ok(seed) = env::var("DICEHOUSE_SEED_DEMO_CODES") {
            config.promo.seed_demo_codes =
                seed.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "DICEHOUSE_SEED_DEMO_CODES".to_string(),
                    value: seed,
                    reason: "Invalid boolean value".to_string(),
                })?;
        }

        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, config: &DicehouseConfig, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write to {}: {}", path, e)))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder pattern for creating configurations.
pub struct ConfigBuilder {
    config: DicehouseConfig,
}

impl ConfigBuilder {
    /// Create a new config builder with defaults.
    pub fn new() -> Self {
        Self {
            config: DicehouseConfig::default(),
        }
    }

    /// Set game configuration.
    pub fn game(mut self, game: GameConfig) -> Self {
        self.config.game = game;
        self
    }

    /// Set ledger configuration.
    pub fn ledger(mut self, ledger: LedgerConfig) -> Self {
        self.config.ledger = ledger;
        self
    }

    /// Set bonus policies.
    pub fn bonus(mut self, bonus: BonusConfig) -> Self {
        self.config.bonus = bonus;
        self
    }

    /// Set promo configuration.
    pub fn promo(mut self, promo: PromoConfig) -> Self {
        self.config.promo = promo;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> DicehouseConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a sample configuration file.
pub fn generate_sample_config(path: &str) -> Result<(), ConfigError> {
    let config = DicehouseConfig::default();
    let loader = ConfigLoader::new();
    loader.save(&config, path)
}
