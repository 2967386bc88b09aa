//! Engine configuration.
//!
//! Loaded from YAML (path from `UPDOWN_CONFIG_PATH` or the default), with
//! `.env` loaded first so environment overrides are available. Every knob has
//! a default so a partial file is enough.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Where the effective bankroll comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankrollMode {
    Fixed,
    AutoCash,
    AutoEquity,
}

impl std::fmt::Display for BankrollMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BankrollMode::Fixed => write!(f, "FIXED"),
            BankrollMode::AutoCash => write!(f, "AUTO_CASH"),
            BankrollMode::AutoEquity => write!(f, "AUTO_EQUITY"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BankrollConfig {
    pub bankroll_usd: f64,
    pub mode: BankrollMode,
    /// Fraction of the source value the engine may deploy, clamped to [0, 1].
    pub trading_fraction: f64,
    /// EMA alpha, clamped to [0.01, 1.0] at use.
    pub smoothing_alpha: f64,
    /// Circuit breaker: below this the engine stops placing new orders.
    pub min_threshold: f64,
    pub refresh_millis: u64,
}

impl Default for BankrollConfig {
    fn default() -> Self {
        Self {
            bankroll_usd: 1000.0,
            mode: BankrollMode::Fixed,
            trading_fraction: 1.0,
            smoothing_alpha: 0.2,
            min_threshold: 100.0,
            refresh_millis: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_order_bankroll_fraction: f64,
    pub max_total_bankroll_fraction: f64,
    pub max_order_notional_usd: f64,
    /// In shares.
    pub max_order_size: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_order_bankroll_fraction: 0.10,
            max_total_bankroll_fraction: 0.50,
            max_order_notional_usd: 250.0,
            max_order_size: 500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicSizingConfig {
    pub enabled: bool,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
    /// Denominator of actual/reference; falls back to `bankroll_usd` when 0.
    pub reference_bankroll_usd: f64,
}

impl Default for DynamicSizingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_multiplier: 0.5,
            max_multiplier: 2.0,
            reference_bankroll_usd: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopUpConfig {
    pub enabled: bool,
    pub seconds_to_end: u64,
    pub min_shares: f64,
}

impl Default for TopUpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seconds_to_end: 60,
            min_shares: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FastTopUpConfig {
    pub enabled: bool,
    pub min_shares: f64,
    pub fraction: f64,
    pub min_edge: f64,
    pub cooldown_millis: u64,
    pub min_seconds_after_fill: u64,
    pub max_seconds_after_fill: u64,
    /// Also the complement of the hedge-delay probability: a fill hedges fast
    /// with this probability, otherwise the opposite leg is held back.
    pub probability: f64,
    pub taker_max_spread: f64,
}

impl Default for FastTopUpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_shares: 5.0,
            fraction: 0.6,
            min_edge: 0.0,
            cooldown_millis: 10_000,
            min_seconds_after_fill: 1,
            max_seconds_after_fill: 30,
            probability: 0.5,
            taker_max_spread: 0.03,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgeDelayConfig {
    pub enabled: bool,
    pub min_seconds: u64,
    pub max_seconds: u64,
}

impl Default for HedgeDelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_seconds: 2,
            max_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TakerModeConfig {
    pub enabled: bool,
    pub max_edge: f64,
    pub max_spread: f64,
    pub probability: f64,
}

impl Default for TakerModeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_edge: 0.0,
            max_spread: 0.02,
            probability: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub window_millis: u64,
    /// Minimum mid-price move over the window to call a trend.
    pub min_move: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            window_millis: 30_000,
            min_move: 0.02,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub fill_poll_millis: u64,
    pub maker_fill_min_age_millis: u64,
    pub tob_max_age_millis: u64,
    pub lead_lag_min_millis: u64,
    /// Base per-poll fill probability for a maker order at the bid.
    pub maker_fill_probability: f64,
    /// Multiplier per tick of improvement above the bid.
    pub maker_fill_multiplier: f64,
    pub maker_fill_max_probability: f64,
    pub maker_fill_fraction_of_remaining: f64,
    pub maker_queue_factor_min: f64,
    pub maker_queue_factor_max: f64,
    /// Paper-mode balances reported by the simulator.
    pub paper_bankroll_usd: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fill_poll_millis: 250,
            maker_fill_min_age_millis: 1_500,
            tob_max_age_millis: 15_000,
            lead_lag_min_millis: 2_000,
            maker_fill_probability: 0.05,
            maker_fill_multiplier: 1.6,
            maker_fill_max_probability: 0.5,
            maker_fill_fraction_of_remaining: 1.0,
            maker_queue_factor_min: 0.25,
            maker_queue_factor_max: 1.0,
            paper_bankroll_usd: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeTapeConfig {
    pub enabled: bool,
    /// Label of the external print source; informational only.
    pub source: String,
    pub poll_millis: u64,
    pub lookback_seconds: u64,
    pub limit: usize,
    /// Use the print's own timestamp for ordering rather than receipt time.
    pub use_trade_timestamp: bool,
    /// A token silent on the tape this long falls back to probabilistic fills.
    pub fallback_after_millis: u64,
    pub fallback_probability_factor: f64,
    /// Maximum ticks behind the current best bid a resting order may sit and
    /// still consume prints.
    pub bid_delta_max_ticks: i64,
}

impl Default for TradeTapeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source: "ws-last-trade".to_string(),
            poll_millis: 1_000,
            lookback_seconds: 10,
            limit: 200,
            use_trade_timestamp: true,
            fallback_after_millis: 30_000,
            fallback_probability_factor: 0.25,
            bid_delta_max_ticks: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub poll_secs: u64,
    /// Assets with 15-minute and hourly Up/Down series.
    pub assets: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_secs: 10,
            assets: vec!["btc".to_string(), "eth".to_string()],
        }
    }
}

/// Top-level configuration for the directional engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub enabled: bool,
    pub refresh_millis: u64,
    pub min_replace_millis: u64,
    pub force_replace_millis: u64,
    pub min_price_delta: f64,
    pub min_size_delta: f64,

    pub complete_set_min_edge: f64,
    pub complete_set_cancel_edge: f64,
    pub complete_set_max_skew_ticks: u32,
    pub complete_set_max_skew_shares: f64,

    pub quote_size: f64,
    pub min_seconds_to_end: u64,
    pub max_seconds_to_end: u64,
    pub inventory_sync_secs: u64,

    pub top_up: TopUpConfig,
    pub fast_top_up: FastTopUpConfig,
    pub hedge_delay: HedgeDelayConfig,
    pub taker_mode: TakerModeConfig,
    pub momentum: MomentumConfig,

    pub bankroll: BankrollConfig,
    pub risk: RiskConfig,
    pub dynamic_sizing: DynamicSizingConfig,

    pub sim: SimConfig,
    pub tape: TradeTapeConfig,
    pub discovery: DiscoveryConfig,

    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Seed for the engine / simulator RNG; random when absent.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_millis: 250,
            min_replace_millis: 1_000,
            force_replace_millis: 10_000,
            min_price_delta: 0.005,
            min_size_delta: 0.5,
            complete_set_min_edge: 0.01,
            complete_set_cancel_edge: 0.0,
            complete_set_max_skew_ticks: 3,
            complete_set_max_skew_shares: 50.0,
            quote_size: 20.0,
            min_seconds_to_end: 0,
            max_seconds_to_end: 7_200,
            inventory_sync_secs: 60,
            top_up: TopUpConfig::default(),
            fast_top_up: FastTopUpConfig::default(),
            hedge_delay: HedgeDelayConfig::default(),
            taker_mode: TakerModeConfig::default(),
            momentum: MomentumConfig::default(),
            bankroll: BankrollConfig::default(),
            risk: RiskConfig::default(),
            dynamic_sizing: DynamicSizingConfig::default(),
            sim: SimConfig::default(),
            tape: TradeTapeConfig::default(),
            discovery: DiscoveryConfig::default(),
            log_level: "info".to_string(),
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file, with `.env` loaded first.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let yaml_content = std::fs::read_to_string(config_path)?;
        let config: EngineConfig = serde_yaml::from_str(&yaml_content)?;

        config.validate()?;
        Ok(config)
    }

    /// Engine tick period, clamped to at least 100 ms.
    pub fn tick_millis(&self) -> u64 {
        self.refresh_millis.max(100)
    }

    /// How long the planned edge must sit below the cancel threshold before
    /// both legs are pulled.
    pub fn edge_below_cancel_millis(&self) -> u64 {
        self.tick_millis().max(750)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.min_replace_millis > self.force_replace_millis {
            return Err(ConfigError::ValidationError(
                "min_replace_millis must be <= force_replace_millis".to_string(),
            ));
        }
        if self.quote_size <= 0.0 {
            return Err(ConfigError::ValidationError(
                "quote_size must be positive".to_string(),
            ));
        }
        if self.min_seconds_to_end > self.max_seconds_to_end {
            return Err(ConfigError::ValidationError(
                "min_seconds_to_end must be <= max_seconds_to_end".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fast_top_up.fraction) {
            return Err(ConfigError::ValidationError(
                "fast_top_up.fraction must be in [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fast_top_up.probability) {
            return Err(ConfigError::ValidationError(
                "fast_top_up.probability must be in [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.taker_mode.probability) {
            return Err(ConfigError::ValidationError(
                "taker_mode.probability must be in [0, 1]".to_string(),
            ));
        }
        if self.hedge_delay.min_seconds > self.hedge_delay.max_seconds {
            return Err(ConfigError::ValidationError(
                "hedge_delay.min_seconds must be <= max_seconds".to_string(),
            ));
        }
        if self.sim.maker_queue_factor_min > self.sim.maker_queue_factor_max {
            return Err(ConfigError::ValidationError(
                "sim.maker_queue_factor_min must be <= max".to_string(),
            ));
        }
        if self.bankroll.trading_fraction < 0.0 {
            return Err(ConfigError::ValidationError(
                "bankroll.trading_fraction must be non-negative".to_string(),
            ));
        }
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Engine enabled: {}", self.enabled);
        info!("  Tick interval: {} ms", self.tick_millis());
        info!(
            "  Edge: entry {:.3}, cancel {:.3}",
            self.complete_set_min_edge, self.complete_set_cancel_edge
        );
        info!(
            "  Bankroll: {} ${:.2} (threshold ${:.2})",
            self.bankroll.mode, self.bankroll.bankroll_usd, self.bankroll.min_threshold
        );
        info!("  Quote size: {} shares", self.quote_size);
        info!("  Log level: {}", self.log_level);
    }
}
