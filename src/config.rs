//! Configuration for agentmeter.
//!
//! Everything has a usable default so the engine runs with no
//! configuration file present. Invalid values never block scoring or
//! selection: the offending section falls back to its defaults and a
//! warning is logged.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub rates: RateTable,
    /// Directory holding the persisted ledger and metrics documents.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

/// Model routing thresholds and override keyword lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Whether complexity-based routing is enabled. When disabled every
    /// selection returns the conservative premium tier.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Scores at or below this go to the economy tier.
    #[serde(default = "default_economy_max")]
    pub economy_max: u32,

    /// Scores at or above this go to the premium tier. Must exceed
    /// `economy_max`; the band in between is economy-with-review.
    #[serde(default = "default_premium_min")]
    pub premium_min: u32,

    /// Keywords that force the premium tier regardless of score.
    #[serde(default = "default_always_premium")]
    pub always_premium: Vec<String>,

    /// Keywords that force the economy tier regardless of score.
    #[serde(default = "default_always_economy")]
    pub always_economy: Vec<String>,

    /// Concrete model identifier per tier.
    #[serde(default)]
    pub models: TierModels,

    /// How much a premium-tier unit of work costs relative to an
    /// economy-tier one. Used by the savings projection only.
    #[serde(default = "default_premium_cost_factor")]
    pub premium_cost_factor: f64,
}

/// Model identifiers reported in routing decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierModels {
    #[serde(default = "default_economy_model")]
    pub economy: String,
    #[serde(default = "default_review_model")]
    pub economy_review: String,
    #[serde(default = "default_premium_model")]
    pub premium: String,
}

/// Monthly budget ceiling and alert threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_monthly_ceiling")]
    pub monthly_ceiling_usd: f64,
    /// Percentage of the ceiling at which a warning alert fires.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold_pct: f64,
}

/// Per-tier token rates in USD per million tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    #[serde(default = "default_economy_rates")]
    pub economy: TokenRates,
    #[serde(default = "default_premium_rates")]
    pub premium: TokenRates,
}

/// Input/output token rates in USD per million tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenRates {
    pub input: f64,
    pub output: f64,
}

fn default_enabled() -> bool {
    true
}
fn default_economy_max() -> u32 {
    30
}
fn default_premium_min() -> u32 {
    60
}
fn default_premium_cost_factor() -> f64 {
    4.0
}
fn default_always_premium() -> Vec<String> {
    ["payment", "security", "auth", "migration", "encryption", "transaction"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_always_economy() -> Vec<String> {
    ["documentation", "tests", "refactor-simple"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_economy_model() -> String {
    "haiku-4.5".to_string()
}
fn default_review_model() -> String {
    "haiku-with-sonnet-review".to_string()
}
fn default_premium_model() -> String {
    "sonnet-4.5".to_string()
}
fn default_monthly_ceiling() -> f64 {
    500.0
}
fn default_alert_threshold() -> f64 {
    80.0
}
fn default_economy_rates() -> TokenRates {
    TokenRates {
        input: 0.8,
        output: 4.0,
    }
}
fn default_premium_rates() -> TokenRates {
    TokenRates {
        input: 3.0,
        output: 15.0,
    }
}

fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".agentmeter"))
        .unwrap_or_else(|| PathBuf::from(".agentmeter"))
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            economy_max: default_economy_max(),
            premium_min: default_premium_min(),
            always_premium: default_always_premium(),
            always_economy: default_always_economy(),
            models: TierModels::default(),
            premium_cost_factor: default_premium_cost_factor(),
        }
    }
}

impl Default for TierModels {
    fn default() -> Self {
        Self {
            economy: default_economy_model(),
            economy_review: default_review_model(),
            premium: default_premium_model(),
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            monthly_ceiling_usd: default_monthly_ceiling(),
            alert_threshold_pct: default_alert_threshold(),
        }
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            economy: default_economy_rates(),
            premium: default_premium_rates(),
        }
    }
}

impl Config {
    /// Default config file location (`<state_dir>/config.toml`).
    pub fn default_path() -> PathBuf {
        default_state_dir().join("config.toml")
    }

    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// A missing file is not an error. A file that fails to parse, or
    /// parses into invalid values, degrades to defaults with a warning
    /// rather than blocking the caller.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let config = match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str::<Config>(&raw) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to parse config file, using defaults"
                    );
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        };
        config.validated()
    }

    /// Replace invalid sections with their defaults, logging a warning
    /// for each problem found.
    pub fn validated(mut self) -> Self {
        for err in self.validation_errors() {
            tracing::warn!(error = %err, "invalid configuration value, using section defaults");
            match err {
                ConfigError::InvalidValue { ref key, .. } if key.starts_with("routing") => {
                    let models = self.routing.models.clone();
                    self.routing = RoutingConfig {
                        models,
                        ..RoutingConfig::default()
                    };
                }
                ConfigError::InvalidValue { ref key, .. } if key.starts_with("budget") => {
                    self.budget = BudgetConfig::default();
                }
                ConfigError::InvalidValue { ref key, .. } if key.starts_with("rates") => {
                    self.rates = RateTable::default();
                }
                _ => {}
            }
        }
        self
    }

    fn validation_errors(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.routing.economy_max >= self.routing.premium_min {
            errors.push(ConfigError::InvalidValue {
                key: "routing.premium_min".to_string(),
                message: format!(
                    "must exceed economy_max ({} >= {})",
                    self.routing.economy_max, self.routing.premium_min
                ),
            });
        }
        if !(self.routing.premium_cost_factor.is_finite())
            || self.routing.premium_cost_factor <= 0.0
        {
            errors.push(ConfigError::InvalidValue {
                key: "routing.premium_cost_factor".to_string(),
                message: "must be a positive number".to_string(),
            });
        }
        if !self.budget.monthly_ceiling_usd.is_finite() || self.budget.monthly_ceiling_usd <= 0.0 {
            errors.push(ConfigError::InvalidValue {
                key: "budget.monthly_ceiling_usd".to_string(),
                message: "must be a positive number".to_string(),
            });
        }
        if !self.budget.alert_threshold_pct.is_finite()
            || self.budget.alert_threshold_pct <= 0.0
            || self.budget.alert_threshold_pct > 100.0
        {
            errors.push(ConfigError::InvalidValue {
                key: "budget.alert_threshold_pct".to_string(),
                message: "must be in (0, 100]".to_string(),
            });
        }
        for (key, rates) in [("rates.economy", self.rates.economy), ("rates.premium", self.rates.premium)]
        {
            if rates.input < 0.0 || rates.output < 0.0 || !rates.input.is_finite() || !rates.output.is_finite() {
                errors.push(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "token rates must be non-negative".to_string(),
                });
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = Config::default();
        assert!(config.routing.enabled);
        assert_eq!(config.routing.economy_max, 30);
        assert_eq!(config.routing.premium_min, 60);
        assert_eq!(config.budget.monthly_ceiling_usd, 500.0);
        assert_eq!(config.budget.alert_threshold_pct, 80.0);
        assert!(config.routing.always_premium.contains(&"payment".to_string()));
        assert!(config.validation_errors().is_empty());
    }

    #[test]
    fn inverted_thresholds_fall_back_to_defaults() {
        let mut config = Config::default();
        config.routing.economy_max = 80;
        config.routing.premium_min = 20;
        let config = config.validated();
        assert_eq!(config.routing.economy_max, 30);
        assert_eq!(config.routing.premium_min, 60);
    }

    #[test]
    fn bad_budget_falls_back_but_keeps_routing() {
        let mut config = Config::default();
        config.budget.monthly_ceiling_usd = -5.0;
        config.routing.economy_max = 25;
        let config = config.validated();
        assert_eq!(config.budget.monthly_ceiling_usd, 500.0);
        assert_eq!(config.routing.economy_max, 25);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/agentmeter.toml")));
        assert_eq!(config.routing.premium_min, 60);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let raw = r#"
            [routing]
            economy_max = 25

            [budget]
            monthly_ceiling_usd = 300.0
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        let config = config.validated();
        assert_eq!(config.routing.economy_max, 25);
        assert_eq!(config.routing.premium_min, 60);
        assert_eq!(config.budget.monthly_ceiling_usd, 300.0);
        assert_eq!(config.budget.alert_threshold_pct, 80.0);
        assert_eq!(config.rates.premium.output, 15.0);
    }
}
