//! Trip planner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main planner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM client configuration
    pub llm: LlmConfig,

    /// Provider chain settings
    pub providers: ProvidersConfig,

    /// Specialist coordination
    pub coordinator: CoordinatorConfig,

    /// Offer categorization
    pub categorize: CategorizeConfig,

    /// Session limits
    pub session: SessionConfig,
}

impl Config {
    /// Check values that would make planning impossible
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.worker_pool_size == 0 {
            return Err(eyre::eyre!("coordinator.worker-pool-size must be at least 1"));
        }
        if self.categorize.top_k == 0 {
            return Err(eyre::eyre!("categorize.top-k must be at least 1"));
        }
        if self.providers.timeout_ms == 0 {
            return Err(eyre::eyre!("providers.timeout-ms must be positive"));
        }
        if self.session.currency.len() != 3 {
            return Err(eyre::eyre!(
                "session.currency must be a 3-letter code, got '{}'",
                self.session.currency
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path must load or fail
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .tripplanner.yml
        let local_config = PathBuf::from(".tripplanner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/tripplanner/tripplanner.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripplanner").join("tripplanner.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Register the LLM itinerary provider when an API key is present
    pub enabled: bool,

    /// Provider name (only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .context(format!("LLM API key not found. Set the {} environment variable.", self.api_key_env))
    }
}

/// Priority and confidence for one built-in provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSlot {
    /// Lower runs first
    pub priority: u32,

    /// Baseline confidence in [0, 1]
    pub confidence: f64,
}

/// Provider chain settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Per-attempt timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Availability probe timeout in milliseconds
    #[serde(rename = "probe-timeout-ms")]
    pub probe_timeout_ms: u64,

    /// Offline template itinerary provider
    pub template: ProviderSlot,

    /// LLM-backed itinerary provider
    pub llm: ProviderSlot,

    /// Fixture inventory provider
    pub inventory: InventoryConfig,
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            probe_timeout_ms: 2_000,
            template: ProviderSlot {
                priority: 20,
                confidence: 0.6,
            },
            llm: ProviderSlot {
                priority: 10,
                confidence: 0.85,
            },
            inventory: InventoryConfig::default(),
        }
    }
}

/// Fixture inventory provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// JSON file with flight and hotel offers; inventory search is disabled when unset
    #[serde(rename = "fixture-path")]
    pub fixture_path: Option<PathBuf>,

    pub priority: u32,

    pub confidence: f64,

    /// Offers returned per search
    #[serde(rename = "page-size")]
    pub page_size: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            fixture_path: None,
            priority: 10,
            confidence: 0.8,
            page_size: 20,
        }
    }
}

/// Specialist coordination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Specialist tasks allowed to run at once
    #[serde(rename = "worker-pool-size")]
    pub worker_pool_size: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { worker_pool_size: 4 }
    }
}

/// Offer categorization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizeConfig {
    /// Offers kept per flight bucket
    #[serde(rename = "top-k")]
    pub top_k: usize,

    /// Minimum rating for the luxury hotel bucket
    #[serde(rename = "luxury-rating-floor")]
    pub luxury_rating_floor: f64,
}

impl Default for CategorizeConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            luxury_rating_floor: 4.0,
        }
    }
}

/// Session limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Refinements allowed per session
    #[serde(rename = "max-refinements")]
    pub max_refinements: u32,

    /// Currency used for allocations and estimates
    pub currency: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_refinements: 5,
            currency: "USD".to_string(),
        }
    }
}
