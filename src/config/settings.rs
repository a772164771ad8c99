//! Coordination configuration — all tunables as operator-editable TOML
//!
//! Every struct implements `Default` with values from `defaults.rs`, so a
//! missing or partial file never changes behavior silently.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use super::validation;
use crate::types::FuelType;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a coordination deployment.
///
/// Load with `CoordinationConfig::load()` which searches:
/// 1. `$EMBERLINE_CONFIG` env var
/// 2. `./emberline.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoordinationConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub breaker: BreakerConfig,

    #[serde(default)]
    pub optimizer: OptimizerConfig,

    #[serde(default)]
    pub conflict: ConflictConfig,

    #[serde(default)]
    pub providers: ProviderConfig,

    #[serde(default)]
    pub emission_factors: EmissionFactors,
}

impl CoordinationConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("EMBERLINE_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from EMBERLINE_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from EMBERLINE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "EMBERLINE_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("emberline.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./emberline.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./emberline.toml, using defaults");
                }
            }
        }

        info!("No emberline.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path, then coerce out-of-range
    /// values back to defaults (logged as warnings).
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        let mut config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        for warning in validation::coerce(&mut config) {
            warn!(field = %warning.field, "{warning}");
        }
        Ok(config)
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(String, String),
    #[error("failed to parse TOML: {0}")]
    Parse(String),
}

// ============================================================================
// Sections
// ============================================================================

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

fn default_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_addr() }
    }
}

/// Coordinator queue and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "d_worker_pool")]
    pub worker_pool_size: usize,
    #[serde(default = "d_queue_capacity")]
    pub queue_capacity: usize,
}

fn d_worker_pool() -> usize {
    defaults::WORKER_POOL_SIZE
}
fn d_queue_capacity() -> usize {
    defaults::QUEUE_CAPACITY
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: d_worker_pool(),
            queue_capacity: d_queue_capacity(),
        }
    }
}

/// TTL cache settings for provider reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "d_ttl_current")]
    pub ttl_weather_current_secs: u64,
    #[serde(default = "d_ttl_forecast")]
    pub ttl_weather_forecast_secs: u64,
    #[serde(default = "d_ttl_nearest")]
    pub ttl_nearest_secs: u64,
    #[serde(default = "d_cache_capacity")]
    pub capacity: usize,
}

fn d_ttl_current() -> u64 {
    defaults::CACHE_TTL_WEATHER_CURRENT_SECS
}
fn d_ttl_forecast() -> u64 {
    defaults::CACHE_TTL_WEATHER_FORECAST_SECS
}
fn d_ttl_nearest() -> u64 {
    defaults::CACHE_TTL_NEAREST_SECS
}
fn d_cache_capacity() -> usize {
    defaults::CACHE_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_weather_current_secs: d_ttl_current(),
            ttl_weather_forecast_secs: d_ttl_forecast(),
            ttl_nearest_secs: d_ttl_nearest(),
            capacity: d_cache_capacity(),
        }
    }
}

/// Circuit breaker settings, shared by all stage+provider breakers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "d_breaker_threshold")]
    pub threshold: u32,
    #[serde(default = "d_breaker_cooldown")]
    pub cooldown_secs: u64,
}

fn d_breaker_threshold() -> u32 {
    defaults::BREAKER_THRESHOLD
}
fn d_breaker_cooldown() -> u64 {
    defaults::BREAKER_COOLDOWN_SECS
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: d_breaker_threshold(),
            cooldown_secs: d_breaker_cooldown(),
        }
    }
}

/// Simulated annealing control parameters.
///
/// Invalid values (non-positive temperatures, cooling outside (0, 1),
/// zero iterations) are coerced back to defaults at load time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizerConfig {
    #[serde(default = "d_t_initial")]
    pub t_initial: f64,
    #[serde(default = "d_t_final")]
    pub t_final: f64,
    #[serde(default = "d_cooling")]
    pub cooling: f64,
    #[serde(default = "d_max_iterations")]
    pub max_iterations: u64,
    #[serde(default = "d_reheat_threshold")]
    pub reheat_threshold: u64,
    #[serde(default = "d_reheat_factor")]
    pub reheat_factor: f64,
    #[serde(default = "d_convergence_window")]
    pub convergence_window: u64,
    #[serde(default = "d_convergence_threshold")]
    pub convergence_threshold: f64,
    /// Optional seed for byte-identical reruns.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "d_w_priority")]
    pub w_priority: f64,
    #[serde(default = "d_w_conflict")]
    pub w_conflict: f64,
    #[serde(default = "d_w_time")]
    pub w_time: f64,
    #[serde(default = "d_w_efficiency")]
    pub w_efficiency: f64,
}

fn d_t_initial() -> f64 {
    defaults::OPTIMIZER_T_INITIAL
}
fn d_t_final() -> f64 {
    defaults::OPTIMIZER_T_FINAL
}
fn d_cooling() -> f64 {
    defaults::OPTIMIZER_COOLING
}
fn d_max_iterations() -> u64 {
    defaults::OPTIMIZER_MAX_ITERATIONS
}
fn d_reheat_threshold() -> u64 {
    defaults::OPTIMIZER_REHEAT_THRESHOLD
}
fn d_reheat_factor() -> f64 {
    defaults::OPTIMIZER_REHEAT_FACTOR
}
fn d_convergence_window() -> u64 {
    defaults::OPTIMIZER_CONVERGENCE_WINDOW
}
fn d_convergence_threshold() -> f64 {
    defaults::OPTIMIZER_CONVERGENCE_THRESHOLD
}
fn d_w_priority() -> f64 {
    defaults::OBJECTIVE_W_PRIORITY
}
fn d_w_conflict() -> f64 {
    defaults::OBJECTIVE_W_CONFLICT
}
fn d_w_time() -> f64 {
    defaults::OBJECTIVE_W_TIME
}
fn d_w_efficiency() -> f64 {
    defaults::OBJECTIVE_W_EFFICIENCY
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            t_initial: d_t_initial(),
            t_final: d_t_final(),
            cooling: d_cooling(),
            max_iterations: d_max_iterations(),
            reheat_threshold: d_reheat_threshold(),
            reheat_factor: d_reheat_factor(),
            convergence_window: d_convergence_window(),
            convergence_threshold: d_convergence_threshold(),
            seed: None,
            w_priority: d_w_priority(),
            w_conflict: d_w_conflict(),
            w_time: d_w_time(),
            w_efficiency: d_w_efficiency(),
        }
    }
}

/// Conflict detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Hard cap on candidate burns per target date.
    #[serde(default = "d_conflict_cap")]
    pub cap: usize,
    /// Slack added to the radius sum when gathering grid candidates (m).
    #[serde(default = "d_conflict_slack")]
    pub slack_m: f64,
}

fn d_conflict_cap() -> usize {
    defaults::CONFLICT_CAP
}
fn d_conflict_slack() -> f64 {
    defaults::CONFLICT_SLACK_M
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            cap: d_conflict_cap(),
            slack_m: d_conflict_slack(),
        }
    }
}

/// External provider wiring: credentials and mock-mode flags.
///
/// Credentials are opaque strings handed to the providers; mock flags
/// swap the facades for in-memory implementations with the same
/// contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub weather_api_key: Option<String>,
    #[serde(default = "d_weather_url")]
    pub weather_base_url: String,
    #[serde(default)]
    pub sms_api_key: Option<String>,
    #[serde(default = "d_sms_url")]
    pub sms_base_url: String,
    /// Sled data directory.
    #[serde(default = "d_store_path")]
    pub store_path: String,
    #[serde(default)]
    pub use_mock_store: bool,
    #[serde(default)]
    pub use_mock_weather: bool,
    #[serde(default)]
    pub use_mock_notifier: bool,
}

fn d_weather_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}
fn d_sms_url() -> String {
    "https://api.sms.example.com/v1/messages".to_string()
}
fn d_store_path() -> String {
    defaults::DATA_DIR.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            weather_api_key: None,
            weather_base_url: d_weather_url(),
            sms_api_key: None,
            sms_base_url: d_sms_url(),
            store_path: d_store_path(),
            use_mock_store: false,
            use_mock_weather: false,
            use_mock_notifier: false,
        }
    }
}

/// Fuel emission factor table, g/s per hectare at reference intensity.
///
/// Values differ across published fixtures, so the table is operator-
/// overridable rather than baked in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmissionFactors {
    #[serde(default = "d_wheat")]
    pub wheat_stubble: f64,
    #[serde(default = "d_rice")]
    pub rice_straw: f64,
    #[serde(default = "d_corn")]
    pub corn_stalks: f64,
    #[serde(default = "d_orchard")]
    pub orchard_prunings: f64,
    #[serde(default = "d_grass")]
    pub grass: f64,
}

fn d_wheat() -> f64 {
    defaults::EMISSION_WHEAT_STUBBLE
}
fn d_rice() -> f64 {
    defaults::EMISSION_RICE_STRAW
}
fn d_corn() -> f64 {
    defaults::EMISSION_CORN_STALKS
}
fn d_orchard() -> f64 {
    defaults::EMISSION_ORCHARD_PRUNINGS
}
fn d_grass() -> f64 {
    defaults::EMISSION_GRASS
}

impl Default for EmissionFactors {
    fn default() -> Self {
        Self {
            wheat_stubble: d_wheat(),
            rice_straw: d_rice(),
            corn_stalks: d_corn(),
            orchard_prunings: d_orchard(),
            grass: d_grass(),
        }
    }
}

impl EmissionFactors {
    /// Factor for a fuel type, g/s per hectare.
    pub fn factor(&self, fuel: FuelType) -> f64 {
        match fuel {
            FuelType::WheatStubble => self.wheat_stubble,
            FuelType::RiceStraw => self.rice_straw,
            FuelType::CornStalks => self.corn_stalks,
            FuelType::OrchardPrunings => self.orchard_prunings,
            FuelType::Grass => self.grass,
        }
    }
}
