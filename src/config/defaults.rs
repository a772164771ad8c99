//! Built-in default constants
//!
//! Single source for every tunable the TOML layer defaults to. Values
//! outside the documented ranges are coerced back to these by
//! `validation::coerce`.

/// Worker pool size draining the coordinator queue.
pub const WORKER_POOL_SIZE: usize = 8;

/// Bounded submit queue capacity. Overflow returns backpressure.
pub const QUEUE_CAPACITY: usize = 100;

/// Current-conditions cache TTL (seconds).
pub const CACHE_TTL_WEATHER_CURRENT_SECS: u64 = 600;

/// Hourly-forecast cache TTL (seconds).
pub const CACHE_TTL_WEATHER_FORECAST_SECS: u64 = 3_600;

/// Nearest-neighbor lookup cache TTL (seconds).
pub const CACHE_TTL_NEAREST_SECS: u64 = 300;

/// Bounded cache entry count.
pub const CACHE_CAPACITY: usize = 1_024;

/// Consecutive failures before a breaker opens.
pub const BREAKER_THRESHOLD: u32 = 5;

/// Seconds an open breaker waits before allowing a half-open probe.
pub const BREAKER_COOLDOWN_SECS: u64 = 30;

/// Maximum candidate burns per target date fed to the optimizer.
pub const CONFLICT_CAP: usize = 500;

/// Extra slack added to radius sums when gathering grid candidates (m).
pub const CONFLICT_SLACK_M: f64 = 500.0;

/// Annealer initial temperature.
pub const OPTIMIZER_T_INITIAL: f64 = 100.0;

/// Annealer final temperature floor.
pub const OPTIMIZER_T_FINAL: f64 = 1.0;

/// Geometric cooling rate.
pub const OPTIMIZER_COOLING: f64 = 0.95;

/// Annealer iteration cap.
pub const OPTIMIZER_MAX_ITERATIONS: u64 = 5_000;

/// Iterations without improvement before reheating.
pub const OPTIMIZER_REHEAT_THRESHOLD: u64 = 250;

/// Multiplier applied to the temperature on reheat (capped at T0).
pub const OPTIMIZER_REHEAT_FACTOR: f64 = 2.0;

/// Trailing window for relative-improvement convergence detection.
pub const OPTIMIZER_CONVERGENCE_WINDOW: u64 = 500;

/// Relative improvement below which the search is declared converged.
pub const OPTIMIZER_CONVERGENCE_THRESHOLD: f64 = 1e-4;

/// Objective weights: priority satisfaction, conflict penalty,
/// time-preference gap, efficiency bonus.
pub const OBJECTIVE_W_PRIORITY: f64 = 0.4;
pub const OBJECTIVE_W_CONFLICT: f64 = 0.3;
pub const OBJECTIVE_W_TIME: f64 = 0.2;
pub const OBJECTIVE_W_EFFICIENCY: f64 = 0.1;

/// Replay window per request on the broadcast bus.
pub const BUS_REPLAY_WINDOW: usize = 200;

/// Per-subscriber channel depth before slow-subscriber drop kicks in.
pub const BUS_SUBSCRIBER_DEPTH: usize = 256;

/// Retry attempts for transient provider failures within a stage budget.
pub const STAGE_MAX_RETRIES: u32 = 3;

/// Base backoff between stage retries (milliseconds), doubled per attempt
/// with jitter.
pub const STAGE_BACKOFF_BASE_MS: u64 = 250;

/// Fuel emission factors, g/s per hectare at reference intensity 1.0.
pub const EMISSION_WHEAT_STUBBLE: f64 = 12.0;
pub const EMISSION_RICE_STRAW: f64 = 18.0;
pub const EMISSION_CORN_STALKS: f64 = 10.0;
pub const EMISSION_ORCHARD_PRUNINGS: f64 = 8.0;
pub const EMISSION_GRASS: f64 = 6.0;

/// HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Default sled data directory.
pub const DATA_DIR: &str = "./data/emberline";
