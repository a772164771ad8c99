//! Config range checks with coercion back to defaults
//!
//! Invalid operator-supplied values never abort startup: each is replaced
//! by its built-in default and reported as a warning. This mirrors the
//! optimizer contract that initialization succeeds even with a nonsense
//! parameter block.

use super::defaults;
use super::settings::CoordinationConfig;

/// A non-fatal config warning (out-of-range value coerced to default).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn coerced(field: &str, detail: String) -> ValidationWarning {
    ValidationWarning {
        field: field.to_string(),
        message: format!("{field}: {detail} — using default"),
    }
}

/// Walk the config, replacing invalid values with defaults. Returns the
/// warnings produced; an empty vec means the file was clean.
pub fn coerce(config: &mut CoordinationConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let opt = &mut config.optimizer;
    if !opt.t_initial.is_finite() || opt.t_initial <= 0.0 {
        warnings.push(coerced("optimizer.t_initial", format!("{} is not > 0", opt.t_initial)));
        opt.t_initial = defaults::OPTIMIZER_T_INITIAL;
    }
    if !opt.t_final.is_finite() || opt.t_final <= 0.0 || opt.t_final >= opt.t_initial {
        warnings.push(coerced(
            "optimizer.t_final",
            format!("{} is not in (0, t_initial)", opt.t_final),
        ));
        opt.t_final = defaults::OPTIMIZER_T_FINAL.min(opt.t_initial / 2.0);
    }
    if !opt.cooling.is_finite() || opt.cooling <= 0.0 || opt.cooling >= 1.0 {
        warnings.push(coerced("optimizer.cooling", format!("{} is not in (0, 1)", opt.cooling)));
        opt.cooling = defaults::OPTIMIZER_COOLING;
    }
    if opt.max_iterations == 0 {
        warnings.push(coerced("optimizer.max_iterations", "0 is not > 0".to_string()));
        opt.max_iterations = defaults::OPTIMIZER_MAX_ITERATIONS;
    }
    if opt.reheat_threshold == 0 {
        warnings.push(coerced("optimizer.reheat_threshold", "0 is not > 0".to_string()));
        opt.reheat_threshold = defaults::OPTIMIZER_REHEAT_THRESHOLD;
    }
    if !opt.reheat_factor.is_finite() || opt.reheat_factor <= 1.0 {
        warnings.push(coerced(
            "optimizer.reheat_factor",
            format!("{} is not > 1", opt.reheat_factor),
        ));
        opt.reheat_factor = defaults::OPTIMIZER_REHEAT_FACTOR;
    }
    if opt.convergence_window == 0 {
        warnings.push(coerced("optimizer.convergence_window", "0 is not > 0".to_string()));
        opt.convergence_window = defaults::OPTIMIZER_CONVERGENCE_WINDOW;
    }
    if !opt.convergence_threshold.is_finite() || opt.convergence_threshold <= 0.0 {
        warnings.push(coerced(
            "optimizer.convergence_threshold",
            format!("{} is not > 0", opt.convergence_threshold),
        ));
        opt.convergence_threshold = defaults::OPTIMIZER_CONVERGENCE_THRESHOLD;
    }

    // Objective weights must be non-negative; a zero total would make
    // every schedule score identically.
    let weight_total = opt.w_priority + opt.w_conflict + opt.w_time + opt.w_efficiency;
    if [opt.w_priority, opt.w_conflict, opt.w_time, opt.w_efficiency]
        .iter()
        .any(|w| !w.is_finite() || *w < 0.0)
        || weight_total <= 0.0
    {
        warnings.push(coerced("optimizer.weights", "invalid weight set".to_string()));
        opt.w_priority = defaults::OBJECTIVE_W_PRIORITY;
        opt.w_conflict = defaults::OBJECTIVE_W_CONFLICT;
        opt.w_time = defaults::OBJECTIVE_W_TIME;
        opt.w_efficiency = defaults::OBJECTIVE_W_EFFICIENCY;
    }

    if config.coordinator.worker_pool_size == 0 {
        warnings.push(coerced("coordinator.worker_pool_size", "0 is not > 0".to_string()));
        config.coordinator.worker_pool_size = defaults::WORKER_POOL_SIZE;
    }
    if config.coordinator.queue_capacity == 0 {
        warnings.push(coerced("coordinator.queue_capacity", "0 is not > 0".to_string()));
        config.coordinator.queue_capacity = defaults::QUEUE_CAPACITY;
    }

    if config.breaker.threshold == 0 {
        warnings.push(coerced("breaker.threshold", "0 is not > 0".to_string()));
        config.breaker.threshold = defaults::BREAKER_THRESHOLD;
    }

    if config.conflict.cap == 0 {
        warnings.push(coerced("conflict.cap", "0 is not > 0".to_string()));
        config.conflict.cap = defaults::CONFLICT_CAP;
    }
    if !config.conflict.slack_m.is_finite() || config.conflict.slack_m < 0.0 {
        warnings.push(coerced(
            "conflict.slack_m",
            format!("{} is not >= 0", config.conflict.slack_m),
        ));
        config.conflict.slack_m = defaults::CONFLICT_SLACK_M;
    }

    let factors = &mut config.emission_factors;
    for (name, value, default) in [
        ("wheat_stubble", &mut factors.wheat_stubble, defaults::EMISSION_WHEAT_STUBBLE),
        ("rice_straw", &mut factors.rice_straw, defaults::EMISSION_RICE_STRAW),
        ("corn_stalks", &mut factors.corn_stalks, defaults::EMISSION_CORN_STALKS),
        ("orchard_prunings", &mut factors.orchard_prunings, defaults::EMISSION_ORCHARD_PRUNINGS),
        ("grass", &mut factors.grass, defaults::EMISSION_GRASS),
    ] {
        if !value.is_finite() || *value <= 0.0 {
            warnings.push(coerced(
                &format!("emission_factors.{name}"),
                format!("{value} is not > 0"),
            ));
            *value = default;
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_defaults_produce_no_warnings() {
        let mut config = CoordinationConfig::default();
        assert!(coerce(&mut config).is_empty());
    }

    #[test]
    fn invalid_optimizer_values_are_coerced() {
        let mut config = CoordinationConfig::default();
        config.optimizer.t_initial = -10.0;
        config.optimizer.cooling = 1.5;
        config.optimizer.max_iterations = 0;

        let warnings = coerce(&mut config);
        assert!(warnings.len() >= 3, "warnings: {warnings:?}");
        assert!((config.optimizer.t_initial - defaults::OPTIMIZER_T_INITIAL).abs() < f64::EPSILON);
        assert!((config.optimizer.cooling - defaults::OPTIMIZER_COOLING).abs() < f64::EPSILON);
        assert_eq!(config.optimizer.max_iterations, defaults::OPTIMIZER_MAX_ITERATIONS);
    }

    #[test]
    fn t_final_must_stay_below_t_initial() {
        let mut config = CoordinationConfig::default();
        config.optimizer.t_initial = 50.0;
        config.optimizer.t_final = 60.0;

        let warnings = coerce(&mut config);
        assert_eq!(warnings.len(), 1);
        assert!(config.optimizer.t_final < config.optimizer.t_initial);
    }

    #[test]
    fn nan_emission_factor_is_replaced() {
        let mut config = CoordinationConfig::default();
        config.emission_factors.rice_straw = f64::NAN;
        let warnings = coerce(&mut config);
        assert_eq!(warnings.len(), 1);
        assert!(
            (config.emission_factors.rice_straw - defaults::EMISSION_RICE_STRAW).abs()
                < f64::EPSILON
        );
    }
}
