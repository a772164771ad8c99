//! Per-stage+provider circuit breaker
//!
//! States: `Closed → Open → HalfOpen`. Opens after a run of consecutive
//! failures; after the cooldown a single probe is admitted. Success
//! closes, failure re-opens. Auth failures latch the breaker open until
//! an explicit reset (reconfiguration).

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::PipelineError;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Auth failure: stays open regardless of cooldown until reset.
    latched: bool,
}

/// Circuit breaker guarding one provider from one stage.
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: u32, cooldown: Duration) -> Self {
        Self {
            name: name.to_string(),
            threshold: threshold.max(1),
            cooldown,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                latched: false,
            }),
        }
    }

    /// Gate a call. `Ok` admits it (and may move the breaker to
    /// half-open for a probe); `Err(Unavailable)` fails fast.
    pub fn check(&self) -> Result<(), PipelineError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| PipelineError::Unavailable("breaker lock poisoned".into()))?;
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::HalfOpen => {
                // One probe is already in flight
                Err(PipelineError::Unavailable(format!("breaker {} half-open", self.name)))
            }
            BreakerState::Open => {
                if inner.latched {
                    return Err(PipelineError::Unavailable(format!(
                        "breaker {} latched open (auth)",
                        self.name
                    )));
                }
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.cooldown {
                    inner.state = BreakerState::HalfOpen;
                    info!(breaker = %self.name, "Breaker half-open, admitting probe");
                    Ok(())
                } else {
                    Err(PipelineError::Unavailable(format!("breaker {} open", self.name)))
                }
            }
        }
    }

    /// Record a successful call. Closes the breaker from any state.
    pub fn record_success(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.state != BreakerState::Closed {
                info!(breaker = %self.name, "Breaker closed");
            }
            inner.state = BreakerState::Closed;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
        }
    }

    /// Record a failed call. Opens after the threshold; a probe failure
    /// re-opens immediately; auth failures latch.
    pub fn record_failure(&self, error: &PipelineError) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if matches!(error, PipelineError::Auth) {
            inner.state = BreakerState::Open;
            inner.latched = true;
            inner.opened_at = Some(Instant::now());
            warn!(breaker = %self.name, "Breaker latched open on auth failure");
            return;
        }
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                warn!(breaker = %self.name, "Probe failed, breaker re-opened");
            }
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "Breaker opened"
                    );
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Clear a latched breaker after reconfiguration.
    pub fn reset(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = BreakerState::Closed;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
            inner.latched = false;
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().map(|i| i.state).unwrap_or(BreakerState::Open)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable() -> PipelineError {
        PipelineError::Unavailable("boom".into())
    }

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new("wx", 5, Duration::from_secs(30));
        for _ in 0..4 {
            breaker.record_failure(&unavailable());
            assert_eq!(breaker.state(), BreakerState::Closed);
        }
        breaker.record_failure(&unavailable());
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.check().is_err());
    }

    #[test]
    fn success_resets_the_failure_run() {
        let breaker = CircuitBreaker::new("wx", 3, Duration::from_secs(30));
        breaker.record_failure(&unavailable());
        breaker.record_failure(&unavailable());
        breaker.record_success();
        breaker.record_failure(&unavailable());
        breaker.record_failure(&unavailable());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn cooldown_admits_one_probe() {
        let breaker = CircuitBreaker::new("wx", 1, Duration::from_millis(0));
        breaker.record_failure(&unavailable());
        assert_eq!(breaker.state(), BreakerState::Open);

        // Zero cooldown: first check becomes the probe
        assert!(breaker.check().is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        // Second caller is rejected while the probe is in flight
        assert!(breaker.check().is_err());

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn failed_probe_reopens() {
        let breaker = CircuitBreaker::new("wx", 1, Duration::from_millis(0));
        breaker.record_failure(&unavailable());
        assert!(breaker.check().is_ok());
        breaker.record_failure(&unavailable());
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn auth_failure_latches_until_reset() {
        let breaker = CircuitBreaker::new("wx", 5, Duration::from_millis(0));
        breaker.record_failure(&PipelineError::Auth);
        assert_eq!(breaker.state(), BreakerState::Open);
        // Cooldown elapsed but latched: still rejected
        assert!(breaker.check().is_err());
        breaker.reset();
        assert!(breaker.check().is_ok());
    }
}
