//! Circuit breaker for resilient external service calls
//!
//! One breaker per provider. State transitions:
//! - `closed → open` when consecutive failures reach the threshold
//! - `open → half_open` lazily once the cooldown has elapsed; the
//!   transition is evaluated on every state read, not by a timer
//! - `half_open → closed` on success, `half_open → open` on failure
//!
//! Breakers are in-memory only and reset to `closed` at process start.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// JSON-serialisable snapshot of a breaker
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BreakerStatus {
    pub name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub cooldown_seconds: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Thread-safe circuit breaker for a single external dependency
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            cooldown,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Evaluate the lazy open→half_open transition. Lock must be held.
    fn check_half_open_locked(&self, inner: &mut BreakerInner) {
        if inner.state == BreakerState::Open
            && let Some(last_failure) = inner.last_failure
            && last_failure.elapsed() >= self.cooldown
        {
            inner.state = BreakerState::HalfOpen;
            info!(
                "CircuitBreaker[{}]: open -> half_open (cooldown {:?} elapsed)",
                self.name, self.cooldown
            );
        }
    }

    /// Current state, evaluating the cooldown transition
    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        self.check_half_open_locked(&mut inner);
        inner.state
    }

    /// True for `closed` and `half_open`, false for `open`
    pub fn allow_request(&self) -> bool {
        self.state() != BreakerState::Open
    }

    /// A successful call resets the breaker to `closed`
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state != BreakerState::Closed {
            info!(
                "CircuitBreaker[{}]: {:?} -> closed (success)",
                self.name, inner.state
            );
        }
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
    }

    /// A failed call; may trip the breaker to `open`
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                warn!("CircuitBreaker[{}]: half_open -> open (probe failed)", self.name);
            }
            BreakerState::Closed if inner.failure_count >= self.failure_threshold => {
                inner.state = BreakerState::Open;
                warn!(
                    "CircuitBreaker[{}]: closed -> open ({} consecutive failures)",
                    self.name, inner.failure_count
                );
            }
            _ => {}
        }
    }

    /// Force the breaker back to `closed`
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        let old_state = inner.state;
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
        if old_state != BreakerState::Closed {
            info!(
                "CircuitBreaker[{}]: {:?} -> closed (manual reset)",
                self.name, old_state
            );
        }
    }

    pub fn status(&self) -> BreakerStatus {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        self.check_half_open_locked(&mut inner);
        BreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.failure_threshold,
            cooldown_seconds: self.cooldown.as_secs(),
        }
    }
}

/// One breaker per provider name, created on demand so hot-added plugins
/// start with a fresh `closed` breaker
pub struct CircuitBreakerRegistry {
    failure_threshold: u32,
    cooldown: Duration,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold,
            cooldown,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn breaker_for(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().expect("registry lock poisoned").get(name) {
            return breaker.clone();
        }
        let mut breakers = self.breakers.write().expect("registry lock poisoned");
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    name,
                    self.failure_threshold,
                    self.cooldown,
                ))
            })
            .clone()
    }

    /// Reset a provider's breaker; true when the breaker existed
    pub fn reset(&self, name: &str) -> bool {
        let breakers = self.breakers.read().expect("registry lock poisoned");
        match breakers.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn status(&self, name: &str) -> Option<BreakerStatus> {
        self.breakers
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .map(|b| b.status())
    }

    pub fn snapshot(&self) -> Vec<BreakerStatus> {
        let mut statuses: Vec<BreakerStatus> = self
            .breakers
            .read()
            .expect("registry lock poisoned")
            .values()
            .map(|b| b.status())
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new("test", threshold, Duration::from_millis(cooldown_ms))
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = breaker(3, 60_000);
        assert!(cb.allow_request());

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = breaker(3, 60_000);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_after_cooldown_then_closes_on_success() {
        let cb = breaker(1, 20);
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(30));
        // Lazy transition happens on read
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert!(cb.allow_request());

        cb.record_success();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_reopens_on_failure() {
        let cb = breaker(1, 20);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cb.state(), BreakerState::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn manual_reset_closes() {
        let cb = breaker(1, 60_000);
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        cb.reset();
        assert_eq!(cb.state(), BreakerState::Closed);
        assert_eq!(cb.status().failure_count, 0);
    }

    #[test]
    fn registry_hands_out_one_breaker_per_name() {
        let registry = CircuitBreakerRegistry::new(3, Duration::from_secs(60));
        let a = registry.breaker_for("opensubtitles");
        let b = registry.breaker_for("opensubtitles");
        a.record_failure();
        assert_eq!(b.status().failure_count, 1);
        assert_eq!(registry.snapshot().len(), 1);
    }
}
