//! Circuit Breaker (C12).
//!
//! Guards the background persistence path. Three operations under a
//! single async mutex, per spec.md §4.12. `timeout=0` disables tripping
//! entirely ("never open"), matching the boundary behavior implied by
//! treating a zero cooldown as a no-op guard.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

struct State {
    failure_count: u32,
    disabled_until: Option<DateTime<Utc>>,
}

/// Tracks consecutive failures of a guarded operation and temporarily
/// disables attempts once a threshold is crossed.
pub struct CircuitBreaker {
    max_failures: u32,
    timeout_seconds: u64,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, timeout_seconds: u64) -> Self {
        Self {
            max_failures,
            timeout_seconds,
            state: Mutex::new(State {
                failure_count: 0,
                disabled_until: None,
            }),
        }
    }

    /// Returns true unless `disabled_until` is set and still in the
    /// future. A `disabled_until` in the past resets state before
    /// returning true.
    pub fn should_attempt(&self) -> bool {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        match state.disabled_until {
            Some(until) if until > Utc::now() => false,
            Some(_) => {
                state.disabled_until = None;
                state.failure_count = 0;
                true
            }
            None => true,
        }
    }

    /// Reset failure count and clear `disabled_until`. Must be called
    /// outside the guarded operation's error-handling path so that a
    /// failure in this call itself cannot spuriously trigger
    /// `record_failure`.
    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        state.failure_count = 0;
        state.disabled_until = None;
    }

    /// Increment the failure count; trip the breaker once it reaches
    /// `max_failures`, unless `timeout_seconds == 0` ("never open").
    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        state.failure_count += 1;
        if self.timeout_seconds > 0 && state.failure_count >= self.max_failures {
            state.disabled_until =
                Some(Utc::now() + chrono::Duration::seconds(self.timeout_seconds as i64));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_attempt_true_initially() {
        let breaker = CircuitBreaker::new(3, 60);
        assert!(breaker.should_attempt());
    }

    #[test]
    fn test_trips_after_max_failures() {
        let breaker = CircuitBreaker::new(2, 60);
        breaker.record_failure();
        assert!(breaker.should_attempt());
        breaker.record_failure();
        assert!(!breaker.should_attempt());
    }

    #[test]
    fn test_record_success_resets_state() {
        let breaker = CircuitBreaker::new(2, 60);
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.should_attempt());
        breaker.record_success();
        assert!(breaker.should_attempt());
    }

    #[test]
    fn test_zero_timeout_never_opens() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.should_attempt());
    }

    #[test]
    fn test_should_attempt_resets_after_disabled_until_passes() {
        let breaker = CircuitBreaker::new(1, 60);
        breaker.record_failure();
        assert!(!breaker.should_attempt());
        {
            let mut state = breaker.state.lock().unwrap();
            state.disabled_until = Some(Utc::now() - chrono::Duration::seconds(1));
        }
        assert!(breaker.should_attempt());
    }
}
