use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Tracks success/failure streaks and gates requests by state.
///
/// State machine:
/// ```text
/// closed    --(failures >= threshold)-->         open
/// open      --(elapsed >= timeout on allow check)--> half_open
/// half_open --(successes >= threshold)-->        closed
/// half_open --(any failure)-->                   open
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    last_state_change: Instant,
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, success_threshold: u32, timeout_ms: u64) -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            success_count: 0,
            last_state_change: Instant::now(),
            failure_threshold,
            success_threshold,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    fn transition(&mut self, new_state: BreakerState) {
        if new_state != self.state {
            tracing::debug!(
                target: "shinydb_client::breaker",
                from = ?self.state,
                to = ?new_state,
                failure_count = self.failure_count,
                success_count = self.success_count,
                "circuit breaker transition"
            );
        }
        self.state = new_state;
        self.last_state_change = Instant::now();
    }

    /// Whether a new request should be allowed through.
    pub fn should_allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                if self.last_state_change.elapsed() >= self.timeout {
                    self.failure_count = 0;
                    self.success_count = 0;
                    self.transition(BreakerState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            BreakerState::Closed => {
                self.failure_count = 0;
            }
            BreakerState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.success_threshold {
                    self.failure_count = 0;
                    self.success_count = 0;
                    self.transition(BreakerState::Closed);
                }
            }
            BreakerState::Open => {
                self.failure_count = 0;
            }
        }
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        match self.state {
            BreakerState::Closed => {
                if self.failure_count >= self.failure_threshold {
                    self.transition(BreakerState::Open);
                }
            }
            BreakerState::HalfOpen => {
                self.success_count = 0;
                self.transition(BreakerState::Open);
            }
            BreakerState::Open => {
                self.last_state_change = Instant::now();
            }
        }
    }

    /// Unconditional return to `closed`.
    pub fn reset(&mut self) {
        self.failure_count = 0;
        self.success_count = 0;
        self.transition(BreakerState::Closed);
    }
}

/// A `CircuitBreaker` shared and mutated across threads.
///
/// §5 permits a breaker to be shared across threads as long as accesses to
/// its counters are serialized; this wrapper is that serialization point.
#[derive(Debug, Clone)]
pub struct SharedCircuitBreaker(Arc<Mutex<CircuitBreaker>>);

impl SharedCircuitBreaker {
    pub fn new(failure_threshold: u32, success_threshold: u32, timeout_ms: u64) -> Self {
        Self(Arc::new(Mutex::new(CircuitBreaker::new(
            failure_threshold,
            success_threshold,
            timeout_ms,
        ))))
    }

    #[allow(clippy::unwrap_used)]
    pub fn should_allow(&self) -> bool {
        self.0.lock().unwrap().should_allow()
    }

    #[allow(clippy::unwrap_used)]
    pub fn record_success(&self) {
        self.0.lock().unwrap().record_success();
    }

    #[allow(clippy::unwrap_used)]
    pub fn record_failure(&self) {
        self.0.lock().unwrap().record_failure();
    }

    #[allow(clippy::unwrap_used)]
    pub fn state(&self) -> BreakerState {
        self.0.lock().unwrap().state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_failure_threshold_reached() {
        let mut breaker = CircuitBreaker::new(2, 2, 60_000);
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn half_open_recovery_scenario_2() {
        let mut breaker = CircuitBreaker::new(2, 2, 0);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        assert!(breaker.should_allow());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn open_rejects_until_timeout_elapses() {
        let mut breaker = CircuitBreaker::new(1, 1, 60_000);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.should_allow());
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let mut breaker = CircuitBreaker::new(1, 2, 0);
        breaker.record_failure();
        assert!(breaker.should_allow());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn reset_returns_to_closed_unconditionally() {
        let mut breaker = CircuitBreaker::new(1, 1, 60_000);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        breaker.reset();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn shared_breaker_is_send_and_sync_across_clones() {
        let shared = SharedCircuitBreaker::new(2, 2, 0);
        let other = shared.clone();
        shared.record_failure();
        shared.record_failure();
        assert_eq!(other.state(), BreakerState::Open);
    }
}
