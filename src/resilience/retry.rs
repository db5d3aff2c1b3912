use crate::error::Error;

/// Backoff and attempt-count configuration for the resilient wrapper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub const fn new(
        max_attempts: u32,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms,
            max_backoff_ms,
            backoff_multiplier,
        }
    }

    /// Whether `err` should be retried under this policy.
    ///
    /// The policy itself does not vary the retryable set; it defers to
    /// `Error::is_retryable`, which is the closed set §4.4 defines.
    pub fn is_retryable(&self, err: &Error) -> bool {
        err.is_retryable()
    }

    /// Backoff delay in milliseconds before retry attempt `attempt`.
    ///
    /// `attempt = 0` (the first try, not a retry) has no backoff.
    pub fn calculate_backoff(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return 0;
        }
        let scaled = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        (scaled as u64).min(self.max_backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 100, 10_000, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_zero_for_first_attempt() {
        assert_eq!(RetryPolicy::default().calculate_backoff(0), 0);
    }

    #[test]
    fn backoff_progression_matches_spec_scenario_1() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.calculate_backoff(1), 100);
        assert_eq!(policy.calculate_backoff(2), 200);
        assert_eq!(policy.calculate_backoff(3), 400);
        assert_eq!(policy.calculate_backoff(4), 800);
    }

    #[test]
    fn backoff_caps_at_max() {
        let policy = RetryPolicy::new(3, 100, 500, 2.0);
        assert_eq!(policy.calculate_backoff(4), 500);
    }

    #[test]
    fn backoff_never_exceeds_max_for_any_attempt() {
        let policy = RetryPolicy::default();
        for attempt in 1..20 {
            assert!(policy.calculate_backoff(attempt) <= policy.max_backoff_ms);
        }
    }

    #[test]
    fn retryable_errors_are_eligible() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&Error::ConnectionReset));
        assert!(!policy.is_retryable(&Error::InvalidRequest("x".into())));
    }
}
