use std::sync::Mutex;

/// Counters for cross-thread observability.
///
/// §5 requires any implementation exposing metrics to external observers to
/// serialize accesses to its counters; this struct is that serialization
/// point, mirroring the teacher's use of an explicit mutex around shared
/// counters rather than individual atomics. Reporting these counters to an
/// external system is out of scope (§1) — the struct only accumulates them.
#[derive(Debug, Default)]
pub struct Metrics {
    inner: Mutex<Counters>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Counters {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub retries: u64,
    pub breaker_rejections: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::unwrap_used)]
    pub fn record_attempt(&self) {
        self.inner.lock().unwrap().attempts += 1;
    }

    #[allow(clippy::unwrap_used)]
    pub fn record_success(&self) {
        self.inner.lock().unwrap().successes += 1;
    }

    #[allow(clippy::unwrap_used)]
    pub fn record_failure(&self) {
        self.inner.lock().unwrap().failures += 1;
    }

    #[allow(clippy::unwrap_used)]
    pub fn record_retry(&self) {
        self.inner.lock().unwrap().retries += 1;
    }

    #[allow(clippy::unwrap_used)]
    pub fn record_breaker_rejection(&self) {
        self.inner.lock().unwrap().breaker_rejections += 1;
    }

    #[allow(clippy::unwrap_used)]
    pub fn snapshot(&self) -> Counters {
        *self.inner.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_attempt();
        metrics.record_attempt();
        metrics.record_success();
        metrics.record_retry();
        let snap = metrics.snapshot();
        assert_eq!(snap.attempts, 2);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.failures, 0);
    }
}
