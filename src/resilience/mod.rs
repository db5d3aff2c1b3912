mod breaker;
mod metrics;
mod retry;
mod timeout;

pub use breaker::{BreakerState, CircuitBreaker, SharedCircuitBreaker};
pub use metrics::{Counters, Metrics};
pub use retry::RetryPolicy;
pub use timeout::TimeoutConfig;
