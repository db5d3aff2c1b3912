use std::thread;
use std::time::{Duration, Instant};

use crate::auth::AuthResult;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::{Operation, Packet, Status};
use crate::resilience::{Metrics, RetryPolicy, SharedCircuitBreaker, TimeoutConfig};
use crate::transport::Transport;

/// The resilient client: a `Transport` wrapped with retry, backoff, and
/// circuit-breaker policy. `Send` but intentionally not `Sync`, matching the
/// teacher's `Conn` posture of a plain owned struct passed by `&mut self`
/// (§5): a connection is serialized by its single owning thread.
pub struct ShinyDbClient {
    transport: Transport,
    host: String,
    port: u16,
    tcp_nodelay: bool,
    retry_policy: RetryPolicy,
    timeout_config: TimeoutConfig,
    breaker: SharedCircuitBreaker,
    metrics: Metrics,
}

impl ShinyDbClient {
    pub fn new(opts: Opts) -> Self {
        Self {
            transport: Transport::new(),
            host: opts.host,
            port: opts.port,
            tcp_nodelay: opts.tcp_nodelay,
            retry_policy: opts.retry_policy,
            timeout_config: opts.timeout_config,
            breaker: SharedCircuitBreaker::new(
                opts.circuit_breaker.failure_threshold,
                opts.circuit_breaker.success_threshold,
                opts.circuit_breaker.timeout_ms,
            ),
            metrics: Metrics::new(),
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        self.transport.connect(&self.host, self.port, self.tcp_nodelay, &self.timeout_config)
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Outstanding requests sent but not yet received (invariant 9).
    pub fn pending_len(&self) -> usize {
        self.transport.pending_len()
    }

    /// Tears down any existing socket, clears `pending`, resets `packet_id`
    /// and `correlation_counter`, and performs a fresh connect to the last
    /// known `(host, port)`.
    pub fn reconnect(&mut self) -> Result<()> {
        self.transport.disconnect();
        self.connect()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.retry_policy = policy;
    }

    pub fn timeout_config(&self) -> &TimeoutConfig {
        &self.timeout_config
    }

    pub fn set_timeout_config(&mut self, config: TimeoutConfig) {
        self.timeout_config = config;
    }

    pub fn circuit_breaker(&self) -> &SharedCircuitBreaker {
        &self.breaker
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn send_async(&mut self, operation: Operation) -> Result<u64> {
        let deadline = self.timeout_config.operation_timeout().map(|d| Instant::now() + d);
        self.transport.send_async(operation, deadline, self.timeout_config.write_timeout())
    }

    pub fn receive_async(&mut self) -> Result<Packet> {
        let deadline = self.timeout_config.operation_timeout().map(|d| Instant::now() + d);
        self.transport.receive_async(deadline, self.timeout_config.read_timeout())
    }

    pub fn do_operation(&mut self, operation: Operation) -> Result<Packet> {
        self.with_retry(move |client| {
            let timeouts = client.timeout_config;
            client.transport.do_operation(operation.clone(), &timeouts)
        })
    }

    /// After a timeout, `pending` may be misaligned with the socket's actual
    /// read position (§5). Callers are expected to call this before issuing
    /// further operations: it clears `pending`, records a breaker failure,
    /// and optionally reconnects.
    pub fn handle_timeout_cleanup(&mut self, reconnect: bool) -> Result<()> {
        self.transport.disconnect();
        self.breaker.record_failure();
        self.metrics.record_failure();
        if reconnect {
            self.connect()
        } else {
            Ok(())
        }
    }

    /// Runs `op_fn` under the circuit breaker and retry policy per §4.6.
    fn with_retry<T>(&mut self, mut op_fn: impl FnMut(&mut Self) -> Result<T>) -> Result<T> {
        if !self.breaker.should_allow() {
            self.metrics.record_breaker_rejection();
            tracing::warn!(target: "shinydb_client::client", "circuit breaker open, rejecting operation");
            return Err(Error::ServiceUnavailable);
        }

        let mut last_err: Option<Error> = None;
        for attempt in 0..self.retry_policy.max_attempts {
            self.metrics.record_attempt();
            match op_fn(self) {
                Ok(value) => {
                    self.breaker.record_success();
                    self.metrics.record_success();
                    return Ok(value);
                }
                Err(err) => {
                    self.breaker.record_failure();
                    self.metrics.record_failure();
                    tracing::debug!(
                        target: "shinydb_client::client",
                        attempt,
                        error = %err,
                        "operation attempt failed"
                    );

                    let is_last = attempt + 1 == self.retry_policy.max_attempts;
                    if !err.is_retryable() || is_last {
                        if is_last && err.is_retryable() {
                            tracing::warn!(target: "shinydb_client::client", error = %err, "retries exhausted");
                        }
                        return Err(err);
                    }

                    self.metrics.record_retry();
                    thread::sleep(Duration::from_millis(self.retry_policy.calculate_backoff(attempt + 1)));

                    if err.is_connectivity_loss()
                        && let Err(reconnect_err) = self.reconnect()
                    {
                        last_err = Some(reconnect_err);
                        continue;
                    }

                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or(Error::Timeout))
    }

    /// Durability barrier: sends a `Flush` operation and waits for its reply.
    pub fn flush(&mut self) -> Result<()> {
        let packet = self.do_operation(Operation::Flush)?;
        expect_ok(packet, Error::OperationFailed)
    }

    /// Health probe; uses `Flush` since the wire protocol has no dedicated
    /// ping operation.
    pub fn ping(&mut self) -> Result<()> {
        self.flush()
    }

    pub fn authenticate(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<AuthResult> {
        let packet = self.do_operation(Operation::Authenticate {
            username: username.into(),
            password: password.into(),
        })?;
        let payload = expect_ok_payload(packet, Error::OperationFailed)?;
        AuthResult::parse(&payload)
    }

    pub fn authenticate_api_key(&mut self, api_key: impl Into<String>) -> Result<AuthResult> {
        let packet = self.do_operation(Operation::AuthenticateApiKey { api_key: api_key.into() })?;
        let payload = expect_ok_payload(packet, Error::OperationFailed)?;
        AuthResult::parse(&payload)
    }

    pub fn logout(&mut self) -> Result<()> {
        let packet = self.do_operation(Operation::Logout)?;
        expect_ok(packet, Error::OperationFailed)
    }

    pub fn create(&mut self, doc_type: impl Into<String>, name: impl Into<String>) -> Result<()> {
        let packet = self.do_operation(Operation::Create { doc_type: doc_type.into(), name: name.into() })?;
        expect_ok(packet, Error::OperationFailed)
    }

    pub fn drop(&mut self, doc_type: impl Into<String>, name: impl Into<String>) -> Result<()> {
        let packet = self.do_operation(Operation::Drop { doc_type: doc_type.into(), name: name.into() })?;
        expect_ok(packet, Error::OperationFailed)
    }

    pub fn list(&mut self, doc_type: impl Into<String>, namespace: Option<String>) -> Result<Vec<u8>> {
        let packet = self.do_operation(Operation::List { doc_type: doc_type.into(), namespace })?;
        expect_ok_payload(packet, Error::OperationFailed)
    }

    /// Executes a `QueryIr` built outside the fluent builder — typically the
    /// output of `query::parse` — through the same dispatch precedence and
    /// reply handling as a fluently-built query (§4.8).
    pub fn execute_ir(&mut self, ir: &crate::ir::QueryIr) -> Result<crate::query::QueryResponse> {
        crate::query::ShinyDbQuery::from_ir(self, ir.clone()).run()
    }
}

/// Inspects a `Reply` packet, returning `()` on `Status::Ok` or a
/// component-specific error built from the payload's UTF-8 text otherwise.
pub(crate) fn expect_ok(packet: Packet, err: impl Fn(String) -> Error) -> Result<()> {
    reply_status(packet, err).map(|_| ())
}

/// Same as `expect_ok` but requires (and returns) the payload bytes.
pub(crate) fn expect_ok_payload(packet: Packet, err: impl Fn(String) -> Error) -> Result<Vec<u8>> {
    let payload = reply_status(packet, err)?;
    payload.ok_or_else(|| Error::InvalidResponse("reply carried no payload".into()))
}

fn reply_status(packet: Packet, err: impl Fn(String) -> Error) -> Result<Option<Vec<u8>>> {
    match packet.operation {
        Operation::Reply { status: Status::Ok, payload } => Ok(payload),
        Operation::Reply { status: Status::Error, payload } => {
            let message = payload.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()).unwrap_or_default();
            Err(err(message))
        }
        _ => Err(Error::InvalidResponse("expected a reply packet".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_client_is_not_connected() {
        let client = ShinyDbClient::new(Opts::default());
        assert!(!client.is_connected());
    }

    #[test]
    fn send_without_connection_is_not_retried_forever() {
        let mut client = ShinyDbClient::new(Opts { retry_policy: RetryPolicy::new(2, 0, 0, 1.0), ..Opts::default() });
        let err = client.do_operation(Operation::Flush).unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed));
    }

    #[test]
    fn breaker_trips_after_repeated_connectivity_failures() {
        let mut client = ShinyDbClient::new(Opts {
            retry_policy: RetryPolicy::new(1, 0, 0, 1.0),
            circuit_breaker: crate::opts::CircuitBreakerConfig {
                failure_threshold: 2,
                success_threshold: 1,
                timeout_ms: 60_000,
            },
            ..Opts::default()
        });
        let _ = client.do_operation(Operation::Flush);
        let _ = client.do_operation(Operation::Flush);
        let err = client.do_operation(Operation::Flush).unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable));
    }

    #[test]
    fn reply_ok_with_payload_is_returned() {
        let packet = Packet {
            packet_id: 1,
            session_id: 1,
            correlation_id: 1,
            timestamp: 0,
            operation: Operation::Reply { status: Status::Ok, payload: Some(b"hi".to_vec()) },
        };
        let payload = expect_ok_payload(packet, Error::OperationFailed).expect("ok");
        assert_eq!(payload, b"hi");
    }

    #[test]
    fn execute_ir_runs_a_parser_produced_query_through_the_usual_dispatch() {
        let mut client = ShinyDbClient::new(Opts::default());
        let ir = crate::query::parse("shop.orders.filter(status = \"open\")").expect("parse");
        let err = client.execute_ir(&ir).unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed));
    }

    #[test]
    fn reply_error_maps_to_component_specific_error() {
        let packet = Packet {
            packet_id: 1,
            session_id: 1,
            correlation_id: 1,
            timestamp: 0,
            operation: Operation::Reply { status: Status::Error, payload: Some(b"nope".to_vec()) },
        };
        let err = expect_ok(packet, Error::DeleteFailed).unwrap_err();
        assert!(matches!(err, Error::DeleteFailed(message) if message == "nope"));
    }
}
