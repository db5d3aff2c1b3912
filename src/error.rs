use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// The closed set of errors this client can surface.
///
/// Variants are grouped the way `§6`/`§7` group them: transport, timeout,
/// protocol, backpressure, service, operation-specific, and parser-specific.
#[derive(Debug, Error)]
pub enum Error {
    // -- transport --
    #[error("connection failed")]
    ConnectionFailed,
    #[error("connection reset by peer")]
    ConnectionReset,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("network error: {0}")]
    NetworkError(String),

    // -- timeout --
    #[error("operation timed out")]
    Timeout,
    #[error("read timed out")]
    ReadTimeout,
    #[error("write timed out")]
    WriteTimeout,

    // -- protocol --
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("protocol error: {0}")]
    ProtocolError(String),

    // -- backpressure --
    #[error("pipeline full")]
    PipelineFull,
    #[error("buffer overflow")]
    BufferOverflow,

    // -- service --
    #[error("server error: {0}")]
    ServerError(String),
    #[error("service unavailable (circuit breaker open)")]
    ServiceUnavailable,
    #[error("not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,

    // -- operation-specific --
    #[error("operation failed: {0}")]
    OperationFailed(String),
    #[error("document not found")]
    DocumentNotFound,
    #[error("update failed: {0}")]
    UpdateFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("aggregate failed: {0}")]
    AggregateFailed(String),
    #[error("scan failed: {0}")]
    ScanFailed(String),
    #[error("no operation specified on query builder")]
    NoOperation,
    #[error("no space specified on query builder")]
    NoSpaceSpecified,

    // -- text query parser --
    #[error("unexpected token at line {line}, column {column}")]
    UnexpectedToken { line: usize, column: usize },
    #[error("expected identifier at line {line}, column {column}")]
    ExpectedIdentifier { line: usize, column: usize },
    #[error("expected operator at line {line}, column {column}")]
    ExpectedOperator { line: usize, column: usize },
    #[error("expected value at line {line}, column {column}")]
    ExpectedValue { line: usize, column: usize },
    #[error("expected '(' at line {line}, column {column}")]
    ExpectedLParen { line: usize, column: usize },
    #[error("expected ')' at line {line}, column {column}")]
    ExpectedRParen { line: usize, column: usize },
    #[error("expected ',' at line {line}, column {column}")]
    ExpectedComma { line: usize, column: usize },
    #[error("expected ':' at line {line}, column {column}")]
    ExpectedColon { line: usize, column: usize },
    #[error("invalid number at line {line}, column {column}")]
    InvalidNumber { line: usize, column: usize },
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
    /// Unreachable under Rust's allocator (allocation failure aborts rather
    /// than returning an error); kept only for fidelity with the closed error
    /// set and never constructed.
    #[error("out of memory")]
    OutOfMemory,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the resilient wrapper should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed
                | Error::ConnectionReset
                | Error::ConnectionRefused
                | Error::NetworkError(_)
                | Error::Timeout
                | Error::ReadTimeout
                | Error::WriteTimeout
                | Error::PipelineFull
                | Error::BufferOverflow
                | Error::ServerError(_)
                | Error::ServiceUnavailable
        )
    }

    /// Whether this error indicates the connection itself was lost and a
    /// reconnect should be attempted before the next retry.
    pub fn is_connectivity_loss(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed
                | Error::ConnectionReset
                | Error::ConnectionRefused
                | Error::NetworkError(_)
        )
    }

    /// Whether this error is one of the three timeout variants.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout | Error::ReadTimeout | Error::WriteTimeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_set_matches_spec() {
        assert!(Error::ConnectionFailed.is_retryable());
        assert!(Error::ConnectionReset.is_retryable());
        assert!(Error::ConnectionRefused.is_retryable());
        assert!(Error::NetworkError("x".into()).is_retryable());
        assert!(Error::Timeout.is_retryable());
        assert!(Error::ReadTimeout.is_retryable());
        assert!(Error::WriteTimeout.is_retryable());
        assert!(Error::PipelineFull.is_retryable());
        assert!(Error::BufferOverflow.is_retryable());
        assert!(Error::ServerError("x".into()).is_retryable());
        assert!(Error::ServiceUnavailable.is_retryable());
    }

    #[test]
    fn permanent_set_matches_spec() {
        assert!(!Error::InvalidResponse("x".into()).is_retryable());
        assert!(!Error::InvalidRequest("x".into()).is_retryable());
        assert!(!Error::ProtocolError("x".into()).is_retryable());
        assert!(!Error::NotFound.is_retryable());
        assert!(!Error::PermissionDenied.is_retryable());
    }

    #[test]
    fn connectivity_loss_triggers_reconnect() {
        assert!(Error::ConnectionFailed.is_connectivity_loss());
        assert!(Error::ConnectionReset.is_connectivity_loss());
        assert!(Error::ConnectionRefused.is_connectivity_loss());
        assert!(Error::NetworkError("x".into()).is_connectivity_loss());
        assert!(!Error::Timeout.is_connectivity_loss());
    }
}
