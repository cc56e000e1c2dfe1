use thiserror::Error;

/// Failure talking to the remote key/value tier.
///
/// Never surfaced to cache callers: the store logs it and degrades to the
/// in-process tier.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote tier connection failed: {0}")]
    Connection(String),
    #[error("remote tier `{op}` timed out after {timeout_ms}ms")]
    Timeout { op: &'static str, timeout_ms: u64 },
    #[error("remote tier protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    pub fn connection(err: impl std::fmt::Display) -> Self {
        Self::Connection(err.to_string())
    }

    pub fn protocol(err: impl std::fmt::Display) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<redis::RedisError> for RemoteError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                op: "command",
                timeout_ms: 0,
            }
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            Self::connection(err)
        } else {
            Self::protocol(err)
        }
    }
}

/// Raised by [`CacheStore::init`](super::CacheStore::init) when the remote
/// tier is mandatory but cannot be used.
#[derive(Debug, Error)]
pub enum CacheInitError {
    #[error("remote cache tier is required but not configured")]
    RemoteNotConfigured,
    #[error("remote cache tier is required but unreachable: {0}")]
    RemoteUnreachable(#[source] RemoteError),
}
