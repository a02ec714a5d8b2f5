use std::time::Duration;

use thiserror::Error;

/// Variables could not be turned into a canonical value.
#[derive(Debug, Clone, Error)]
#[error("failed to derive cache key: {message}")]
pub struct KeyError {
    message: String,
}

impl KeyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for KeyError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error.to_string())
    }
}

/// Failure reported by a transport adapter for one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("graphql errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Error surfaced to callers of the optimizer.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("batch could not be dispatched: {0}")]
    BatchDispatch(#[source] TransportError),
    #[error("batched request was abandoned before it settled")]
    Abandoned,
    #[error("result did not match the expected shape: {0}")]
    Decode(String),
}

impl QueryError {
    /// Label used for the `kind` field of failure logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Key(_) => "key",
            QueryError::Transport(_) => "transport",
            QueryError::BatchDispatch(_) => "batch_dispatch",
            QueryError::Abandoned => "abandoned",
            QueryError::Decode(_) => "decode",
        }
    }
}
