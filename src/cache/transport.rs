use async_trait::async_trait;
use serde_json::Value;

use super::error::TransportError;
use super::keys::QueryRequest;

/// One request/response exchange with the content API.
///
/// Implementations do no caching of their own. Whatever they return, success
/// or failure, is taken as ground truth by the optimizer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &QueryRequest) -> Result<Value, TransportError>;

    /// Checked once before a coalesced batch is dispatched. An error here
    /// rejects every item of the batch with the same failure.
    fn ensure_ready(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
