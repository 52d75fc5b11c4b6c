//! Persistence collaborator

use async_trait::async_trait;
use serde_json::Value;

/// Receives the nested payload of a valid submission
///
/// The engine awaits completion and treats the result only as
/// success/failure; retries and error display belong to the caller.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Persistence failure, returned unchanged to the submitter
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist `payload`
    async fn submit(&self, payload: Value) -> Result<(), Self::Error>;
}
