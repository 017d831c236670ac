//! Inference backend trait.

use crate::error::Result;
use crate::prompts::GenerationRequest;

use std::future::Future;

/// A text-generation server the bot can talk to.
pub trait InferenceBackend: Send + Sync + 'static {
    /// True iff the server answered its status endpoint with HTTP 200.
    fn health_check(&self) -> impl Future<Output = bool> + Send;

    /// Run one generation and return the first result's text. Never retries.
    fn generate(&self, request: &GenerationRequest) -> impl Future<Output = Result<String>> + Send;

    /// Raw body of the server's model-info endpoint.
    fn model_info(&self) -> impl Future<Output = Result<String>> + Send;
}
