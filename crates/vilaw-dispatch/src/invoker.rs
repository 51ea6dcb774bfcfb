use async_trait::async_trait;
use vilaw_core::VilawResult;

use crate::pool::Credential;

/// One successful inference result.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The generated text payload.
    pub text: String,
    /// Backend-reported total token usage for the call. Zero when the
    /// backend omitted usage metadata; the call is still a success.
    pub total_tokens: u64,
}

/// Performs one inference call using a specific credential.
///
/// This is the transport collaborator boundary: the dispatcher depends only
/// on this result/error shape and never assumes a call is idempotent. A
/// retried call after a transport error may already have been billed
/// upstream.
#[async_trait]
pub trait BackendInvoker: Send + Sync {
    /// Invoke the backend once with `credential` and return the completion,
    /// or a [`vilaw_core::VilawError::Backend`] describing the failure.
    async fn invoke(&self, credential: &Credential, prompt: &str) -> VilawResult<Completion>;
}
