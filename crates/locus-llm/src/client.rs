//! Model client contract

use crate::types::{ModelRequest, ModelResponse, ModelSettings};
use std::sync::Arc;

/// Result type for model operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<LlmError> for locus_core::Error {
    fn from(e: LlmError) -> Self {
        locus_core::Error::Model(e.to_string())
    }
}

/// A constructed model client bound to one model id and region.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    fn model_id(&self) -> &str;
    fn region(&self) -> &str;

    async fn invoke(&self, request: ModelRequest) -> LlmResult<ModelResponse>;
}

/// Builds model clients. Called once per agent build.
pub trait ModelClientFactory: Send + Sync {
    fn create(&self, settings: &ModelSettings) -> LlmResult<Arc<dyn ModelClient>>;
}
