//! The generation engine seam.

use async_trait::async_trait;

use crate::api::{GenerateParameters, GenerateRequest, GenerationApi, GenerationApiError};

/// Per-run generation settings, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    /// Model identifier passed through to the server.
    pub model: String,
    pub min_length: u32,
    pub max_length: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Api(#[from] GenerationApiError),

    /// The server answered successfully but produced no text.
    #[error("engine returned no generated text")]
    NoOutput,

    /// Any other engine-specific failure.
    #[error("engine failure: {0}")]
    Other(String),
}

/// Turns a rendered prompt into generated text.
///
/// Calls may take arbitrarily long; callers that need a bound must
/// impose it themselves (dropping the future abandons the call).
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams)
        -> Result<String, EngineError>;
}

/// [`GenerationEngine`] backed by an HTTP inference server.
pub struct HttpGenerationEngine {
    api: GenerationApi,
}

impl HttpGenerationEngine {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api: GenerationApi::new(api_url.into()),
        }
    }

    pub fn api_url(&self) -> &str {
        self.api.api_url()
    }
}

#[async_trait]
impl GenerationEngine for HttpGenerationEngine {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, EngineError> {
        let request = GenerateRequest {
            model: &params.model,
            inputs: prompt,
            parameters: GenerateParameters {
                min_length: params.min_length,
                max_length: params.max_length,
                truncation: true,
            },
        };

        tracing::trace!(model = %params.model, prompt_len = prompt.len(), "Requesting generation");
        let response = self.api.generate(&request).await?;
        response.into_text().ok_or(EngineError::NoOutput)
    }
}
