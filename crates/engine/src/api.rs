//! REST API client for an HTTP text-generation server.
//!
//! Wraps the `/generate` endpoint using [`reqwest`]. The server receives
//! the rendered prompt as `inputs` with generation `parameters`, and
//! answers with either a single `{"generated_text": ...}` object or a
//! list of them (Hugging Face inference style).

use serde::{Deserialize, Serialize};

/// HTTP client for a single generation server.
pub struct GenerationApi {
    client: reqwest::Client,
    api_url: String,
}

/// Body sent to `POST /generate`.
#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub inputs: &'a str,
    pub parameters: GenerateParameters,
}

/// Length bounds forwarded to the model.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerateParameters {
    pub min_length: u32,
    pub max_length: u32,
    pub truncation: bool,
}

/// One generated completion.
#[derive(Debug, Deserialize)]
pub struct Generation {
    pub generated_text: String,
}

/// The server may answer with one generation or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    Single(Generation),
    Many(Vec<Generation>),
}

impl GenerateResponse {
    /// The first generated text, if any.
    pub fn into_text(self) -> Option<String> {
        match self {
            GenerateResponse::Single(generation) => Some(generation.generated_text),
            GenerateResponse::Many(generations) => generations
                .into_iter()
                .next()
                .map(|generation| generation.generated_text),
        }
    }
}

/// Errors from the generation REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum GenerationApiError {
    /// The HTTP request itself failed (network, DNS, TLS, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("generation API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl GenerationApi {
    /// Create a client for the server at `api_url`, e.g.
    /// `http://host:8080`. A trailing slash is ignored.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Run one generation.
    ///
    /// A non-2xx answer becomes [`GenerationApiError::ApiError`] with the
    /// body text.
    pub async fn generate(
        &self,
        request: &GenerateRequest<'_>,
    ) -> Result<GenerateResponse, GenerationApiError> {
        let response = self
            .client
            .post(format!("{}/generate", self.api_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(GenerationApiError::ApiError {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_object_response() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"generated_text": "The end."}"#).unwrap();
        assert_eq!(parsed.into_text().as_deref(), Some("The end."));
    }

    #[test]
    fn list_response_takes_first() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"[{"generated_text": "a"}, {"generated_text": "b"}]"#).unwrap();
        assert_eq!(parsed.into_text().as_deref(), Some("a"));
    }

    #[test]
    fn empty_list_has_no_text() {
        let parsed: GenerateResponse = serde_json::from_str("[]").unwrap();
        assert_eq!(parsed.into_text(), None);
    }

    #[test]
    fn request_body_shape() {
        let request = GenerateRequest {
            model: "roneneldan/TinyStories-33M",
            inputs: "prompt",
            parameters: GenerateParameters {
                min_length: 5,
                max_length: 200,
                truncation: true,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "roneneldan/TinyStories-33M");
        assert_eq!(value["inputs"], "prompt");
        assert_eq!(value["parameters"]["min_length"], 5);
        assert_eq!(value["parameters"]["max_length"], 200);
        assert_eq!(value["parameters"]["truncation"], true);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = GenerationApi::new("http://localhost:8080/".into());
        assert_eq!(api.api_url(), "http://localhost:8080");
    }
}
