use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

use crate::config::GenerationConfig;
use crate::services::generation::{
    parse_response_body, GenerateContentRequest, GenerationError, TextGenerator,
};

/// Client for the generative-language `generateContent` endpoint.
///
/// The API key travels as the `key` query parameter. Requests are not retried.
#[derive(Clone)]
pub struct GeminiClient {
    endpoint: String,
    api_key: String,
    http: Client,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GenerationError::MissingApiKey);
        }
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let http = builder.build().map_err(GenerationError::Request)?;
        Ok(Self { endpoint: endpoint.into(), api_key, http })
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let key = config.api_key.clone().ok_or(GenerationError::MissingApiKey)?;
        Self::new(&config.endpoint, key, config.timeout_secs.map(Duration::from_secs))
    }

}

/// The request URL carries the API key, so it is dropped from the error.
fn request_error(e: reqwest::Error) -> GenerationError {
    GenerationError::Request(e.without_url())
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let payload = serde_json::to_vec(&GenerateContentRequest::from_prompt(prompt))
            .map_err(GenerationError::Encode)?;

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(request_error)?;
        if status != StatusCode::OK {
            tracing::warn!(%status, "generation API returned an error");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let text = parse_response_body(&body)?;
        tracing::debug!(chars = text.len(), "generation completed");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
