use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("API key is not configured")]
    MissingApiKey,
    #[error("failed to marshal request payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    /// Any non-200 answer; `body` is the raw response text.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("failed to unmarshal response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("no content found in the response")]
    EmptyResponse,
}

/// Trait implemented by text-generation backends (e.g., the Gemini API).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
    fn name(&self) -> &'static str;
}

/// Single-turn request body: `{"contents":[{"parts":[{"text": ...}]}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self { contents: vec![Content { parts: vec![Part { text: prompt.into() }] }] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    pub fn first_text(self) -> Result<String, GenerationError> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or(GenerationError::EmptyResponse)
    }
}

/// Parse a raw 200 response body into the generated text.
pub fn parse_response_body(body: &[u8]) -> Result<String, GenerationError> {
    let parsed: GenerateContentResponse =
        serde_json::from_slice(body).map_err(GenerationError::Decode)?;
    parsed.first_text()
}
