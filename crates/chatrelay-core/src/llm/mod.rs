//! Model bridge: the `ChatModel` seam plus Gemini and OpenAI-compatible clients.

mod gemini;
mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::turns::Turn;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model request: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model response parse: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model API {0}: {1}")]
    Api(u16, String),
    #[error("model returned no text")]
    Empty,
    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),
}

/// A generative model that answers a conversation under a system instruction.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    /// `contents` alternates roles and ends with the user turn to answer.
    async fn generate(&self, instruction: &str, contents: &[Turn]) -> Result<String, LlmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAi,
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" | "open-ai" | "openai-compatible" => Ok(Provider::OpenAi),
            other => Err(format!("unknown LLM provider: {}", other)),
        }
    }
}

/// Provider selection and credentials, filled from the gateway config.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    /// Override of the provider's API base URL.
    pub base_url: Option<String>,
    pub timeout: Duration,
}

pub fn build_model(settings: &ModelSettings) -> Arc<dyn ChatModel> {
    match settings.provider {
        Provider::Gemini => Arc::new(GeminiClient::new(settings)),
        Provider::OpenAi => Arc::new(OpenAiClient::new(settings)),
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
