//! OpenAI-compatible `/chat/completions` client (OpenAI, OpenRouter, local servers).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{http_client, ChatModel, LlmError, ModelSettings};
use crate::turns::{Role, Turn};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(settings: &ModelSettings) -> Self {
        Self {
            api_key: settings.api_key.trim().to_string(),
            model: settings.model.clone(),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_API_BASE.to_string()),
            client: http_client(settings.timeout),
        }
    }

    fn body<'a>(&'a self, instruction: &'a str, contents: &'a [Turn]) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(contents.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: instruction,
        });
        messages.extend(contents.iter().map(|t| ChatMessage {
            role: match t.role {
                Role::User => "user",
                Role::Model => "assistant",
            },
            content: &t.text,
        }));
        ChatCompletionRequest {
            model: &self.model,
            messages,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, instruction: &str, contents: &[Turn]) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey("openai"));
        }
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(instruction, contents))
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api(status.as_u16(), text));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)?;
        parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Provider;
    use std::time::Duration;

    #[test]
    fn system_message_first_and_model_maps_to_assistant() {
        let client = OpenAiClient::new(&ModelSettings {
            provider: Provider::OpenAi,
            api_key: "k".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            timeout: Duration::from_secs(5),
        });
        let contents = vec![Turn::user("oi"), Turn::model("olá"), Turn::user("e aí?")];
        let json = serde_json::to_value(client.body("Seja breve.", &contents)).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "Seja breve.");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert_eq!(json["messages"].as_array().unwrap().len(), 4);
    }
}
