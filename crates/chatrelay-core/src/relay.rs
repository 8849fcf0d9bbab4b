//! Chat relay: resolve the instruction, call the model with the normalized history, then
//! persist the user turn and the model turn.

use std::sync::Arc;

use crate::history::{title_from_prompt, HistoryStore};
use crate::instruction::InstructionResolver;
use crate::llm::{ChatModel, LlmError};
use crate::storage::StoreError;
use crate::turns::{prepare_contents, Turn};

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: Option<String>,
    pub chat_id: Option<String>,
    /// Prior turns supplied by the client; ignored when `chat_id` names a stored conversation.
    pub history: Vec<Turn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub response: String,
    pub chat_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("message is empty")]
    EmptyMessage,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Model(#[from] LlmError),
}

pub struct ChatRelay {
    history: Arc<HistoryStore>,
    resolver: Arc<InstructionResolver>,
    model: Arc<dyn ChatModel>,
}

impl ChatRelay {
    pub fn new(
        history: Arc<HistoryStore>,
        resolver: Arc<InstructionResolver>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            history,
            resolver,
            model,
        }
    }

    pub async fn send(&self, request: ChatRequest) -> Result<ChatOutcome, RelayError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(RelayError::EmptyMessage);
        }

        let existing = match request.chat_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => self.history.get(id)?,
            None => None,
        };
        let user_id = request
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());

        let prior = match &existing {
            Some(conversation) => conversation.messages.clone(),
            None => request.history.clone(),
        };
        let instruction = self.resolver.resolve(user_id).await;
        let contents = prepare_contents(prior, message);

        let reply = self.model.generate(&instruction, &contents).await?;
        let new_turns = [Turn::user(message), Turn::model(reply.clone())];

        let chat_id = match existing {
            Some(conversation) => {
                self.history.append_turns(&conversation.id, &new_turns)?;
                conversation.id
            }
            None => {
                let sanitized = contents[..contents.len() - 1].to_vec();
                let created =
                    self.history
                        .create(user_id, Some(&title_from_prompt(message)), sanitized)?;
                self.history.append_turns(&created.id, &new_turns)?;
                created.id
            }
        };

        tracing::info!(
            chat_id = %chat_id,
            model = self.model.name(),
            turns_sent = contents.len(),
            "chat relayed"
        );
        Ok(ChatOutcome {
            response: reply,
            chat_id,
        })
    }
}
