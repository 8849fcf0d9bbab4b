//! POST /chat, POST /api/chat, GET /chat/:chatId, GET /history/:userId.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chatrelay_core::{ChatRequest, Conversation, Turn};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default, alias = "prompt", alias = "mensagem")]
    pub message: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default, alias = "historico")]
    pub history: Vec<Turn>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub chat_id: String,
}

pub async fn send_message(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(body) = body?;
    let outcome = state
        .relay
        .send(ChatRequest {
            message: body.message.unwrap_or_default(),
            user_id: body.user_id,
            chat_id: body.chat_id,
            history: body.history,
        })
        .await?;
    Ok(Json(ChatReply {
        response: outcome.response,
        chat_id: outcome.chat_id,
    }))
}

pub async fn get_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    state
        .history
        .get(&chat_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Conversa não encontrada."))
}

pub async fn history_of_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    Ok(Json(state.history.list_by_owner(user_id.trim())?))
}
