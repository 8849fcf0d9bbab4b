//! Conversation CRUD under /api/chat/history and its /historicos alias.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chatrelay_core::{Conversation, Turn};
use serde::Deserialize;
use serde_json::{json, Value};

use super::requesting_user;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversation {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "historico", alias = "history")]
    pub messages: Vec<Turn>,
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
    #[serde(default)]
    pub title: Option<String>,
}

/// Conversations of `?userId=`, else of the requesting user.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let owner = query
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| requesting_user(&headers, &state.config));
    Ok(Json(state.history.list_by_owner(owner.trim())?))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewConversation>, JsonRejection>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let Json(body) = body?;
    let owner = body
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| requesting_user(&headers, &state.config));
    let title = body.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let created = state.history.create(Some(&owner), title, body.messages)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    state
        .history
        .get(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Conversa não encontrada."))
}

pub async fn rename(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<RenameBody>, JsonRejection>,
) -> Result<Json<Conversation>, ApiError> {
    let Json(body) = body?;
    let title = body
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("O título é obrigatório."))?;
    Ok(Json(state.history.rename_title(&id, &title)?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.history.delete(&id)? {
        return Err(ApiError::not_found("Conversa não encontrada."));
    }
    tracing::info!(chat_id = %id, "conversation deleted");
    Ok(Json(json!({ "message": "Conversa excluída com sucesso." })))
}
