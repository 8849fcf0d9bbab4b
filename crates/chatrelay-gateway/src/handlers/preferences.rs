//! GET/PUT /api/user/preferences for the requesting user.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use chatrelay_core::UserRecord;
use serde::Deserialize;

use super::requesting_user;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesBody {
    #[serde(default)]
    pub system_instruction: Option<String>,
}

pub async fn get_preferences(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserRecord>, ApiError> {
    let user_id = requesting_user(&headers, &state.config);
    state
        .users
        .find(&user_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Usuário não encontrado."))
}

/// An empty instruction clears the override.
pub async fn update_preferences(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<PreferencesBody>, JsonRejection>,
) -> Result<Json<UserRecord>, ApiError> {
    let Json(body) = body?;
    let instruction = body
        .system_instruction
        .ok_or_else(|| ApiError::bad_request("systemInstruction é obrigatório."))?;
    let user_id = requesting_user(&headers, &state.config);
    state
        .users
        .update_instruction(&user_id, &instruction)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Usuário não encontrado."))
}
