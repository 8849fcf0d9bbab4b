//! Admin endpoints. Routed behind `crate::admin::require_admin`.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chatrelay_core::{build_dashboard, AccessLogEntry, Dashboard};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

const RECENT_CONVERSATIONS: usize = 5;
const RECENT_ACCESSES: usize = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionView {
    pub instruction: String,
    /// True when no global override is set.
    pub is_default: bool,
}

#[derive(Debug, Serialize)]
pub struct InstructionChange {
    pub message: &'static str,
    #[serde(flatten)]
    pub current: InstructionView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionBody {
    #[serde(default, alias = "instruction")]
    pub new_instruction: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentConversation {
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_conversas: usize,
    pub total_acessos: usize,
    pub ultimas_conversas: Vec<RecentConversation>,
    pub ultimos_acessos: Vec<AccessLogEntry>,
}

async fn current_instruction(state: &AppState) -> InstructionView {
    match state
        .global_instruction
        .get()
        .await
        .filter(|s| !s.trim().is_empty())
    {
        Some(s) => InstructionView {
            instruction: s,
            is_default: false,
        },
        None => InstructionView {
            instruction: state.resolver.default_instruction().to_string(),
            is_default: true,
        },
    }
}

pub async fn get_instruction(State(state): State<AppState>) -> Json<InstructionView> {
    Json(current_instruction(&state).await)
}

pub async fn set_instruction(
    State(state): State<AppState>,
    body: Result<Json<InstructionBody>, JsonRejection>,
) -> Result<Json<InstructionChange>, ApiError> {
    let Json(body) = body?;
    let instruction = body
        .new_instruction
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("A nova instrução é obrigatória."))?;
    state.global_instruction.set(&instruction).await?;
    Ok(Json(InstructionChange {
        message: "Instrução do sistema atualizada com sucesso.",
        current: current_instruction(&state).await,
    }))
}

pub async fn clear_instruction(
    State(state): State<AppState>,
) -> Result<Json<InstructionChange>, ApiError> {
    state.global_instruction.clear().await?;
    Ok(Json(InstructionChange {
        message: "Instrução do sistema restaurada para o padrão.",
        current: current_instruction(&state).await,
    }))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Stats>, ApiError> {
    let recent = state
        .history
        .recent(RECENT_CONVERSATIONS)?
        .into_iter()
        .map(|c| RecentConversation {
            title: c.title,
            created_at: c.created_at,
        })
        .collect();
    Ok(Json(Stats {
        total_conversas: state.history.count(),
        total_acessos: state.access_log.count(),
        ultimas_conversas: recent,
        ultimos_acessos: state.access_log.recent(RECENT_ACCESSES)?,
    }))
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<Dashboard>, ApiError> {
    let conversations = state.history.all()?;
    Ok(Json(build_dashboard(&conversations)))
}
