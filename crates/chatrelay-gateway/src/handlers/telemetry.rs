//! Access log and bot ranking endpoints.

use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chatrelay_core::{AccessLogEntry, RankingEntry};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

const UNKNOWN_IP: &str = "desconhecido";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogBody {
    #[serde(default)]
    pub ip_usuario: Option<String>,
    #[serde(default)]
    pub acao: Option<String>,
    #[serde(default)]
    pub nome_bot: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotAccessBody {
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub nome_bot: Option<String>,
    #[serde(default)]
    pub timestamp_acesso: Option<DateTime<Utc>>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("O campo {} é obrigatório.", field)))
}

/// Client address: body, then the first `x-forwarded-for` hop, then the peer socket.
fn client_ip(
    explicit: Option<String>,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> String {
    explicit
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|ip| ip.trim().to_string())
                .filter(|ip| !ip.is_empty())
        })
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

pub async fn log_access(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<AccessLogBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(body) = body?;
    let action = required(body.acao, "acao")?;
    let bot_name = required(body.nome_bot, "nomeBot")?;
    let ip = client_ip(body.ip_usuario, &headers, connect_info.map(|ConnectInfo(a)| a));

    let entry = AccessLogEntry::new(&ip, &bot_name, &action, Utc::now());
    state.access_log.record(&entry)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Log de acesso registrado com sucesso.", "log": entry })),
    ))
}

pub async fn register_bot_access(
    State(state): State<AppState>,
    body: Result<Json<BotAccessBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RankingEntry>), ApiError> {
    let Json(body) = body?;
    let bot_id = required(body.bot_id, "botId")?;
    let bot_name = body.nome_bot.map(|n| n.trim().to_string()).unwrap_or_default();
    let at = body.timestamp_acesso.unwrap_or_else(Utc::now);

    let entry = state.ranking.record_access(&bot_id, &bot_name, at);
    tracing::debug!(bot_id = %entry.bot_id, count = entry.count, "bot access counted");
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn ranking(State(state): State<AppState>) -> Json<Vec<RankingEntry>> {
    Json(state.ranking.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer: SocketAddr = "192.0.2.1:5555".parse().unwrap();

        assert_eq!(client_ip(Some("1.2.3.4".into()), &headers, Some(peer)), "1.2.3.4");
        assert_eq!(client_ip(Some("  ".into()), &headers, Some(peer)), "203.0.113.7");
        assert_eq!(client_ip(None, &HeaderMap::new(), Some(peer)), "192.0.2.1");
        assert_eq!(client_ip(None, &HeaderMap::new(), None), UNKNOWN_IP);
    }
}
