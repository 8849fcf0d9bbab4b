pub mod admin;
pub mod chat;
pub mod history;
pub mod preferences;
pub mod telemetry;

use axum::http::HeaderMap;

use crate::config::GatewayConfig;

pub const USER_HEADER: &str = "x-user-id";

/// The "logged-in" user: `x-user-id` when present, else the configured default.
pub fn requesting_user(headers: &HeaderMap, config: &GatewayConfig) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| config.default_user_id.clone())
}

pub async fn health() -> &'static str {
    "OK"
}
