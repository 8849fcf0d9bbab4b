//! Admin guard for `/api/admin/*`: the `x-admin-password` header must equal the configured
//! password byte for byte. An empty configured password rejects every request.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::state::AppState;

pub const ADMIN_HEADER: &str = "x-admin-password";
pub const ACCESS_DENIED: &str = "Acesso negado. Senha de administrador incorreta.";

pub fn is_authorized(headers: &HeaderMap, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    headers
        .get(ADMIN_HEADER)
        .map(|v| v.as_bytes() == expected.as_bytes())
        .unwrap_or(false)
}

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_authorized(request.headers(), &state.config.admin_password) {
        tracing::warn!(path = %request.uri().path(), "admin request rejected");
        return ApiError::Forbidden(ACCESS_DENIED.to_string()).into_response();
    }
    next.run(request).await
}
