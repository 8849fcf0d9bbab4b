//! Client-visible error taxonomy. Every failure leaves as `{"error": "<message>"}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatrelay_core::{LlmError, RelayError, StoreError};

pub const INTERNAL_ERROR_MESSAGE: &str = "Erro interno do servidor.";
pub const MODEL_ERROR_MESSAGE: &str = "Erro ao processar a mensagem.";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    fn internal(context: &str, err: impl std::fmt::Display, client_msg: &str) -> Self {
        tracing::error!(error = %err, "{}", context);
        ApiError::Internal(client_msg.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidId(id) => ApiError::BadRequest(format!("ID inválido: {}", id)),
            StoreError::NotFound(_) => ApiError::NotFound("Conversa não encontrada.".to_string()),
            other => ApiError::internal("storage failure", other, INTERNAL_ERROR_MESSAGE),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::EmptyMessage => ApiError::bad_request("A mensagem é obrigatória."),
            RelayError::Store(e) => e.into(),
            RelayError::Model(e @ LlmError::MissingApiKey(_)) => {
                ApiError::internal("model not configured", e, MODEL_ERROR_MESSAGE)
            }
            RelayError::Model(e) => ApiError::internal("model call failed", e, MODEL_ERROR_MESSAGE),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Corpo da requisição inválido: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_client_statuses() {
        let bad: ApiError = StoreError::InvalidId("xyz".into()).into();
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);

        let missing: ApiError = StoreError::NotFound("abc".into()).into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let io: ApiError = StoreError::Io(std::io::Error::other("disk")).into();
        match io {
            ApiError::Internal(msg) => assert_eq!(msg, INTERNAL_ERROR_MESSAGE),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn relay_errors_hide_model_details() {
        let err: ApiError = RelayError::Model(LlmError::Api(500, "quota secret".into())).into();
        match err {
            ApiError::Internal(msg) => assert!(!msg.contains("quota")),
            other => panic!("unexpected {:?}", other),
        }
        let empty: ApiError = RelayError::EmptyMessage.into();
        assert_eq!(empty.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
