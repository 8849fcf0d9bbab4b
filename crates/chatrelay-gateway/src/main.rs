//! chatrelay gateway: HTTP front of the chat relay, conversation history, admin instruction
//! and access telemetry.

mod admin;
mod config;
mod error;
mod handlers;
mod routes;
mod state;

use std::net::SocketAddr;

use chatrelay_core::build_model;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::GatewayConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::load()?;
    if config.uses_default_admin_password() {
        tracing::warn!("ADMIN_PASSWORD not set; using the built-in default password");
    }
    let model_settings = config.model_settings()?;
    if model_settings.api_key.trim().is_empty() {
        tracing::warn!(provider = ?model_settings.provider, "no model API key configured; chat requests will fail");
    }
    let model = build_model(&model_settings);

    let port = config.port;
    let state = AppState::initialize(config, model).await?;
    let app = routes::build_app(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        version = chatrelay_core::version(),
        provider = ?model_settings.provider,
        model = %model_settings.model,
        "chatrelay gateway listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.flush().await;
    tracing::info!("chatrelay gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use chatrelay_core::{ChatModel, LlmError, Turn};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    /// Echoes the last user turn and records the instruction it was given.
    #[derive(Default)]
    struct StubModel {
        instructions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for StubModel {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, instruction: &str, contents: &[Turn]) -> Result<String, LlmError> {
            self.instructions.lock().unwrap().push(instruction.to_string());
            let last = contents.last().map(|t| t.text.clone()).unwrap_or_default();
            Ok(format!("eco: {}", last))
        }
    }

    struct Harness {
        app: Router,
        model: Arc<StubModel>,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(StubModel::default());
        let state = AppState::initialize(crate::config::test_config(dir.path()), model.clone())
            .await
            .unwrap();
        Harness {
            app: routes::build_app(state),
            model,
            _dir: dir,
        }
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let h = harness().await;
        let (status, body) = call(&h.app, "GET", "/health", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("OK".into()));
    }

    #[tokio::test]
    async fn admin_requires_exact_password() {
        let h = harness().await;
        for headers in [
            vec![],
            vec![("x-admin-password", "wrong")],
            vec![("x-admin-password", "S3CRET")],
        ] {
            let (status, body) =
                call(&h.app, "GET", "/api/admin/system-instruction", &headers, None).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(body["error"], admin::ACCESS_DENIED);
        }

        let (status, body) = call(
            &h.app,
            "GET",
            "/api/admin/system-instruction",
            &[("x-admin-password", "s3cret")],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isDefault"], true);
        assert_eq!(body["instruction"], chatrelay_core::DEFAULT_SYSTEM_INSTRUCTION);
    }

    #[tokio::test]
    async fn every_admin_route_is_guarded() {
        let h = harness().await;
        let routes = [
            ("GET", "/api/admin/stats", None),
            ("GET", "/api/admin/dashboard", None),
            (
                "POST",
                "/api/admin/system-instruction",
                Some(json!({ "newInstruction": "Invasor." })),
            ),
            ("DELETE", "/api/admin/system-instruction", None),
        ];
        for (method, uri, body) in routes {
            for headers in [vec![], vec![("x-admin-password", "s3cret!")]] {
                let (status, reply) = call(&h.app, method, uri, &headers, body.clone()).await;
                assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
                assert_eq!(reply["error"], admin::ACCESS_DENIED);
            }
        }

        let (_, current) = call(
            &h.app,
            "GET",
            "/api/admin/system-instruction",
            &[("x-admin-password", "s3cret")],
            None,
        )
        .await;
        assert_eq!(current["isDefault"], true);
    }

    #[tokio::test]
    async fn instruction_writes_report_a_message() {
        let h = harness().await;
        let admin = [("x-admin-password", "s3cret")];
        let (status, set) = call(
            &h.app,
            "POST",
            "/api/admin/system-instruction",
            &admin,
            Some(json!({ "newInstruction": "Seja breve." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(set["message"].is_string());
        assert_eq!(set["instruction"], "Seja breve.");
        assert_eq!(set["isDefault"], false);

        let (_, got) = call(&h.app, "GET", "/api/admin/system-instruction", &admin, None).await;
        assert_eq!(got["instruction"], "Seja breve.");

        let (status, cleared) =
            call(&h.app, "DELETE", "/api/admin/system-instruction", &admin, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(cleared["message"].is_string());
        assert_eq!(cleared["instruction"], chatrelay_core::DEFAULT_SYSTEM_INSTRUCTION);
    }

    #[tokio::test]
    async fn chat_creates_then_continues_conversation() {
        let h = harness().await;
        let (status, first) = call(
            &h.app,
            "POST",
            "/api/chat",
            &[],
            Some(json!({ "prompt": "Olá", "userId": "user456" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["response"], "eco: Olá");
        let chat_id = first["chatId"].as_str().unwrap().to_string();

        let (status, second) = call(
            &h.app,
            "POST",
            "/chat",
            &[],
            Some(json!({ "mensagem": "Tudo bem?", "chatId": chat_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["chatId"], chat_id.as_str());

        let (status, conv) = call(&h.app, "GET", &format!("/chat/{}", chat_id), &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(conv["userId"], "user456");
        assert_eq!(conv["title"], "Olá...");
        let messages = conv["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3]["role"], "model");
        assert_eq!(messages[3]["parts"][0]["text"], "eco: Tudo bem?");

        let (_, listed) = call(&h.app, "GET", "/history/user456", &[], None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn chat_input_errors_are_400() {
        let h = harness().await;
        let (status, body) =
            call(&h.app, "POST", "/api/chat", &[], Some(json!({ "message": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = call(
            &h.app,
            "POST",
            "/api/chat",
            &[],
            Some(json!({ "message": "oi", "chatId": "not-a-uuid" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&h.app, "GET", "/chat/not-a-uuid", &[], None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_then_get_is_404() {
        let h = harness().await;
        let (status, created) = call(
            &h.app,
            "POST",
            "/api/chat/history",
            &[],
            Some(json!({ "title": "Rascunho", "messages": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["userId"], "user123");
        let id = created["id"].as_str().unwrap().to_string();

        let missing = uuid_like_missing();
        let (status, _) = call(&h.app, "DELETE", &format!("/historicos/{}", missing), &[], None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            call(&h.app, "DELETE", &format!("/api/chat/history/{}", id), &[], None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&h.app, "GET", &format!("/historicos/{}", id), &[], None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    fn uuid_like_missing() -> &'static str {
        "00000000-0000-4000-8000-000000000000"
    }

    #[tokio::test]
    async fn rename_requires_title() {
        let h = harness().await;
        let (_, created) = call(
            &h.app,
            "POST",
            "/historicos",
            &[("x-user-id", "user456")],
            Some(json!({ "messages": [{ "role": "user", "text": "oi" }] })),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["userId"], "user456");

        let (status, _) = call(
            &h.app,
            "PUT",
            &format!("/historicos/{}", id),
            &[],
            Some(json!({ "title": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, renamed) = call(
            &h.app,
            "PUT",
            &format!("/api/chat/history/{}", id),
            &[],
            Some(json!({ "title": " Viagem " })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["title"], "Viagem");

        let (_, listed) =
            call(&h.app, "GET", "/api/chat/history?userId=user456", &[], None).await;
        assert_eq!(listed[0]["title"], "Viagem");
    }

    #[tokio::test]
    async fn instruction_chain_user_over_global_over_default() {
        let h = harness().await;
        let admin = [("x-admin-password", "s3cret")];

        let (status, _) = call(
            &h.app,
            "POST",
            "/api/admin/system-instruction",
            &admin,
            Some(json!({ "newInstruction": "Responda em inglês." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, prefs) = call(
            &h.app,
            "PUT",
            "/api/user/preferences",
            &[("x-user-id", "user456")],
            Some(json!({ "systemInstruction": "Fale como pirata." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(prefs["systemInstruction"], "Fale como pirata.");

        call(&h.app, "POST", "/chat", &[], Some(json!({ "message": "a", "userId": "user456" }))).await;
        call(&h.app, "POST", "/chat", &[], Some(json!({ "message": "b", "userId": "user123" }))).await;
        let (status, _) =
            call(&h.app, "DELETE", "/api/admin/system-instruction", &admin, None).await;
        assert_eq!(status, StatusCode::OK);
        call(&h.app, "POST", "/chat", &[], Some(json!({ "message": "c" }))).await;

        let seen = h.model.instructions.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "Fale como pirata.".to_string(),
                "Responda em inglês.".to_string(),
                chatrelay_core::DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn admin_instruction_rejects_blank() {
        let h = harness().await;
        let (status, _) = call(
            &h.app,
            "POST",
            "/api/admin/system-instruction",
            &[("x-admin-password", "s3cret")],
            Some(json!({ "instruction": " " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_user_preferences_are_404() {
        let h = harness().await;
        let (status, _) =
            call(&h.app, "GET", "/api/user/preferences", &[("x-user-id", "ghost")], None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&h.app, "GET", "/api/user/preferences", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "usuario_teste_1");
    }

    #[tokio::test]
    async fn telemetry_records_and_ranks() {
        let h = harness().await;
        let (status, body) = call(
            &h.app,
            "POST",
            "/api/log-acesso",
            &[("x-forwarded-for", "198.51.100.4")],
            Some(json!({ "acao": "abrir", "nomeBot": "Atendente" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["log"]["ip"], "198.51.100.4");

        let (status, _) =
            call(&h.app, "POST", "/api/log-acesso", &[], Some(json!({ "nomeBot": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        for bot in ["b1", "b2", "b2"] {
            let (status, _) = call(
                &h.app,
                "POST",
                "/api/ranking/registrar-acesso-bot",
                &[],
                Some(json!({ "botId": bot, "nomeBot": format!("Bot {}", bot) })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (_, ranking) = call(&h.app, "GET", "/api/ranking", &[], None).await;
        assert_eq!(ranking[0]["botId"], "b2");
        assert_eq!(ranking[0]["contagem"], 2);
        assert_eq!(ranking[1]["contagem"], 1);

        let (_, stats) = call(
            &h.app,
            "GET",
            "/api/admin/stats",
            &[("x-admin-password", "s3cret")],
            None,
        )
        .await;
        assert_eq!(stats["totalAcessos"], 1);
        assert_eq!(stats["totalConversas"], 0);
        assert_eq!(stats["ultimosAcessos"][0]["botName"], "Atendente");
        assert_eq!(stats["ultimosAcessos"][0]["action"], "abrir");
    }

    #[tokio::test]
    async fn dashboard_reports_engagement() {
        let h = harness().await;
        call(&h.app, "POST", "/chat", &[], Some(json!({ "message": "oi", "userId": "user123" }))).await;
        let (status, body) = call(
            &h.app,
            "GET",
            "/api/admin/dashboard",
            &[("x-admin-password", "s3cret")],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["engagementMetrics"]["totalConversations"], 1);
        assert_eq!(body["topUsers"][0]["userId"], "user123");
    }
}
