//! Router assembly: public chat/history/telemetry routes, admin routes behind the password
//! guard, CORS and request logging.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderValue, Method, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::admin::require_admin;
use crate::handlers::{self, admin, chat, history, preferences, telemetry};
use crate::state::AppState;

fn cors(frontend: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);
    match frontend
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .and_then(|o| HeaderValue::from_str(o.trim_end_matches('/')).ok())
    {
        Some(origin) => layer.allow_origin(AllowOrigin::exact(origin)),
        None => layer.allow_origin(Any),
    }
}

async fn log_traffic(request: Request<Body>, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    tracing::info!(%method, %path, %peer, status = response.status().as_u16(), "request");
    response
}

pub fn build_app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/system-instruction",
            get(admin::get_instruction)
                .post(admin::set_instruction)
                .delete(admin::clear_instruction),
        )
        .route("/stats", get(admin::stats))
        .route("/dashboard", get(admin::dashboard))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/chat", post(chat::send_message))
        .route("/api/chat", post(chat::send_message))
        .route("/chat/:chat_id", get(chat::get_chat))
        .route("/history/:user_id", get(chat::history_of_user))
        .route("/api/chat/history", get(history::list).post(history::create))
        .route(
            "/api/chat/history/:id",
            get(history::get_one)
                .put(history::rename)
                .delete(history::delete),
        )
        .route("/historicos", get(history::list).post(history::create))
        .route(
            "/historicos/:id",
            get(history::get_one)
                .put(history::rename)
                .delete(history::delete),
        )
        .nest("/api/admin", admin_routes)
        .route(
            "/api/user/preferences",
            get(preferences::get_preferences).put(preferences::update_preferences),
        )
        .route("/api/log-acesso", post(telemetry::log_access))
        .route(
            "/api/ranking/registrar-acesso-bot",
            post(telemetry::register_bot_access),
        )
        .route("/api/ranking", get(telemetry::ranking))
        .with_state(state.clone())
        .layer(middleware::from_fn(log_traffic))
        .layer(cors(state.config.bundle_url_frontend.as_deref()))
}
