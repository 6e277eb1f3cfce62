use std::env;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use travelguide_agents::{resolve_user_id, TravelAgent};
use travelguide_core::{DialogResponse, DialogSettings};
use travelguide_observability::{AppMetrics, MetricsSnapshot};
use travelguide_providers::{ProviderConfig, ProviderSet};
use travelguide_storage::MemorySessionStore;

const MAX_MESSAGE_LEN: usize = 2_000;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: String,
    pub allowed_origins: Vec<String>,
    pub dialog: DialogSettings,
    pub providers: ProviderConfig,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let mut dialog = DialogSettings::default();
        if let Some(origin) = env::var("TRAVELGUIDE_FLIGHT_ORIGIN")
            .ok()
            .map(|value| value.trim().to_uppercase())
            .filter(|value| !value.is_empty())
        {
            dialog.flight_origin = origin;
        }

        Self {
            bind: env::var("TRAVELGUIDE_BIND").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            allowed_origins: parse_allowed_origins(env::var("TRAVELGUIDE_ALLOWED_ORIGINS").ok()),
            dialog,
            providers: ProviderConfig::from_env(),
        }
    }
}

fn parse_allowed_origins(raw: Option<String>) -> Vec<String> {
    let default_origins = [
        "http://localhost:5000",
        "http://127.0.0.1:5000",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    raw.map(|value| {
        value
            .split(',')
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect::<Vec<_>>()
    })
    .filter(|origins| !origins.is_empty())
    .unwrap_or_else(|| {
        default_origins
            .iter()
            .map(|value| value.to_string())
            .collect()
    })
}

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<TravelAgent<MemorySessionStore>>,
    pub metrics: Arc<AppMetrics>,
    pub allowed_origins: Arc<Vec<String>>,
    pub providers: Value,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    success: bool,
    user_id: String,
    response: DialogResponse,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    sessions: usize,
    providers: Value,
    metrics: MetricsSnapshot,
}

/// Builds the router from `TRAVELGUIDE_*` environment variables.
pub fn build_app() -> Result<Router> {
    build_app_with(ApiConfig::from_env())
}

pub fn build_app_with(config: ApiConfig) -> Result<Router> {
    let providers = ProviderSet::from_config(&config.providers)?;
    let metrics = AppMetrics::shared();
    let agent = TravelAgent::new(
        Arc::new(MemorySessionStore::new()),
        providers,
        config.dialog.clone(),
        metrics.clone(),
    );

    tracing::info!(
        flight_origin = %config.dialog.flight_origin,
        providers = %ProviderSet::describe(&config.providers),
        "travelguide agent configured"
    );

    Ok(build_router(ApiState {
        agent: Arc::new(agent),
        metrics,
        allowed_origins: Arc::new(config.allowed_origins),
        providers: ProviderSet::describe(&config.providers),
    }))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .with_state(state)
}

fn error_response(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "success": false,
            "error": error
        })),
    )
        .into_response()
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let sessions = state.agent.session_count().await.unwrap_or_default();
    let payload = HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        sessions,
        providers: state.providers.clone(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn chat(
    State(state): State<ApiState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = request else {
        return error_response(StatusCode::BAD_REQUEST, "No data provided");
    };

    let message = request.message.as_deref().map(str::trim).unwrap_or_default();
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Empty message");
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Message too long");
    }

    let user_id = resolve_user_id(request.user_id.as_deref());
    let response = state.agent.handle_turn(&user_id, message).await;

    (
        StatusCode::OK,
        Json(ChatResponse {
            success: true,
            user_id,
            response,
        }),
    )
        .into_response()
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:5000")]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
