//! loom-api library - Lucid Loom backend service
//!
//! Exposes the HTTP/WebSocket API for the dream journal: account and session
//! management, dream CRUD, the asynchronous interpretation pipeline with
//! per-dream status push, AI-assisted rewriting/symbol/pattern endpoints,
//! and per-user analytics.

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod services;
pub mod ws;

pub use error::{ApiError, ApiResult};

use loom_common::config::AppConfig;
use services::ai::AiGateway;
use services::email::OtpMailer;
use services::pipeline::DreamProcessor;
use ws::StatusRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub pool: SqlitePool,
    /// Per-dream status connection registry
    pub registry: Arc<StatusRegistry>,
    /// AI provider gateway (synchronous operations)
    pub gateway: Arc<AiGateway>,
    /// Background dream processor
    pub processor: DreamProcessor,
    /// OTP mail client
    pub mailer: Arc<OtpMailer>,
    /// Plain HTTP client for the image proxy
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Wire up all components from configuration
    pub fn new(pool: SqlitePool, config: &AppConfig) -> Self {
        let registry = Arc::new(StatusRegistry::new());
        let gateway = Arc::new(AiGateway::new(
            config.groq_api_key.clone(),
            config.openai_api_key.clone(),
        ));
        let processor = DreamProcessor::new(pool.clone(), registry.clone(), gateway.clone());
        let mailer = Arc::new(OtpMailer::new(config));

        Self {
            pool,
            registry,
            gateway,
            processor,
            mailer,
            http_client: reqwest::Client::new(),
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post};

    // Protected routes (require a bearer session)
    let protected = Router::new()
        .route("/auth/change-password", post(api::auth::change_password))
        .route("/user/info", get(api::users::user_info))
        .route("/user/stats", get(api::users::user_stats))
        .route("/user/export", get(api::users::export_user_data))
        .route("/user/account", delete(api::users::delete_account))
        .route(
            "/dreams",
            post(api::dreams::create_dream).get(api::dreams::list_dreams),
        )
        .route(
            "/dreams/:dream_id",
            get(api::dreams::get_dream)
                .put(api::dreams::update_dream)
                .delete(api::dreams::delete_dream),
        )
        .route("/dreams/:dream_id/regenerate", post(api::dreams::regenerate_dream))
        .route("/dreams/:dream_id/rewrite", post(api::dreams::rewrite_dream))
        .route("/symbols/:symbol/explain", get(api::symbols::explain_symbol))
        .route("/analytics/summary", get(api::analytics::summary))
        .route("/analytics/patterns", post(api::analytics::patterns))
        .route("/api/images/proxy", get(api::images::proxy_image))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/", get(api::health::root))
        .route("/health", get(api::health::health))
        .route("/auth/register", post(api::auth::register))
        .route("/auth/verify-otp", post(api::auth::verify_otp))
        .route("/auth/login", post(api::auth::login))
        .route("/auth/forgot-password", post(api::auth::forgot_password))
        .route("/auth/verify-reset-otp", post(api::auth::verify_reset_otp))
        .route("/auth/reset-password", post(api::auth::reset_password))
        .route("/ws/dream-status/:dream_id", get(api::ws::dream_status_ws));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the browser frontend
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
