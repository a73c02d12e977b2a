//! HTTP surface for the simulation engine
//!
//! Every `/api` response uses the same envelope:
//!
//! ```text
//! { "status": "success" | "error" | "healthy",
//!   "message": "...",   (optional)
//!   "data":    { ... }, (optional)
//!   "error":   "..." }  (optional)
//! ```
//!
//! Request bodies go through [`SimdJson`], which rejects malformed JSON with
//! a 400 envelope before a handler runs.

pub mod auth;
pub mod catalog;
pub mod simulations;

use crate::error::EngineError;
use crate::metrics;
use crate::simulation::SimulationEngine;
use auth::AuthConfig;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, warn};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const BUILD_TIME: &str = match option_env!("AEGIS_BUILD_TIME") {
    Some(t) => t,
    None => "unknown",
};
pub const GIT_COMMIT: &str = match option_env!("AEGIS_GIT_COMMIT") {
    Some(c) => c,
    None => "unknown",
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SimulationEngine>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(engine: Arc<SimulationEngine>, auth: AuthConfig) -> Self {
        Self {
            engine,
            auth: Arc::new(auth),
        }
    }
}

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn healthy(data: T) -> Self {
        Self {
            status: "healthy".to_string(),
            ..Self::success(data)
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

impl ApiResponse<()> {
    pub fn error(msg: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: None,
            data: None,
            error: Some(msg.to_string()),
        }
    }
}

/// Error envelope with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Internal(_) => {
                error!(error = %err, "engine failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            _ => Self::not_found(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::error(&self.message))).into_response()
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn ok<T>(response: ApiResponse<T>) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(response)))
}

pub fn created<T>(response: ApiResponse<T>) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(response)))
}

/// JSON body extractor backed by simd-json.
pub struct SimdJson<T>(pub T);

impl<S, T> FromRequest<S> for SimdJson<T>
where
    T: for<'de> Deserialize<'de>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        let mut bytes_vec = bytes.to_vec();

        let val = simd_json::from_slice::<T>(&mut bytes_vec).map_err(|e| {
            warn!(error = %e, "rejected request body");
            ApiError::bad_request("Invalid request format")
        })?;
        Ok(SimdJson(val))
    }
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn version() -> Json<serde_json::Value> {
    Json(json!({ "version": VERSION }))
}

async fn api_health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::healthy(json!({ "timestamp": now_rfc3339() })))
}

async fn api_version() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(json!({
        "version": VERSION,
        "buildTime": BUILD_TIME,
        "gitCommit": GIT_COMMIT,
    })))
}

async fn metrics_handler() -> Result<String, ApiError> {
    metrics::render().map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Permissive when no origins are configured.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let api = Router::new()
        .route("/health", get(api_health))
        .route("/version", get(api_version))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/validate-token", post(auth::validate_token))
        .route(
            "/infrastructure",
            get(catalog::list_infrastructure).post(catalog::create_infrastructure),
        )
        .route("/infrastructure/import", post(catalog::import_infrastructure))
        .route("/infrastructure/{id}", get(catalog::get_infrastructure))
        .route(
            "/simulations",
            get(simulations::list).post(simulations::create),
        )
        .route("/simulations/{id}", get(simulations::get))
        .route("/simulations/{id}/start", post(simulations::start))
        .route("/simulations/{id}/stop", post(simulations::stop))
        .route("/simulations/{id}/pause", post(simulations::pause))
        .route("/simulations/{id}/resume", post(simulations::resume))
        .route("/monitoring/simulations/{id}/status", get(simulations::status))
        .route("/monitoring/simulations/{id}/events", get(simulations::events))
        .route("/monitoring/simulations/{id}/resources", get(simulations::resources))
        .route(
            "/scenarios",
            get(catalog::list_scenarios).post(catalog::create_scenario),
        )
        .route("/scenarios/{id}", get(catalog::get_scenario));

    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api)
        .layer(cors_layer(cors_origins))
        .with_state(state)
}
