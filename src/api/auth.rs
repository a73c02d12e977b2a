//! Mock authentication: one configured account and a fixed token.

use super::{ApiError, AppState, SimdJson};
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

pub const MOCK_TOKEN: &str = "mock-jwt-token";

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub token: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub token: String,
}

/// Returns the bare user object, not the envelope.
pub async fn login(
    State(state): State<AppState>,
    SimdJson(credentials): SimdJson<Credentials>,
) -> Result<Json<User>, ApiError> {
    if credentials.username != state.auth.username || credentials.password != state.auth.password {
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid username or password"));
    }
    info!(user = %credentials.username, "login");
    Ok(Json(User {
        id: "1".to_string(),
        username: credentials.username,
        token: MOCK_TOKEN.to_string(),
        role: "admin".to_string(),
    }))
}

pub async fn logout() -> Json<Value> {
    Json(json!({ "message": "Logged out successfully" }))
}

pub async fn validate_token(SimdJson(request): SimdJson<TokenRequest>) -> Json<Value> {
    Json(json!({ "valid": request.token == MOCK_TOKEN }))
}
