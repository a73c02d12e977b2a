//! Infrastructure and scenario catalog handlers. Everything served here is
//! mock data; nothing is stored.

use super::{ApiError, ApiResponse, ApiResult, SimdJson, created, now_rfc3339, ok};
use crate::mock::{self, Infrastructure, Scenario};
use axum::extract::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct CreateInfrastructureRequest {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInfrastructure {
    pub id: String,
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateScenarioRequest {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub difficulty: Option<Value>,
    #[serde(default)]
    pub duration: Option<Value>,
    #[serde(default)]
    pub steps: Option<Value>,
}

/// A client-defined scenario, echoed back with an assigned id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedScenario {
    pub id: String,
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub difficulty: Option<Value>,
    pub duration: Option<Value>,
    pub steps: Option<Value>,
    pub created_at: String,
}

pub async fn list_infrastructure() -> ApiResult<Infrastructure> {
    ok(ApiResponse::success(mock::generate_infrastructure(&mut rand::rng())))
}

pub async fn get_infrastructure(Path(id): Path<String>) -> ApiResult<Infrastructure> {
    let mut infrastructure = mock::generate_infrastructure(&mut rand::rng());
    infrastructure.name = Some(format!("Cloud Infrastructure {id}"));
    infrastructure.description = Some("Generated infrastructure for demonstration purposes".to_string());
    infrastructure.id = Some(id);
    ok(ApiResponse::success(infrastructure))
}

pub async fn create_infrastructure(
    SimdJson(request): SimdJson<CreateInfrastructureRequest>,
) -> ApiResult<CreatedInfrastructure> {
    let infrastructure = CreatedInfrastructure {
        id: format!("inf-{}", mock::short_id(&mut rand::rng())),
        name: request.name,
        description: request.description,
        created_at: now_rfc3339(),
    };
    created(ApiResponse::success(infrastructure).with_message("Infrastructure created successfully"))
}

/// Requires string `content` and `type` fields; the content itself is not
/// parsed, a fresh mock topology stands in for it.
pub async fn import_infrastructure(SimdJson(request): SimdJson<Value>) -> ApiResult<Infrastructure> {
    let content = request.get("content").and_then(Value::as_str);
    let source_type = request.get("type").and_then(Value::as_str);
    let (Some(_), Some(source_type)) = (content, source_type) else {
        return Err(ApiError::bad_request("Missing required fields: content and type"));
    };

    let mut rng = rand::rng();
    let mut infrastructure = mock::generate_infrastructure(&mut rng);
    infrastructure.id = Some(format!("imported-{}", mock::short_id(&mut rng)));
    infrastructure.name = Some("Imported Infrastructure".to_string());
    infrastructure.description = Some(format!("Infrastructure imported from {source_type} file"));
    infrastructure.imported_at = Some(now_rfc3339());
    infrastructure.source_type = Some(source_type.to_string());
    ok(ApiResponse::success(infrastructure).with_message("Infrastructure imported successfully"))
}

pub async fn list_scenarios() -> ApiResult<Vec<Scenario>> {
    ok(ApiResponse::success(mock::scenarios()))
}

pub async fn get_scenario(Path(id): Path<String>) -> ApiResult<Scenario> {
    let scenario = mock::find_scenario(&id).ok_or_else(|| ApiError::not_found("Scenario not found"))?;
    ok(ApiResponse::success(scenario))
}

pub async fn create_scenario(
    SimdJson(request): SimdJson<CreateScenarioRequest>,
) -> ApiResult<CreatedScenario> {
    let scenario = CreatedScenario {
        id: format!("scenario-{}", mock::short_id(&mut rand::rng())),
        name: request.name,
        description: request.description,
        difficulty: request.difficulty,
        duration: request.duration,
        steps: request.steps,
        created_at: now_rfc3339(),
    };
    created(ApiResponse::success(scenario).with_message("Scenario created successfully"))
}
