//! Simulation lifecycle and monitoring handlers.

use super::{ApiResponse, ApiResult, AppState, SimdJson, created, ok};
use crate::simulation::types::{
    AffectedResource, Simulation, SimulationConfig, SimulationEvent, SimulationStatus,
};
use axum::extract::{Path, Query, State};
use serde::Deserialize;

pub const DEFAULT_EVENT_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<String>,
}

impl EventsQuery {
    /// Positive integer or the default; anything else falls back silently.
    pub fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_EVENT_LIMIT)
    }
}

/// Every simulation, oldest first.
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Simulation>> {
    ok(ApiResponse::success(state.engine.list()))
}

pub async fn create(
    State(state): State<AppState>,
    SimdJson(config): SimdJson<SimulationConfig>,
) -> ApiResult<Simulation> {
    let simulation = state.engine.create(config);
    created(ApiResponse::success(simulation).with_message("Simulation created successfully"))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Simulation> {
    ok(ApiResponse::success(state.engine.get(&id)?))
}

pub async fn start(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Simulation> {
    let simulation = state.engine.start(&id)?;
    ok(ApiResponse::success(simulation).with_message("Simulation started successfully"))
}

pub async fn stop(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Simulation> {
    let simulation = state.engine.stop(&id)?;
    ok(ApiResponse::success(simulation).with_message("Simulation stopped successfully"))
}

pub async fn pause(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Simulation> {
    let simulation = state.engine.pause(&id)?;
    ok(ApiResponse::success(simulation).with_message("Simulation paused successfully"))
}

pub async fn resume(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Simulation> {
    let simulation = state.engine.resume(&id)?;
    ok(ApiResponse::success(simulation).with_message("Simulation resumed successfully"))
}

pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SimulationStatus> {
    ok(ApiResponse::success(state.engine.status(&id)?))
}

pub async fn events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Vec<SimulationEvent>> {
    ok(ApiResponse::success(
        state.engine.recent_events(&id, query.limit())?,
    ))
}

pub async fn resources(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<AffectedResource>> {
    ok(ApiResponse::success(state.engine.affected_resources(&id)?))
}
