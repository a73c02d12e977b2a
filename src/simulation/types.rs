//! Simulation domain model
//!
//! Plain data contracts shared by the registry, the lifecycle controller,
//! the phase driver and the HTTP layer. Field names serialize in camelCase
//! and enum variants in snake_case so the JSON matches what the training
//! frontend already consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a simulation
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    Running,
    Paused,
    Completed,
    Stopped,
    Failed,
}

impl Status {
    /// Completed and stopped runs never change status again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Stopped | Status::Failed)
    }

    /// A driver may still be attached (running or parked).
    pub fn is_active(self) -> bool {
        matches!(self, Status::Running | Status::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotStarted => "not_started",
            Status::Running => "running",
            Status::Paused => "paused",
            Status::Completed => "completed",
            Status::Stopped => "stopped",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Discovery,
    Escalation,
    Exploitation,
    LateralMovement,
    DataExfiltration,
    System,
}

/// Event severity, ordered from least to most severe
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Compromise level of an affected resource.
///
/// The derived ordering is the escalation order; a resource only ever moves
/// to a greater variant.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Normal,
    Vulnerable,
    Attacked,
    Compromised,
}

impl ResourceStatus {
    /// Lowest threat level a resource carries once it reaches this status.
    pub fn threat_floor(self) -> f64 {
        match self {
            ResourceStatus::Normal => 0.0,
            ResourceStatus::Vulnerable => 0.2,
            ResourceStatus::Attacked => 0.6,
            ResourceStatus::Compromised => 0.9,
        }
    }
}

/// One run of an attack scenario against a (mock) infrastructure
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub infrastructure_id: String,
    pub scenario_id: String,
    pub progress: f64,
    pub threats_detected: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Simulation {
    pub(crate) fn new(id: String, config: SimulationConfig, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: config.name,
            description: config.description,
            status: Status::NotStarted,
            start_time: None,
            end_time: None,
            infrastructure_id: config.infrastructure_id,
            scenario_id: config.scenario_id,
            progress: 0.0,
            threats_detected: 0,
            results: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only record of something that happened during a run
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimulationEvent {
    pub id: String,
    pub simulation_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SimulationEvent {
    /// Lifecycle event (started, stopped, phase change, ...) with `info` severity.
    pub fn system(simulation_id: &str, description: impl Into<String>) -> Self {
        Self::new(simulation_id, EventType::System, description, Severity::Info)
    }

    pub fn new(
        simulation_id: &str,
        event_type: EventType,
        description: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            simulation_id: simulation_id.to_string(),
            timestamp: Utc::now(),
            event_type,
            description: description.into(),
            resource_id: None,
            severity,
            details: None,
        }
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Mock infrastructure element whose compromise is tracked per simulation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AffectedResource {
    pub id: String,
    pub simulation_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub status: ResourceStatus,
    pub threat_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_vector: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<String>,
}

/// Client-supplied parameters for a new simulation.
///
/// Accepted as-is; nothing here is validated.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub infrastructure_id: String,
    #[serde(default)]
    pub scenario_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Map<String, serde_json::Value>>,
}

impl SimulationConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Derived status projection returned by the monitoring endpoints
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStatus {
    pub id: String,
    pub status: Status,
    pub runtime: String,
    pub threats_detected: u32,
    pub compromised_resources: usize,
    pub progress: f64,
}

/// Formats an elapsed duration as `HH:MM:SS`; hours are not capped at 24.
pub fn format_runtime(elapsed: chrono::Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_status_escalation_order() {
        assert!(ResourceStatus::Normal < ResourceStatus::Vulnerable);
        assert!(ResourceStatus::Vulnerable < ResourceStatus::Attacked);
        assert!(ResourceStatus::Attacked < ResourceStatus::Compromised);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_value(Status::NotStarted).unwrap(),
            serde_json::json!("not_started")
        );
        assert_eq!(
            serde_json::to_value(EventType::LateralMovement).unwrap(),
            serde_json::json!("lateral_movement")
        );
        assert_eq!(
            serde_json::to_value(EventType::DataExfiltration).unwrap(),
            serde_json::json!("data_exfiltration")
        );
    }

    #[test]
    fn test_simulation_omits_unset_times() {
        let sim = Simulation::new("sim-1".into(), SimulationConfig::named("Test"), Utc::now());
        let json = serde_json::to_value(&sim).unwrap();
        assert!(json.get("startTime").is_none());
        assert!(json.get("endTime").is_none());
        assert_eq!(json["status"], "not_started");
        assert_eq!(json["threatsDetected"], 0);
    }

    #[test]
    fn test_config_accepts_partial_body() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"name":"Red team drill","scenarioId":"scenario-1"}"#).unwrap();
        assert_eq!(config.name, "Red team drill");
        assert_eq!(config.scenario_id, "scenario-1");
        assert!(config.infrastructure_id.is_empty());
    }

    #[test]
    fn test_format_runtime() {
        assert_eq!(format_runtime(chrono::Duration::zero()), "00:00:00");
        assert_eq!(format_runtime(chrono::Duration::seconds(3_725)), "01:02:05");
        assert_eq!(format_runtime(chrono::Duration::hours(30)), "30:00:00");
        assert_eq!(format_runtime(chrono::Duration::seconds(-5)), "00:00:00");
    }
}
