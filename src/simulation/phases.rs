//! Attack phases and the lookup tables the driver draws events from.
//!
//! Everything here is data: which event type marks entry into a phase,
//! which descriptions and severities a random in-phase event can carry, and
//! how likely an event is to escalate the resource it touches.

use crate::simulation::types::{EventType, ResourceStatus, Severity};
use serde::Serialize;

pub const PHASE_COUNT: u8 = 5;

/// Stage of an emulated attack. Phase 1 is implicit at start.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Staging = 1,
    Reconnaissance = 2,
    InitialAccess = 3,
    PrivilegeEscalation = 4,
    LateralMovement = 5,
}

impl Phase {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Phase> {
        match n {
            1 => Some(Phase::Staging),
            2 => Some(Phase::Reconnaissance),
            3 => Some(Phase::InitialAccess),
            4 => Some(Phase::PrivilegeEscalation),
            5 => Some(Phase::LateralMovement),
            _ => None,
        }
    }

    pub fn next(self) -> Option<Phase> {
        Phase::from_number(self.number() + 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Staging => "Staging",
            Phase::Reconnaissance => "Reconnaissance",
            Phase::InitialAccess => "Initial Access",
            Phase::PrivilegeEscalation => "Privilege Escalation",
            Phase::LateralMovement => "Lateral Movement",
        }
    }

    /// Progress at which the driver leaves this phase for the next one.
    pub fn exit_threshold(self) -> f64 {
        self.number() as f64 / PHASE_COUNT as f64
    }

    /// Phase implied by a stored progress value, for drivers attached to a
    /// simulation that already advanced.
    pub fn for_progress(progress: f64) -> Phase {
        let mut phase = Phase::Staging;
        while let Some(next) = phase.next() {
            if progress + PROGRESS_EPSILON < phase.exit_threshold() {
                break;
            }
            phase = next;
        }
        phase
    }

    /// Type of the deterministic event emitted when entering this phase.
    pub fn transition_event(self) -> EventType {
        match self {
            Phase::Staging => EventType::System,
            Phase::Reconnaissance => EventType::Discovery,
            Phase::InitialAccess => EventType::Exploitation,
            Phase::PrivilegeEscalation => EventType::Escalation,
            Phase::LateralMovement => EventType::LateralMovement,
        }
    }

    /// Random-event table for this phase.
    pub fn profile(self) -> &'static PhaseProfile {
        match self {
            Phase::Staging | Phase::Reconnaissance => &RECON_PROFILE,
            Phase::InitialAccess => &INITIAL_ACCESS_PROFILE,
            Phase::PrivilegeEscalation => &ESCALATION_PROFILE,
            Phase::LateralMovement => &LATERAL_PROFILE,
        }
    }
}

/// Tolerance for accumulated floating point progress.
pub const PROGRESS_EPSILON: f64 = 1e-9;

/// Candidate event types for a phase, each with its own description pool.
pub struct EventChoice {
    pub event_type: EventType,
    pub descriptions: &'static [&'static str],
}

pub struct PhaseProfile {
    /// Picked uniformly.
    pub choices: &'static [EventChoice],
    pub severities: &'static [Severity],
    /// Status the touched resource is raised to, and how likely that is.
    pub escalation: Option<(ResourceStatus, f64)>,
}

static RECON_PROFILE: PhaseProfile = PhaseProfile {
    choices: &[EventChoice {
        event_type: EventType::Discovery,
        descriptions: &[
            "Port scan performed",
            "DNS records enumerated",
            "Web server headers analysed",
            "Open services identified",
            "Operating system fingerprinted",
        ],
    }],
    severities: &[Severity::Info, Severity::Low],
    escalation: None,
};

static INITIAL_ACCESS_PROFILE: PhaseProfile = PhaseProfile {
    choices: &[EventChoice {
        event_type: EventType::Exploitation,
        descriptions: &[
            "SQL injection attempted",
            "Known vulnerability exploited",
            "Brute-force attack on login form",
            "Phishing email delivered",
            "Misconfiguration exploited",
        ],
    }],
    severities: &[Severity::Medium, Severity::High],
    escalation: Some((ResourceStatus::Attacked, 0.7)),
};

static ESCALATION_PROFILE: PhaseProfile = PhaseProfile {
    choices: &[EventChoice {
        event_type: EventType::Escalation,
        descriptions: &[
            "Privilege escalation through insecure permissions",
            "Kernel vulnerability exploited",
            "Plaintext password discovered",
            "Pivot to critical system",
            "Credentials stolen",
        ],
    }],
    severities: &[Severity::High, Severity::Critical],
    escalation: Some((ResourceStatus::Compromised, 0.6)),
};

static LATERAL_PROFILE: PhaseProfile = PhaseProfile {
    choices: &[
        EventChoice {
            event_type: EventType::LateralMovement,
            descriptions: &[
                "Moved to next network segment",
                "Stolen credentials reused",
                "Remote code execution",
                "Pass-the-hash attack",
                "New administrator account created",
            ],
        },
        EventChoice {
            event_type: EventType::DataExfiltration,
            descriptions: &[
                "Data exfiltrated through encrypted tunnel",
                "Sensitive files copied",
                "Mailbox extracted over SMTP",
                "Database dump created",
                "Ransomware executed",
            ],
        },
    ],
    severities: &[Severity::High, Severity::Critical],
    escalation: None,
};

/// Kinds of resource the driver invents when a run has none yet.
pub const RESOURCE_TYPES: &[&str] = &["server", "workstation", "router", "database"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_sequence() {
        let mut phase = Phase::Staging;
        let mut labels = Vec::new();
        while let Some(next) = phase.next() {
            labels.push(next.label());
            phase = next;
        }
        assert_eq!(
            labels,
            vec![
                "Reconnaissance",
                "Initial Access",
                "Privilege Escalation",
                "Lateral Movement"
            ]
        );
        assert_eq!(phase.number(), PHASE_COUNT);
    }

    #[test]
    fn test_transition_event_types() {
        assert_eq!(Phase::Reconnaissance.transition_event(), EventType::Discovery);
        assert_eq!(Phase::InitialAccess.transition_event(), EventType::Exploitation);
        assert_eq!(Phase::PrivilegeEscalation.transition_event(), EventType::Escalation);
        assert_eq!(Phase::LateralMovement.transition_event(), EventType::LateralMovement);
    }

    #[test]
    fn test_for_progress() {
        assert_eq!(Phase::for_progress(0.0), Phase::Staging);
        assert_eq!(Phase::for_progress(0.19), Phase::Staging);
        assert_eq!(Phase::for_progress(0.2), Phase::Reconnaissance);
        assert_eq!(Phase::for_progress(0.55), Phase::InitialAccess);
        assert_eq!(Phase::for_progress(0.8), Phase::LateralMovement);
        assert_eq!(Phase::for_progress(1.0), Phase::LateralMovement);
    }

    #[test]
    fn test_profiles_are_populated() {
        for n in 1..=PHASE_COUNT {
            let profile = Phase::from_number(n).unwrap().profile();
            assert!(!profile.choices.is_empty());
            assert!(!profile.severities.is_empty());
            assert!(profile.choices.iter().all(|c| !c.descriptions.is_empty()));
        }
    }

    #[test]
    fn test_escalation_targets_only_rise() {
        assert_eq!(
            Phase::InitialAccess.profile().escalation.map(|(s, _)| s),
            Some(ResourceStatus::Attacked)
        );
        assert_eq!(
            Phase::PrivilegeEscalation.profile().escalation.map(|(s, _)| s),
            Some(ResourceStatus::Compromised)
        );
        assert!(Phase::Reconnaissance.profile().escalation.is_none());
    }
}
