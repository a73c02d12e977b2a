//! Demonstration data: a random network topology, the built-in attack
//! scenarios and a seeded demo simulation for development servers.

use crate::error::Result;
use crate::simulation::SimulationEngine;
use crate::simulation::types::{AffectedResource, ResourceStatus, Simulation, SimulationConfig};
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tracing::info;

const ROUTERS: usize = 2;
const SERVERS: usize = 5;
const WORKSTATIONS: usize = 8;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Normal,
    Warning,
    Critical,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NetworkNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub status: HealthStatus,
    pub ip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Connection {
    pub id: String,
    pub source: String,
    pub target: String,
    pub status: HealthStatus,
    pub protocol: &'static str,
    pub ports: Vec<&'static str>,
}

/// Network topology returned by the infrastructure endpoints. The optional
/// header fields are filled in by whichever endpoint serves it.
#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Infrastructure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    pub nodes: Vec<NetworkNode>,
    pub connections: Vec<Connection>,
}

/// Short random hex id, the same width as a truncated UUID.
pub fn short_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:08x}", rng.random::<u32>())
}

/// 2 routers, 5 servers and 8 workstations with randomly drawn links.
pub fn generate_infrastructure<R: Rng + ?Sized>(rng: &mut R) -> Infrastructure {
    let mut nodes = Vec::with_capacity(ROUTERS + SERVERS + WORKSTATIONS);

    for i in 1..=ROUTERS {
        nodes.push(NetworkNode {
            id: format!("router-{i}"),
            name: format!("Router {i}"),
            node_type: "router",
            status: HealthStatus::Normal,
            ip_address: format!("10.0.0.{i}"),
            metadata: None,
        });
    }
    for i in 1..=SERVERS {
        let status = match i {
            2 => HealthStatus::Warning,
            3 => HealthStatus::Critical,
            _ => HealthStatus::Normal,
        };
        nodes.push(NetworkNode {
            id: format!("server-{i}"),
            name: format!("Server {i}"),
            node_type: "server",
            status,
            ip_address: format!("10.0.1.{i}"),
            metadata: Some(json!({
                "os": "Linux",
                "version": "Ubuntu 22.04",
                "services": ["http", "https", "ssh"],
                "environment": "production",
            })),
        });
    }
    for i in 1..=WORKSTATIONS {
        nodes.push(NetworkNode {
            id: format!("workstation-{i}"),
            name: format!("Workstation {i}"),
            node_type: "workstation",
            status: if i == 4 { HealthStatus::Warning } else { HealthStatus::Normal },
            ip_address: format!("10.0.2.{i}"),
            metadata: Some(json!({
                "os": "Windows",
                "version": "Windows 11",
                "user": format!("user{i}"),
            })),
        });
    }

    let mut connections = Vec::new();
    let mut link = |rng: &mut R, source: String, target: String, status, ports: &[&'static str]| {
        connections.push(Connection {
            id: short_id(rng),
            source,
            target,
            status,
            protocol: "TCP",
            ports: ports.to_vec(),
        });
    };

    for r in 1..=ROUTERS {
        for s in 1..=SERVERS {
            if rng.random_bool(0.7) {
                let status = if s == 3 { HealthStatus::Warning } else { HealthStatus::Normal };
                link(rng, format!("router-{r}"), format!("server-{s}"), status, &["80", "443", "22"]);
            }
        }
    }
    for r in 1..=ROUTERS {
        for w in 1..=WORKSTATIONS {
            if rng.random_bool(0.5) {
                let status = if w == 4 { HealthStatus::Critical } else { HealthStatus::Normal };
                link(rng, format!("router-{r}"), format!("workstation-{w}"), status, &["445", "3389"]);
            }
        }
    }
    for a in 1..=SERVERS {
        for b in (a + 1)..=SERVERS {
            if rng.random_bool(0.3) {
                link(rng, format!("server-{a}"), format!("server-{b}"), HealthStatus::Normal, &["3306", "5432"]);
            }
        }
    }

    Infrastructure {
        nodes,
        connections,
        ..Default::default()
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Serialize, Debug, Clone)]
pub struct ScenarioStep {
    pub id: u32,
    pub name: &'static str,
    pub description: &'static str,
    /// Seconds
    pub duration: u32,
}

#[derive(Serialize, Debug, Clone)]
pub struct Scenario {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub difficulty: Difficulty,
    /// Seconds
    pub duration: u32,
    pub steps: Vec<ScenarioStep>,
}

fn steps(defs: &[(&'static str, &'static str, u32)]) -> Vec<ScenarioStep> {
    defs.iter()
        .zip(1..)
        .map(|(&(name, description, duration), id)| ScenarioStep {
            id,
            name,
            description,
            duration,
        })
        .collect()
}

/// The built-in attack scenarios.
pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            id: "scenario-1",
            name: "Basic Penetration Test",
            description: "A basic penetration test covering reconnaissance, scanning and exploitation",
            difficulty: Difficulty::Easy,
            duration: 3600,
            steps: steps(&[
                ("Reconnaissance", "Gather information about the target", 900),
                ("Scanning", "Scan for open ports and services", 1200),
                ("Exploitation", "Exploit discovered vulnerabilities", 1500),
            ]),
        },
        Scenario {
            id: "scenario-2",
            name: "Advanced Ransomware Simulation",
            description: "An advanced ransomware attack simulation",
            difficulty: Difficulty::Hard,
            duration: 7200,
            steps: steps(&[
                ("Initial Access", "Gain access through phishing", 1200),
                ("Privilege Escalation", "Elevate privileges", 1800),
                ("Lateral Movement", "Move laterally through the network", 1500),
                ("Data Exfiltration", "Extract sensitive data", 1500),
                ("Encryption", "Encrypt files and demand a ransom", 1200),
            ]),
        },
        Scenario {
            id: "scenario-3",
            name: "Compliance Check",
            description: "Verify adherence to security policies",
            difficulty: Difficulty::Medium,
            duration: 4500,
            steps: steps(&[
                ("Configuration Audit", "Review configuration settings", 1800),
                ("Access Control Validation", "Validate access controls", 1500),
                ("Policy Compliance", "Check compliance with company policies", 1200),
            ]),
        },
    ]
}

pub fn find_scenario(id: &str) -> Option<Scenario> {
    scenarios().into_iter().find(|s| s.id == id)
}

/// Creates "Demo-Simulation" with five pre-populated resources.
pub fn seed_demo_simulation(engine: &SimulationEngine) -> Result<Simulation> {
    let simulation = engine.create(SimulationConfig {
        name: "Demo-Simulation".to_string(),
        description: "Automatically generated sample simulation for testing".to_string(),
        infrastructure_id: "infrastructure-demo".to_string(),
        scenario_id: "scenario-basic-pentest".to_string(),
        parameters: None,
    });

    let resources = [
        ("Web Server", "server", ResourceStatus::Normal),
        ("Database Server", "server", ResourceStatus::Vulnerable),
        ("Admin Workstation", "workstation", ResourceStatus::Normal),
        ("Gateway Router", "router", ResourceStatus::Normal),
        ("File Server", "server", ResourceStatus::Vulnerable),
    ];
    for (i, (name, resource_type, status)) in resources.into_iter().enumerate() {
        engine.add_affected_resource(AffectedResource {
            id: format!("resource-{}", i + 1),
            simulation_id: simulation.id.clone(),
            name: name.to_string(),
            resource_type: resource_type.to_string(),
            status,
            threat_level: i as f64 * 0.2,
            attack_vector: None,
            vulnerabilities: Vec::new(),
        })?;
    }

    info!(simulation = %simulation.id, "demo simulation seeded");
    Ok(simulation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_infrastructure_shape() {
        let mut rng = StdRng::seed_from_u64(11);
        let infra = generate_infrastructure(&mut rng);

        assert_eq!(infra.nodes.len(), 15);
        let count = |t: &str| infra.nodes.iter().filter(|n| n.node_type == t).count();
        assert_eq!(count("router"), 2);
        assert_eq!(count("server"), 5);
        assert_eq!(count("workstation"), 8);

        let server3 = infra.nodes.iter().find(|n| n.id == "server-3").unwrap();
        assert_eq!(server3.status, HealthStatus::Critical);
        assert_eq!(server3.ip_address, "10.0.1.3");
        let ws4 = infra.nodes.iter().find(|n| n.id == "workstation-4").unwrap();
        assert_eq!(ws4.status, HealthStatus::Warning);
    }

    #[test]
    fn test_connections_follow_topology_rules() {
        let mut rng = StdRng::seed_from_u64(12);
        let infra = generate_infrastructure(&mut rng);

        // 2*5 + 2*8 + C(5,2)
        assert!(infra.connections.len() <= 36);
        for c in &infra.connections {
            assert_eq!(c.protocol, "TCP");
            assert_eq!(c.id.len(), 8);
            if c.source.starts_with("server") {
                assert_eq!(c.ports, vec!["3306", "5432"]);
                assert!(c.source < c.target);
            } else if c.target.starts_with("workstation") {
                assert_eq!(c.ports, vec!["445", "3389"]);
            } else {
                assert_eq!(c.ports, vec!["80", "443", "22"]);
            }
        }
    }

    #[test]
    fn test_infrastructure_json_omits_unset_header() {
        let mut rng = StdRng::seed_from_u64(13);
        let json = serde_json::to_value(generate_infrastructure(&mut rng)).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["nodes"][0]["type"], "router");
        assert_eq!(json["nodes"][0]["ipAddress"], "10.0.0.1");
    }

    #[test]
    fn test_scenario_steps_fill_duration() {
        let all = scenarios();
        assert_eq!(all.len(), 3);
        for scenario in &all {
            let total: u32 = scenario.steps.iter().map(|s| s.duration).sum();
            assert_eq!(total, scenario.duration, "{}", scenario.name);
        }
        assert_eq!(find_scenario("scenario-2").unwrap().steps.len(), 5);
        assert!(find_scenario("scenario-9").is_none());
    }

    #[test]
    fn test_demo_seed() {
        let engine = SimulationEngine::new(EngineConfig::default());
        let sim = seed_demo_simulation(&engine).unwrap();

        assert_eq!(sim.name, "Demo-Simulation");
        let resources = engine.affected_resources(&sim.id).unwrap();
        assert_eq!(resources.len(), 5);
        assert_eq!(resources[0].id, "resource-1");
        assert_eq!(resources[0].threat_level, 0.0);
        assert!((resources[4].threat_level - 0.8).abs() < 1e-9);
        assert_eq!(resources[4].status, ResourceStatus::Vulnerable);
    }
}
