//! In-memory simulation registry
//!
//! All simulation state lives in four maps keyed by simulation ID, guarded
//! by a single reader/writer lock:
//!
//! ```text
//! ┌──────────────────────── RwLock<RegistryInner> ────────────────────────┐
//! │ simulations: id -> Simulation                                         │
//! │ events:      id -> Vec<SimulationEvent>    (append-only, tick order)  │
//! │ resources:   id -> Vec<AffectedResource>                              │
//! │ workers:     id -> WorkerHandle            (present = live driver)    │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation is a `&mut self` method on [`RegistryInner`], so it is only
//! reachable through a held write guard. [`Registry`] itself never locks on
//! a caller's behalf: callers take one guard, make all their changes and
//! write them through to the store before dropping it. No method here takes
//! the lock again, so a caller holding a guard cannot deadlock on itself.

use crate::error::{EngineError, Result};
use crate::simulation::types::{
    AffectedResource, EventType, ResourceStatus, Simulation, SimulationEvent,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Control handle for one live driver task.
#[derive(Debug)]
pub struct WorkerHandle {
    pub cancel: CancellationToken,
    pub resume: Arc<Notify>,
    pub task: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn new(cancel: CancellationToken, resume: Arc<Notify>) -> Self {
        Self {
            cancel,
            resume,
            task: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RegistryInner {
    simulations: HashMap<String, Simulation>,
    events: HashMap<String, Vec<SimulationEvent>>,
    resources: HashMap<String, Vec<AffectedResource>>,
    workers: HashMap<String, WorkerHandle>,
}

impl RegistryInner {
    pub fn insert_simulation(&mut self, simulation: Simulation) {
        let id = simulation.id.clone();
        self.events.entry(id.clone()).or_default();
        self.resources.entry(id.clone()).or_default();
        self.simulations.insert(id, simulation);
    }

    pub fn simulation(&self, id: &str) -> Option<&Simulation> {
        self.simulations.get(id)
    }

    pub fn simulation_mut(&mut self, id: &str) -> Option<&mut Simulation> {
        self.simulations.get_mut(id)
    }

    pub fn simulations(&self) -> impl Iterator<Item = &Simulation> {
        self.simulations.values()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.simulations.contains_key(id)
    }

    /// Appends to the event log. Exploitation events bump the owner's
    /// threat counter.
    pub fn push_event(&mut self, event: SimulationEvent) {
        if event.event_type == EventType::Exploitation {
            if let Some(simulation) = self.simulations.get_mut(&event.simulation_id) {
                simulation.threats_detected += 1;
            }
        }
        self.events
            .entry(event.simulation_id.clone())
            .or_default()
            .push(event);
    }

    /// Like [`push_event`](Self::push_event), but rejects unknown owners.
    pub fn append_event(&mut self, event: SimulationEvent) -> Result<()> {
        if !self.contains(&event.simulation_id) {
            return Err(EngineError::SimulationNotFound(event.simulation_id));
        }
        self.push_event(event);
        Ok(())
    }

    pub fn events(&self, id: &str) -> &[SimulationEvent] {
        self.events.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push_resource(&mut self, resource: AffectedResource) {
        self.resources
            .entry(resource.simulation_id.clone())
            .or_default()
            .push(resource);
    }

    pub fn add_resource(&mut self, resource: AffectedResource) -> Result<()> {
        if !self.contains(&resource.simulation_id) {
            return Err(EngineError::SimulationNotFound(resource.simulation_id));
        }
        self.push_resource(resource);
        Ok(())
    }

    pub fn resources(&self, id: &str) -> &[AffectedResource] {
        self.resources.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Raises a resource to `status`. Lower or equal targets leave it
    /// untouched; returns the resource when it actually changed.
    pub fn escalate_resource(
        &mut self,
        simulation_id: &str,
        resource_id: &str,
        status: ResourceStatus,
    ) -> Result<Option<&AffectedResource>> {
        let resources = self
            .resources
            .get_mut(simulation_id)
            .ok_or_else(|| EngineError::SimulationNotFound(simulation_id.to_string()))?;
        let resource = resources
            .iter_mut()
            .find(|r| r.id == resource_id)
            .ok_or_else(|| EngineError::ResourceNotFound {
                simulation_id: simulation_id.to_string(),
                resource_id: resource_id.to_string(),
            })?;

        if status <= resource.status {
            return Ok(None);
        }
        resource.status = status;
        resource.threat_level = resource.threat_level.max(status.threat_floor());
        Ok(Some(&*resource))
    }

    pub fn compromised_count(&self, id: &str) -> usize {
        self.resources(id)
            .iter()
            .filter(|r| r.status == ResourceStatus::Compromised)
            .count()
    }

    pub fn insert_worker(&mut self, id: &str, handle: WorkerHandle) {
        self.workers.insert(id.to_string(), handle);
    }

    pub fn worker(&self, id: &str) -> Option<&WorkerHandle> {
        self.workers.get(id)
    }

    pub fn worker_mut(&mut self, id: &str) -> Option<&mut WorkerHandle> {
        self.workers.get_mut(id)
    }

    /// Removes the handle so its signal is consumed at most once.
    pub fn take_worker(&mut self, id: &str) -> Option<WorkerHandle> {
        self.workers.remove(id)
    }

    pub fn drain_workers(&mut self) -> Vec<(String, WorkerHandle)> {
        self.workers.drain().collect()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

/// Shared handle to the registry; cloned into every driver.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means some thread panicked mid-tick; the maps
    // themselves are still structurally valid.
    pub fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::{Severity, SimulationConfig};
    use chrono::Utc;

    fn registry_with(id: &str) -> Registry {
        let registry = Registry::new();
        registry.write().insert_simulation(Simulation::new(
            id.to_string(),
            SimulationConfig::named("Test"),
            Utc::now(),
        ));
        registry
    }

    fn resource(simulation_id: &str, id: &str, status: ResourceStatus) -> AffectedResource {
        AffectedResource {
            id: id.to_string(),
            simulation_id: simulation_id.to_string(),
            name: "db-7".to_string(),
            resource_type: "database".to_string(),
            status,
            threat_level: 0.2,
            attack_vector: None,
            vulnerabilities: Vec::new(),
        }
    }

    #[test]
    fn test_exploitation_event_counts_threat() {
        let registry = registry_with("sim");
        registry
            .write()
            .append_event(SimulationEvent::new(
                "sim",
                EventType::Exploitation,
                "SQL injection attempted",
                Severity::High,
            ))
            .unwrap();
        registry
            .write()
            .append_event(SimulationEvent::new(
                "sim",
                EventType::Discovery,
                "Port scan performed",
                Severity::Low,
            ))
            .unwrap();

        let inner = registry.read();
        assert_eq!(inner.simulation("sim").unwrap().threats_detected, 1);
        assert_eq!(inner.events("sim").len(), 2);
        assert_eq!(inner.events("sim")[0].description, "SQL injection attempted");
    }

    #[test]
    fn test_append_to_unknown_simulation_fails() {
        let registry = Registry::new();
        let err = registry
            .write()
            .append_event(SimulationEvent::system("ghost", "Simulation started"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_resource_status_never_reverts() {
        let registry = registry_with("sim");
        registry
            .write()
            .add_resource(resource("sim", "res-1", ResourceStatus::Compromised))
            .unwrap();

        let mut inner = registry.write();
        let changed = inner
            .escalate_resource("sim", "res-1", ResourceStatus::Attacked)
            .unwrap();
        assert!(changed.is_none());
        drop(inner);
        assert_eq!(
            registry.read().resources("sim")[0].status,
            ResourceStatus::Compromised
        );
    }

    #[test]
    fn test_escalation_raises_threat_level() {
        let registry = registry_with("sim");
        registry
            .write()
            .add_resource(resource("sim", "res-1", ResourceStatus::Vulnerable))
            .unwrap();

        let changed = registry
            .write()
            .escalate_resource("sim", "res-1", ResourceStatus::Compromised)
            .unwrap()
            .cloned()
            .unwrap();
        assert_eq!(changed.status, ResourceStatus::Compromised);
        assert!(changed.threat_level >= 0.9);
        assert_eq!(registry.read().compromised_count("sim"), 1);
    }

    #[test]
    fn test_unknown_resource_is_not_found() {
        let registry = registry_with("sim");
        let err = registry
            .write()
            .escalate_resource("sim", "missing", ResourceStatus::Attacked)
            .unwrap_err();
        assert!(matches!(err, EngineError::ResourceNotFound { .. }));
    }

    #[test]
    fn test_worker_taken_once() {
        let registry = registry_with("sim");
        let cancel = CancellationToken::new();
        registry
            .write()
            .insert_worker("sim", WorkerHandle::new(cancel.clone(), Arc::new(Notify::new())));

        assert!(registry.write().take_worker("sim").is_some());
        assert!(registry.write().take_worker("sim").is_none());
        assert_eq!(registry.read().worker_count(), 0);
    }
}
