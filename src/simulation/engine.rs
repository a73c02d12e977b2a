//! Lifecycle controller and query surface.
//!
//! [`SimulationEngine`] is built once at the composition root and shared
//! behind an `Arc`. It owns the registry, derives a fresh RNG for each phase
//! driver it spawns, and forwards every change to an optional write-through
//! store before releasing the registry lock that made it, so the store never
//! sees an older snapshot after a newer one.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::metrics;
use crate::simulation::driver::PhaseDriver;
use crate::simulation::registry::{Registry, WorkerHandle};
use crate::simulation::types::{
    AffectedResource, EventType, ResourceStatus, Simulation, SimulationConfig, SimulationEvent,
    SimulationStatus, Status, format_runtime,
};
use crate::store::{SimulationStore, WriteThrough};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct SimulationEngine {
    registry: Arc<Registry>,
    config: EngineConfig,
    seeder: Mutex<StdRng>,
    store: WriteThrough,
}

impl SimulationEngine {
    pub fn new(config: EngineConfig) -> Self {
        let seeder = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            registry: Arc::new(Registry::new()),
            config,
            seeder: Mutex::new(seeder),
            store: WriteThrough::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SimulationStore>) -> Self {
        self.store = WriteThrough::new(Some(store));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers a new `not_started` simulation. The config is not validated.
    pub fn create(&self, config: SimulationConfig) -> Simulation {
        let simulation = Simulation::new(uuid::Uuid::new_v4().to_string(), config, Utc::now());
        {
            let mut inner = self.registry.write();
            inner.insert_simulation(simulation.clone());
            self.store.simulation(&simulation);
        }

        metrics::SIMULATIONS_CREATED.inc();
        info!(simulation = %simulation.id, name = %simulation.name, "simulation created");
        simulation
    }

    /// Starts a `not_started` run and spawns its driver. Running and terminal
    /// runs come back unchanged; a paused run is resumed.
    pub fn start(&self, id: &str) -> Result<Simulation> {
        let mut inner = self.registry.write();
        let current = inner
            .simulation(id)
            .cloned()
            .ok_or_else(|| EngineError::SimulationNotFound(id.to_string()))?;
        match current.status {
            Status::NotStarted => {}
            Status::Paused => {
                drop(inner);
                return self.resume(id);
            }
            _ => return Ok(current),
        }
        let handle = runtime()?;

        let now = Utc::now();
        let Some(simulation) = inner.simulation_mut(id) else {
            return Err(EngineError::SimulationNotFound(id.to_string()));
        };
        simulation.status = Status::Running;
        simulation.start_time.get_or_insert(now);
        simulation.updated_at = now;
        let snapshot = simulation.clone();

        let event = SimulationEvent::system(id, "Simulation started");
        inner.push_event(event.clone());
        let cancel = CancellationToken::new();
        let resume = Arc::new(Notify::new());
        inner.insert_worker(id, WorkerHandle::new(cancel.clone(), resume.clone()));
        self.publish(&snapshot, &[event]);
        drop(inner);

        self.spawn_driver(&handle, id, cancel, resume);
        info!(simulation = %id, "simulation started");
        Ok(snapshot)
    }

    /// Stops a running or paused run. Anything else is returned unchanged.
    pub fn stop(&self, id: &str) -> Result<Simulation> {
        let mut inner = self.registry.write();
        let simulation = inner
            .simulation_mut(id)
            .ok_or_else(|| EngineError::SimulationNotFound(id.to_string()))?;
        if !simulation.status.is_active() {
            return Ok(simulation.clone());
        }

        let now = Utc::now();
        simulation.status = Status::Stopped;
        simulation.end_time = Some(now);
        simulation.updated_at = now;
        let snapshot = simulation.clone();

        if let Some(worker) = inner.take_worker(id) {
            worker.cancel.cancel();
        }
        let event = SimulationEvent::system(id, "Simulation stopped manually");
        inner.push_event(event.clone());
        self.publish(&snapshot, &[event]);
        drop(inner);

        info!(simulation = %id, progress = snapshot.progress, "simulation stopped");
        Ok(snapshot)
    }

    /// Parks a running run's driver. Anything else is returned unchanged.
    pub fn pause(&self, id: &str) -> Result<Simulation> {
        let mut inner = self.registry.write();
        let simulation = inner
            .simulation_mut(id)
            .ok_or_else(|| EngineError::SimulationNotFound(id.to_string()))?;
        if simulation.status != Status::Running {
            return Ok(simulation.clone());
        }

        simulation.status = Status::Paused;
        simulation.updated_at = Utc::now();
        let snapshot = simulation.clone();
        let event = SimulationEvent::system(id, "Simulation paused");
        inner.push_event(event.clone());
        self.publish(&snapshot, &[event]);
        drop(inner);

        info!(simulation = %id, progress = snapshot.progress, "simulation paused");
        Ok(snapshot)
    }

    /// Wakes a paused run's driver, spawning a new one if none is attached.
    /// Anything other than `paused` is returned unchanged.
    pub fn resume(&self, id: &str) -> Result<Simulation> {
        let mut inner = self.registry.write();
        let current = inner
            .simulation(id)
            .cloned()
            .ok_or_else(|| EngineError::SimulationNotFound(id.to_string()))?;
        if current.status != Status::Paused {
            return Ok(current);
        }
        let respawn = match inner.worker(id) {
            Some(worker) => {
                worker.resume.notify_one();
                None
            }
            None => {
                let cancel = CancellationToken::new();
                let resume = Arc::new(Notify::new());
                Some((runtime()?, cancel, resume))
            }
        };

        let Some(simulation) = inner.simulation_mut(id) else {
            return Err(EngineError::SimulationNotFound(id.to_string()));
        };
        simulation.status = Status::Running;
        simulation.updated_at = Utc::now();
        let snapshot = simulation.clone();
        let event = SimulationEvent::system(id, "Simulation resumed");
        inner.push_event(event.clone());
        if let Some((_, cancel, resume)) = &respawn {
            inner.insert_worker(id, WorkerHandle::new(cancel.clone(), resume.clone()));
        }
        self.publish(&snapshot, &[event]);
        drop(inner);

        if let Some((handle, cancel, resume)) = respawn {
            self.spawn_driver(&handle, id, cancel, resume);
        }
        info!(simulation = %id, progress = snapshot.progress, "simulation resumed");
        Ok(snapshot)
    }

    pub fn get(&self, id: &str) -> Result<Simulation> {
        self.registry
            .read()
            .simulation(id)
            .cloned()
            .ok_or_else(|| EngineError::SimulationNotFound(id.to_string()))
    }

    /// Snapshot of every simulation, oldest first.
    pub fn list(&self) -> Vec<Simulation> {
        let mut simulations: Vec<Simulation> = self.registry.read().simulations().cloned().collect();
        simulations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        simulations
    }

    pub fn status(&self, id: &str) -> Result<SimulationStatus> {
        let inner = self.registry.read();
        let simulation = inner
            .simulation(id)
            .ok_or_else(|| EngineError::SimulationNotFound(id.to_string()))?;

        let runtime = match simulation.start_time {
            Some(start) => format_runtime(simulation.end_time.unwrap_or_else(Utc::now) - start),
            None => format_runtime(chrono::Duration::zero()),
        };
        Ok(SimulationStatus {
            id: simulation.id.clone(),
            status: simulation.status,
            runtime,
            threats_detected: simulation.threats_detected,
            compromised_resources: inner.compromised_count(id),
            progress: simulation.progress,
        })
    }

    pub fn events(&self, id: &str) -> Result<Vec<SimulationEvent>> {
        let inner = self.registry.read();
        if !inner.contains(id) {
            return Err(EngineError::SimulationNotFound(id.to_string()));
        }
        Ok(inner.events(id).to_vec())
    }

    /// The last `limit` events, oldest first.
    pub fn recent_events(&self, id: &str, limit: usize) -> Result<Vec<SimulationEvent>> {
        let inner = self.registry.read();
        if !inner.contains(id) {
            return Err(EngineError::SimulationNotFound(id.to_string()));
        }
        let events = inner.events(id);
        Ok(events[events.len().saturating_sub(limit)..].to_vec())
    }

    pub fn affected_resources(&self, id: &str) -> Result<Vec<AffectedResource>> {
        let inner = self.registry.read();
        if !inner.contains(id) {
            return Err(EngineError::SimulationNotFound(id.to_string()));
        }
        Ok(inner.resources(id).to_vec())
    }

    pub fn add_affected_resource(&self, resource: AffectedResource) -> Result<()> {
        let mut inner = self.registry.write();
        inner.add_resource(resource.clone())?;
        self.store.resource(&resource);
        Ok(())
    }

    pub fn append_event(&self, event: SimulationEvent) -> Result<()> {
        {
            let mut inner = self.registry.write();
            inner.append_event(event.clone())?;
            self.store.events([&event]);
            if event.event_type == EventType::Exploitation {
                if let Some(simulation) = inner.simulation(&event.simulation_id) {
                    self.store.simulation(simulation);
                }
            }
        }
        metrics::SIMULATION_EVENTS
            .with_label_values(&[event.severity.as_str()])
            .inc();
        Ok(())
    }

    /// Raises a resource's status; lower targets are ignored.
    pub fn update_resource_status(
        &self,
        simulation_id: &str,
        resource_id: &str,
        status: ResourceStatus,
    ) -> Result<Option<AffectedResource>> {
        let mut inner = self.registry.write();
        let changed = inner
            .escalate_resource(simulation_id, resource_id, status)?
            .cloned();
        if let Some(resource) = &changed {
            self.store.resource(resource);
        }
        Ok(changed)
    }

    pub fn active_drivers(&self) -> usize {
        self.registry.read().worker_count()
    }

    /// Cancels every live driver and waits for its task to finish.
    pub async fn shutdown(&self) {
        let workers = self.registry.write().drain_workers();
        let count = workers.len();
        for (_, worker) in &workers {
            worker.cancel.cancel();
        }
        for (id, worker) in workers {
            if let Some(task) = worker.task {
                if let Err(e) = task.await {
                    warn!(simulation = %id, error = %e, "driver task failed during shutdown");
                }
            }
        }
        info!(drivers = count, "simulation engine shut down");
    }

    fn spawn_driver(&self, handle: &Handle, id: &str, cancel: CancellationToken, resume: Arc<Notify>) {
        let driver = PhaseDriver::new(self.registry.clone(), id, self.config.clone(), self.driver_rng())
            .with_store(self.store.clone());
        let task = handle.spawn(driver.run(cancel, resume));

        // The run may already have been stopped; then the task just winds down.
        let mut inner = self.registry.write();
        if let Some(worker) = inner.worker_mut(id) {
            if !worker.cancel.is_cancelled() && worker.task.is_none() {
                worker.task = Some(task);
            }
        }
    }

    fn driver_rng(&self) -> StdRng {
        let mut seeder = self.seeder.lock().unwrap_or_else(PoisonError::into_inner);
        StdRng::seed_from_u64(seeder.random())
    }

    /// Called with the registry write guard held.
    fn publish(&self, simulation: &Simulation, events: &[SimulationEvent]) {
        for event in events {
            metrics::SIMULATION_EVENTS
                .with_label_values(&[event.severity.as_str()])
                .inc();
        }
        self.store.simulation(simulation);
        self.store.events(events);
    }
}

fn runtime() -> Result<Handle> {
    Handle::try_current()
        .map_err(|e| EngineError::Internal(format!("no async runtime to host the phase driver: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn engine() -> SimulationEngine {
        SimulationEngine::new(EngineConfig {
            seed: Some(7),
            ..EngineConfig::default()
        })
    }

    fn descriptions(engine: &SimulationEngine, id: &str) -> Vec<String> {
        engine
            .events(id)
            .unwrap()
            .into_iter()
            .map(|e| e.description)
            .collect()
    }

    #[test]
    fn test_create_registers_fresh_simulation() {
        let engine = engine();
        let a = engine.create(SimulationConfig::named("Test"));
        let b = engine.create(SimulationConfig::named("Test"));

        assert_ne!(a.id, b.id);
        assert!(!a.id.is_empty());
        assert_eq!(a.status, Status::NotStarted);
        assert_eq!(a.progress, 0.0);
        assert!(engine.events(&a.id).unwrap().is_empty());
        assert!(engine.affected_resources(&a.id).unwrap().is_empty());
        assert_eq!(engine.list().len(), 2);
    }

    #[test]
    fn test_list_is_oldest_first() {
        let engine = engine();
        let mut created = Vec::new();
        for name in ["first", "second", "third"] {
            created.push(engine.create(SimulationConfig::named(name)).id);
            std::thread::sleep(Duration::from_millis(2));
        }
        let listed: Vec<String> = engine.list().into_iter().map(|s| s.id).collect();
        assert_eq!(listed, created);
    }

    #[test]
    fn test_start_without_runtime_is_internal_error() {
        let engine = engine();
        let sim = engine.create(SimulationConfig::named("Test"));

        let err = engine.start(&sim.id).unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
        assert_eq!(engine.get(&sim.id).unwrap().status, Status::NotStarted);
        assert_eq!(engine.active_drivers(), 0);
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let engine = engine();
        assert!(engine.get("missing").unwrap_err().is_not_found());
        assert!(engine.status("missing").unwrap_err().is_not_found());
        assert!(engine.events("missing").unwrap_err().is_not_found());
        assert!(engine.affected_resources("missing").unwrap_err().is_not_found());
        assert!(engine.stop("missing").unwrap_err().is_not_found());
        assert!(engine.pause("missing").unwrap_err().is_not_found());
        assert!(engine.resume("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_status_of_unstarted_run() {
        let engine = engine();
        let sim = engine.create(SimulationConfig::named("Test"));
        let status = engine.status(&sim.id).unwrap();
        assert_eq!(status.runtime, "00:00:00");
        assert_eq!(status.compromised_resources, 0);
        assert_eq!(status.status, Status::NotStarted);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let engine = engine();
        let sim = engine.create(SimulationConfig::named("Test"));
        let before = Utc::now();

        let started = engine.start(&sim.id).unwrap();
        assert_eq!(started.status, Status::Running);
        assert!(started.start_time.unwrap() >= before);

        let again = engine.start(&sim.id).unwrap();
        assert_eq!(again.start_time, started.start_time);
        assert_eq!(engine.active_drivers(), 1);
        assert_eq!(descriptions(&engine, &sim.id), vec!["Simulation started"]);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_is_terminal() {
        let engine = engine();
        let sim = engine.create(SimulationConfig::named("Test"));
        engine.start(&sim.id).unwrap();

        let stopped = engine.stop(&sim.id).unwrap();
        assert_eq!(stopped.status, Status::Stopped);
        assert!(stopped.end_time.is_some());
        assert_eq!(engine.active_drivers(), 0);

        let again = engine.stop(&sim.id).unwrap();
        assert_eq!(again.end_time, stopped.end_time);
        let restarted = engine.start(&sim.id).unwrap();
        assert_eq!(restarted.status, Status::Stopped);
        assert_eq!(
            descriptions(&engine, &sim.id),
            vec!["Simulation started", "Simulation stopped manually"]
        );
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let engine = engine();
        let sim = engine.create(SimulationConfig::named("Test"));
        let unchanged = engine.stop(&sim.id).unwrap();
        assert_eq!(unchanged.status, Status::NotStarted);
        assert!(unchanged.end_time.is_none());
    }

    #[tokio::test]
    async fn test_pause_resume_round_trip() {
        let engine = engine();
        let sim = engine.create(SimulationConfig::named("Test"));
        engine.start(&sim.id).unwrap();

        assert_eq!(engine.pause(&sim.id).unwrap().status, Status::Paused);
        assert_eq!(engine.pause(&sim.id).unwrap().status, Status::Paused);
        assert_eq!(engine.active_drivers(), 1);

        // Start on a paused run behaves as resume.
        assert_eq!(engine.start(&sim.id).unwrap().status, Status::Running);
        assert_eq!(engine.resume(&sim.id).unwrap().status, Status::Running);
        assert_eq!(
            descriptions(&engine, &sim.id),
            vec!["Simulation started", "Simulation paused", "Simulation resumed"]
        );

        engine.pause(&sim.id).unwrap();
        let stopped = engine.stop(&sim.id).unwrap();
        assert_eq!(stopped.status, Status::Stopped);
        assert!(stopped.end_time.is_some());
    }

    #[tokio::test]
    async fn test_paused_run_does_not_advance() {
        let engine = SimulationEngine::new(EngineConfig {
            tick_interval: Duration::from_millis(5),
            seed: Some(1),
            ..EngineConfig::default()
        });
        let sim = engine.create(SimulationConfig::named("Test"));
        engine.start(&sim.id).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let paused = engine.pause(&sim.id).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(engine.get(&sim.id).unwrap().progress, paused.progress);

        engine.resume(&sim.id).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(engine.get(&sim.id).unwrap().progress > paused.progress);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_recent_events_keeps_tail() {
        let engine = engine();
        let sim = engine.create(SimulationConfig::named("Test"));
        for i in 0..5 {
            engine
                .append_event(SimulationEvent::system(&sim.id, format!("event {i}")))
                .unwrap();
        }
        let tail = engine.recent_events(&sim.id, 2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].description, "event 3");
        assert_eq!(tail[1].description, "event 4");
        assert_eq!(engine.recent_events(&sim.id, 50).unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_compromised_count_in_status() {
        let engine = engine();
        let sim = engine.create(SimulationConfig::named("Test"));
        engine
            .add_affected_resource(AffectedResource {
                id: "resource-1".into(),
                simulation_id: sim.id.clone(),
                name: "File Server".into(),
                resource_type: "server".into(),
                status: ResourceStatus::Vulnerable,
                threat_level: 0.2,
                attack_vector: None,
                vulnerabilities: Vec::new(),
            })
            .unwrap();
        engine
            .update_resource_status(&sim.id, "resource-1", ResourceStatus::Compromised)
            .unwrap();
        engine
            .append_event(SimulationEvent::new(
                &sim.id,
                EventType::Exploitation,
                "Known vulnerability exploited",
                crate::simulation::types::Severity::High,
            ))
            .unwrap();

        let status = engine.status(&sim.id).unwrap();
        assert_eq!(status.compromised_resources, 1);
        assert_eq!(status.threats_detected, 1);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_drivers() {
        let engine = engine();
        for _ in 0..3 {
            let sim = engine.create(SimulationConfig::named("Test"));
            engine.start(&sim.id).unwrap();
        }
        assert_eq!(engine.active_drivers(), 3);
        tokio::time::timeout(Duration::from_secs(2), engine.shutdown())
            .await
            .expect("shutdown should not hang");
        assert_eq!(engine.active_drivers(), 0);
    }
}
