//! Phase/event driver
//!
//! One driver task exists per running simulation. Each tick takes the
//! registry write lock once and, inside that single critical section:
//!
//! 1. bails out if the simulation is gone or no longer `running`
//! 2. adds the configured progress increment
//! 3. enters the next phase if its boundary was reached, emitting an `info`
//!    transition event
//! 4. completes the run at full progress, or
//! 5. with the configured probability emits one randomized in-phase event,
//!    creating a resource if the run has none and possibly escalating it
//!
//! Write-through persistence happens inside the same critical section, so
//! the store receives snapshots in registry order; metrics are recorded after
//! the lock is released. Because the status check and the mutation share one
//! lock acquisition, a `Stop` that wins the lock is never followed by another
//! mutation from this driver.

use crate::config::EngineConfig;
use crate::metrics;
use crate::simulation::phases::{PROGRESS_EPSILON, Phase, RESOURCE_TYPES};
use crate::simulation::registry::{Registry, RegistryInner};
use crate::simulation::types::{
    AffectedResource, ResourceStatus, Severity, Simulation, SimulationEvent, Status,
};
use crate::store::WriteThrough;
use chrono::Utc;
use rand::Rng;
use rand::rngs::StdRng;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Why a driver task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    Cancelled,
    Completed,
    /// Status left `running`/`paused` without the cancel signal firing.
    NotRunning(Status),
    /// The simulation vanished from the registry.
    Missing,
}

/// Everything one tick changed.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub simulation: Simulation,
    pub phase: Phase,
    /// New events in append order.
    pub events: Vec<SimulationEvent>,
    /// Resources created or escalated this tick.
    pub resources: Vec<AffectedResource>,
}

#[derive(Debug)]
pub enum Tick {
    Advanced(TickReport),
    Completed(TickReport),
    /// Status is `paused`; nothing was mutated.
    Paused,
    Halted(DriverExit),
}

pub struct PhaseDriver {
    registry: Arc<Registry>,
    id: String,
    config: EngineConfig,
    rng: StdRng,
    phase: Phase,
    store: WriteThrough,
}

impl PhaseDriver {
    /// Attaches to `id`, resuming from whatever phase its stored progress
    /// implies. Must not be called while holding a registry guard.
    pub fn new(registry: Arc<Registry>, id: impl Into<String>, config: EngineConfig, rng: StdRng) -> Self {
        let id = id.into();
        let phase = registry
            .read()
            .simulation(&id)
            .map(|s| Phase::for_progress(s.progress))
            .unwrap_or(Phase::Staging);
        Self {
            registry,
            id,
            config,
            rng,
            phase,
            store: WriteThrough::default(),
        }
    }

    pub(crate) fn with_store(mut self, store: WriteThrough) -> Self {
        self.store = store;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs one tick synchronously.
    pub fn step(&mut self) -> Tick {
        let registry = self.registry.clone();
        let tick = {
            let mut inner = registry.write();
            let tick = self.advance(&mut inner);
            // Persisted under the same guard so the store sees writes in
            // registry order; a concurrent Stop cannot be overwritten.
            if let Tick::Advanced(report) | Tick::Completed(report) = &tick {
                self.store.events(&report.events);
                for resource in &report.resources {
                    self.store.resource(resource);
                }
                self.store.simulation(&report.simulation);
            }
            tick
        };

        if let Tick::Advanced(report) | Tick::Completed(report) = &tick {
            for event in &report.events {
                metrics::SIMULATION_EVENTS
                    .with_label_values(&[event.severity.as_str()])
                    .inc();
            }
        }
        if let Tick::Completed(_) = &tick {
            metrics::SIMULATIONS_COMPLETED.inc();
        }
        tick
    }

    /// Ticks until cancelled or the run leaves the active states. While
    /// paused the driver parks on `resume` instead of ticking.
    pub async fn run(mut self, cancel: CancellationToken, resume: Arc<Notify>) {
        let period = self.config.tick_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        metrics::ACTIVE_DRIVERS.inc();
        debug!(simulation = %self.id, phase = self.phase.number(), "phase driver started");

        let exit = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break DriverExit::Cancelled,
                _ = ticker.tick() => {}
            }
            if cancel.is_cancelled() {
                break DriverExit::Cancelled;
            }

            match self.step() {
                Tick::Advanced(report) => {
                    debug!(
                        simulation = %self.id,
                        progress = report.simulation.progress,
                        events = report.events.len(),
                        "tick"
                    );
                }
                Tick::Completed(_) => break DriverExit::Completed,
                Tick::Paused => {
                    debug!(simulation = %self.id, "driver parked");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break DriverExit::Cancelled,
                        _ = resume.notified() => ticker.reset(),
                    }
                }
                Tick::Halted(exit) => break exit,
            }
        };

        metrics::ACTIVE_DRIVERS.dec();
        info!(simulation = %self.id, reason = ?exit, phase = self.phase.number(), "phase driver exited");
    }

    fn advance(&mut self, inner: &mut RegistryInner) -> Tick {
        let Some(simulation) = inner.simulation_mut(&self.id) else {
            return Tick::Halted(DriverExit::Missing);
        };
        match simulation.status {
            Status::Running => {}
            Status::Paused => return Tick::Paused,
            other => return Tick::Halted(DriverExit::NotRunning(other)),
        }

        let now = Utc::now();
        let progress = (simulation.progress + self.config.progress_per_tick).min(1.0);
        simulation.progress = progress;
        simulation.updated_at = now;

        // At most one phase per tick, even when the increment spans several.
        let mut events = Vec::new();
        if let Some(next) = self.phase.next() {
            if progress + PROGRESS_EPSILON >= self.phase.exit_threshold() {
                self.phase = next;
                events.push(SimulationEvent::new(
                    &self.id,
                    next.transition_event(),
                    format!("Phase started: {}", next.label()),
                    Severity::Info,
                ));
            }
        }

        let completed = progress + PROGRESS_EPSILON >= 1.0;
        if completed {
            simulation.status = Status::Completed;
            simulation.progress = 1.0;
            simulation.end_time = Some(now);
        }

        for event in &events {
            inner.push_event(event.clone());
        }

        let mut resources = Vec::new();
        if completed {
            inner.take_worker(&self.id);
            let done = SimulationEvent::system(&self.id, "Simulation completed successfully");
            inner.push_event(done.clone());
            events.push(done);
            let results = summarize(inner, &self.id, self.phase);
            if let Some(simulation) = inner.simulation_mut(&self.id) {
                simulation.results = Some(results);
            }
        } else if self.rng.random_bool(probability(self.config.event_probability)) {
            let event = self.random_event(inner, &mut resources);
            inner.push_event(event.clone());
            events.push(event);
        }

        let Some(simulation) = inner.simulation(&self.id).cloned() else {
            return Tick::Halted(DriverExit::Missing);
        };
        let report = TickReport {
            simulation,
            phase: self.phase,
            events,
            resources,
        };
        if completed {
            Tick::Completed(report)
        } else {
            Tick::Advanced(report)
        }
    }

    fn random_event(
        &mut self,
        inner: &mut RegistryInner,
        touched: &mut Vec<AffectedResource>,
    ) -> SimulationEvent {
        if inner.resources(&self.id).is_empty() {
            let resource = self.invent_resource();
            inner.push_resource(resource.clone());
            touched.push(resource);
        }

        let candidates = inner.resources(&self.id);
        let target = &candidates[self.rng.random_range(0..candidates.len())];
        let (resource_id, resource_name) = (target.id.clone(), target.name.clone());

        let profile = self.phase.profile();
        let choice = &profile.choices[self.rng.random_range(0..profile.choices.len())];
        let description = choice.descriptions[self.rng.random_range(0..choice.descriptions.len())];
        let severity = profile.severities[self.rng.random_range(0..profile.severities.len())];

        if let Some((status, chance)) = profile.escalation {
            if self.rng.random_bool(chance) {
                if let Ok(Some(resource)) = inner.escalate_resource(&self.id, &resource_id, status) {
                    let resource = resource.clone();
                    touched.retain(|r| r.id != resource.id);
                    touched.push(resource);
                }
            }
        }

        SimulationEvent::new(&self.id, choice.event_type, description, severity)
            .with_resource(resource_id)
            .with_details(json!({ "resource": resource_name, "phase": self.phase.number() }))
    }

    fn invent_resource(&mut self) -> AffectedResource {
        let resource_type = RESOURCE_TYPES[self.rng.random_range(0..RESOURCE_TYPES.len())];
        AffectedResource {
            id: format!("resource-{:08x}", self.rng.random::<u32>()),
            simulation_id: self.id.clone(),
            name: format!("{}-{}", resource_type, self.rng.random_range(0..100)),
            resource_type: resource_type.to_string(),
            status: ResourceStatus::Vulnerable,
            threat_level: ResourceStatus::Vulnerable.threat_floor(),
            attack_vector: None,
            vulnerabilities: Vec::new(),
        }
    }
}

fn probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

fn summarize(inner: &RegistryInner, id: &str, phase: Phase) -> serde_json::Value {
    let events = inner.events(id);
    let mut by_severity = serde_json::Map::new();
    for severity in Severity::ALL {
        let count = events.iter().filter(|e| e.severity == severity).count();
        by_severity.insert(severity.as_str().to_string(), count.into());
    }
    json!({
        "totalEvents": events.len(),
        "eventsBySeverity": by_severity,
        "threatsDetected": inner.simulation(id).map(|s| s.threats_detected).unwrap_or(0),
        "affectedResources": inner.resources(id).len(),
        "compromisedResources": inner.compromised_count(id),
        "finalPhase": phase.number(),
        "finalPhaseLabel": phase.label(),
    })
}
