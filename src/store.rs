//! Write-through persistence for simulation records.
//!
//! The in-memory registry stays authoritative. A store receives copies while
//! the registry write guard that produced them is still held, so writes for
//! one simulation arrive in registry order. A failing store never fails the
//! engine operation that fed it.

use crate::error::StoreError;
use crate::simulation::types::{AffectedResource, Simulation, SimulationEvent};
use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait SimulationStore: Send + Sync {
    fn save_simulation(&self, simulation: &Simulation) -> StoreResult<()>;
    fn save_event(&self, event: &SimulationEvent) -> StoreResult<()>;
    /// Upserts by `(simulationId, id)`.
    fn save_resource(&self, resource: &AffectedResource) -> StoreResult<()>;

    fn load_simulation(&self, id: &str) -> StoreResult<Option<Simulation>>;
    fn load_simulations(&self) -> StoreResult<Vec<Simulation>>;
    /// Events in the order they were saved.
    fn load_events(&self, simulation_id: &str) -> StoreResult<Vec<SimulationEvent>>;
    fn load_resources(&self, simulation_id: &str) -> StoreResult<Vec<AffectedResource>>;
}

/// sled-backed store: one tree per record kind, JSON values.
///
/// Event keys are `simId/` followed by a big-endian sequence number from
/// `Db::generate_id`, so a prefix scan yields them in save order.
pub struct SledStore {
    db: Db,
    simulations: Tree,
    events: Tree,
    resources: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path.as_ref())?;
        let simulations = db.open_tree("simulations")?;
        let events = db.open_tree("events")?;
        let resources = db.open_tree("resources")?;
        Ok(Self {
            db,
            simulations,
            events,
            resources,
        })
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn prefix(simulation_id: &str) -> Vec<u8> {
        let mut key = simulation_id.as_bytes().to_vec();
        key.push(b'/');
        key
    }

    fn scan<T: serde::de::DeserializeOwned>(tree: &Tree, simulation_id: &str) -> StoreResult<Vec<T>> {
        tree.scan_prefix(Self::prefix(simulation_id))
            .values()
            .map(|value| -> StoreResult<T> { Ok(serde_json::from_slice(&value?)?) })
            .collect()
    }
}

impl SimulationStore for SledStore {
    fn save_simulation(&self, simulation: &Simulation) -> StoreResult<()> {
        let value = serde_json::to_vec(simulation)?;
        self.simulations.insert(simulation.id.as_bytes(), value)?;
        Ok(())
    }

    fn save_event(&self, event: &SimulationEvent) -> StoreResult<()> {
        let mut key = Self::prefix(&event.simulation_id);
        key.extend_from_slice(&self.db.generate_id()?.to_be_bytes());
        self.events.insert(key, serde_json::to_vec(event)?)?;
        Ok(())
    }

    fn save_resource(&self, resource: &AffectedResource) -> StoreResult<()> {
        let mut key = Self::prefix(&resource.simulation_id);
        key.extend_from_slice(resource.id.as_bytes());
        self.resources.insert(key, serde_json::to_vec(resource)?)?;
        Ok(())
    }

    fn load_simulation(&self, id: &str) -> StoreResult<Option<Simulation>> {
        match self.simulations.get(id.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn load_simulations(&self) -> StoreResult<Vec<Simulation>> {
        self.simulations
            .iter()
            .values()
            .map(|value| -> StoreResult<Simulation> { Ok(serde_json::from_slice(&value?)?) })
            .collect()
    }

    fn load_events(&self, simulation_id: &str) -> StoreResult<Vec<SimulationEvent>> {
        Self::scan(&self.events, simulation_id)
    }

    fn load_resources(&self, simulation_id: &str) -> StoreResult<Vec<AffectedResource>> {
        Self::scan(&self.resources, simulation_id)
    }
}

/// Optional store that logs and swallows failures.
#[derive(Clone, Default)]
pub(crate) struct WriteThrough {
    store: Option<Arc<dyn SimulationStore>>,
}

impl WriteThrough {
    pub(crate) fn new(store: Option<Arc<dyn SimulationStore>>) -> Self {
        Self { store }
    }

    pub(crate) fn simulation(&self, simulation: &Simulation) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_simulation(simulation) {
                warn!(simulation = %simulation.id, error = %e, "failed to persist simulation");
            }
        }
    }

    pub(crate) fn events<'a>(&self, events: impl IntoIterator<Item = &'a SimulationEvent>) {
        if let Some(store) = &self.store {
            for event in events {
                if let Err(e) = store.save_event(event) {
                    warn!(simulation = %event.simulation_id, error = %e, "failed to persist event");
                }
            }
        }
    }

    pub(crate) fn resource(&self, resource: &AffectedResource) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_resource(resource) {
                warn!(
                    simulation = %resource.simulation_id,
                    resource = %resource.id,
                    error = %e,
                    "failed to persist resource"
                );
            }
        }
    }
}
