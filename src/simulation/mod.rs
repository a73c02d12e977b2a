pub mod driver;
pub mod engine;
pub mod phases;
pub mod registry;
pub mod types;

pub use driver::{DriverExit, PhaseDriver, Tick, TickReport};
pub use engine::SimulationEngine;
pub use phases::Phase;
pub use registry::Registry;
pub use types::{
    AffectedResource, EventType, ResourceStatus, Severity, Simulation, SimulationConfig,
    SimulationEvent, SimulationStatus, Status,
};
