//! # aegis-sim - Attack Simulation Engine
//!
//! Backend for a cyber-attack training platform. Clients create a simulation
//! against a mock infrastructure, start it, and watch it move through attack
//! phases while it emits security events and compromises resources.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                             aegis-sim                                │
//! │                                                                      │
//! │   HTTP (axum) ──► SimulationEngine ──────────────► SimulationStore   │
//! │                     │  create/start/stop/            (sled, optional │
//! │                     │  pause/resume + queries         write-through) │
//! │                     ▼                                                │
//! │               ┌────────────────────┐     ┌──────────────────────┐    │
//! │               │ Registry (RwLock)  │◄────│ PhaseDriver (1/run)  │    │
//! │               │ sims/events/       │     │ tokio task, ticks on │    │
//! │               │ resources/workers  │     │ an interval          │    │
//! │               └────────────────────┘     └──────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aegis_sim::config::EngineConfig;
//! use aegis_sim::simulation::{SimulationConfig, SimulationEngine};
//!
//! # async fn demo() -> aegis_sim::error::Result<()> {
//! let engine = SimulationEngine::new(EngineConfig::default());
//! let sim = engine.create(SimulationConfig::named("Red team drill"));
//! engine.start(&sim.id)?;
//! println!("{:?}", engine.status(&sim.id)?);
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod mock;
pub mod simulation;
pub mod store;
pub mod telemetry;

pub use config::{EngineConfig, ServerConfig};
pub use error::{EngineError, Result};
pub use simulation::SimulationEngine;
