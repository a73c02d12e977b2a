//! Error types for the simulation engine and its store.

use thiserror::Error;

/// Failures surfaced by engine operations.
///
/// Illegal lifecycle calls (stopping a finished run, pausing something that
/// is not running) are no-ops, not errors, so there is no transition variant.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("simulation {0} not found")]
    SimulationNotFound(String),

    #[error("resource {resource_id} not found in simulation {simulation_id}")]
    ResourceNotFound {
        simulation_id: String,
        resource_id: String,
    },

    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SimulationNotFound(_) | Self::ResourceNotFound { .. }
        )
    }
}

/// Failures from a [`crate::store::SimulationStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("failed to encode record: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(EngineError::SimulationNotFound("sim".into()).is_not_found());
        assert!(
            EngineError::ResourceNotFound {
                simulation_id: "sim".into(),
                resource_id: "res".into(),
            }
            .is_not_found()
        );
        assert!(!EngineError::Internal("boom".into()).is_not_found());
    }

    #[test]
    fn test_display_names_the_id() {
        let err = EngineError::SimulationNotFound("abc-123".into());
        assert_eq!(err.to_string(), "simulation abc-123 not found");
    }
}
