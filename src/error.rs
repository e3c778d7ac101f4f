//! Environment error taxonomy.
//!
//! Only malformed requests are errors. An action that is legal to submit but
//! fails in the simulation (unreachable target, blocked traffic, unlucky
//! draw) is an ordinary step outcome with a negative reward.

use crate::scenario::ScenarioError;

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// Raised at construction: unsupported mode name, generator minimums
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised at construction when the scenario itself is unusable
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// Raised by `step` for an index outside the action space
    #[error("Invalid action index {index}: action space has {size} actions")]
    InvalidAction { index: usize, size: usize },

    #[error("Not yet implemented: {0}")]
    Unimplemented(&'static str),
}
