use crate::{agent::HealthState, clock::EnginePhase, types::AgentId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Invalid state: {operation}() called while engine is {phase:?}")]
    InvalidState {
        operation: &'static str,
        phase: EnginePhase,
    },

    #[error("Illegal transition for agent {agent_id}: {from:?} -> {to:?}")]
    IllegalTransition {
        agent_id: AgentId,
        from: HealthState,
        to: HealthState,
    },

    #[error("Agent {agent_id} moved out of bounds to ({x}, {y})")]
    OutOfBounds { agent_id: AgentId, x: i64, y: i64 },

    #[error("Invalid snapshot: {reason}")]
    InvalidSnapshot { reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration { reason: reason.into() }
    }
}

pub type SimResult<T> = Result<T, SimError>;
