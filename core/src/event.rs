//! Per-step event stream.
//!
//! RULE: Events describe what happened during a committed step.
//! They are output only. Nothing in the engine reads them back,
//! so a consumer that drops or fails to persist them cannot change
//! the course of a run.

use crate::{
    snapshot::StateCounts,
    types::{AgentId, RunId, Step},
};
use serde::{Deserialize, Serialize};

/// Every event emitted during simulation.
/// Variants are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    RunInitialized {
        run_id: RunId,
        seed: u64,
        population: u32,
        initial_infected: u32,
    },
    StepStarted {
        step: Step,
    },
    StepCompleted {
        step: Step,
        counts: StateCounts,
    },

    // ── Health transitions ─────────────────────────
    AgentInfected {
        step: Step,
        agent_id: AgentId,
        infected_neighbours: u32,
    },
    AgentRecovered {
        step: Step,
        agent_id: AgentId,
        illness_steps: u64,
    },
    AgentDied {
        step: Step,
        agent_id: AgentId,
        illness_steps: u64,
    },
}

impl SimEvent {
    /// Stable name, used for the event_type column in event_log.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. } => "run_initialized",
            Self::StepStarted { .. }    => "step_started",
            Self::StepCompleted { .. }  => "step_completed",
            Self::AgentInfected { .. }  => "agent_infected",
            Self::AgentRecovered { .. } => "agent_recovered",
            Self::AgentDied { .. }      => "agent_died",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub step: Step,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}
