//! Simulation clock: owns the step counter and the engine lifecycle.

use crate::types::Step;
use serde::{Deserialize, Serialize};

/// Engine lifecycle. Transitions only move forward:
/// NotStarted -> Running -> Finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    NotStarted,
    Running,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub current_step: Step,
    pub phase: EnginePhase,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            current_step: 0,
            phase: EnginePhase::NotStarted,
        }
    }

    /// The step the next `advance()` will produce.
    pub fn next_step(&self) -> Step {
        self.current_step + 1
    }

    /// Advance one step. Returns the new step number.
    /// Panics unless running; the engine checks the phase first.
    pub fn advance(&mut self) -> Step {
        assert_eq!(self.phase, EnginePhase::Running, "advance() called on a stopped clock");
        self.current_step += 1;
        self.current_step
    }

    pub fn start(&mut self) {
        assert_eq!(self.phase, EnginePhase::NotStarted, "start() called twice");
        self.phase = EnginePhase::Running;
    }

    pub fn finish(&mut self) {
        self.phase = EnginePhase::Finished;
    }

    pub fn is_running(&self) -> bool {
        self.phase == EnginePhase::Running
    }
}
