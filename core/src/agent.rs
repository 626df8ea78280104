//! Agents and their health states.

use crate::{
    error::{SimError, SimResult},
    types::{AgentId, Position},
};
use serde::{Deserialize, Serialize};

/// Compartmental health state.
/// Variants are stable. Never reorder: the discriminant is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Susceptible = 0,
    Infected = 1,
    Recovered = 2,
    Deceased = 3,
}

impl HealthState {
    pub const ALL: [HealthState; 4] = [
        Self::Susceptible,
        Self::Infected,
        Self::Recovered,
        Self::Deceased,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Susceptible => "susceptible",
            Self::Infected => "infected",
            Self::Recovered => "recovered",
            Self::Deceased => "deceased",
        }
    }

    /// S -> I, I -> R and I -> D are the only legal moves.
    pub fn can_transition_to(&self, next: HealthState) -> bool {
        matches!(
            (self, next),
            (Self::Susceptible, Self::Infected)
                | (Self::Infected, Self::Recovered)
                | (Self::Infected, Self::Deceased)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Recovered | Self::Deceased)
    }
}

/// One simulated person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub position: Position,
    pub state: HealthState,
    /// Steps spent in `state` so far. Zero on the step the state was entered.
    pub state_age: u64,
}

impl Agent {
    pub fn new(id: AgentId, position: Position, state: HealthState) -> Self {
        Self { id, position, state, state_age: 0 }
    }

    /// The agent's record for the next step.
    ///
    /// Keeping the same state ages the agent by one step; a change of
    /// state must be legal and resets the age.
    pub fn advanced(&self, position: Position, next: HealthState) -> SimResult<Agent> {
        if next == self.state {
            return Ok(Agent {
                position,
                state_age: self.state_age + 1,
                ..*self
            });
        }
        if !self.state.can_transition_to(next) {
            return Err(SimError::IllegalTransition {
                agent_id: self.id,
                from: self.state,
                to: next,
            });
        }
        Ok(Agent {
            position,
            state: next,
            state_age: 0,
            ..*self
        })
    }
}
