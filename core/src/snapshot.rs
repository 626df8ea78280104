//! Immutable per-step snapshots, the only thing consumers ever see.
//!
//! A snapshot shares its agent records with the engine through an
//! `Arc<[Agent]>`. The slice is never written after construction, so
//! handing it out cannot let a renderer or plotter reach the engine's
//! working state.
//!
//! Deserialized snapshots are checked on the way in: ids must match
//! their index and every agent must stand inside the grid.

use crate::{
    agent::{Agent, HealthState},
    error::SimError,
    types::{AgentId, Position, Step},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRecord")]
pub struct SimulationSnapshot {
    step: Step,
    grid_width: u32,
    grid_height: u32,
    agents: Arc<[Agent]>,
}

/// Unchecked wire form of a snapshot.
#[derive(Deserialize)]
struct SnapshotRecord {
    step: Step,
    grid_width: u32,
    grid_height: u32,
    agents: Vec<Agent>,
}

impl TryFrom<SnapshotRecord> for SimulationSnapshot {
    type Error = SimError;

    fn try_from(raw: SnapshotRecord) -> Result<Self, Self::Error> {
        if raw.grid_width == 0 || raw.grid_height == 0 {
            return Err(SimError::InvalidSnapshot {
                reason: format!("grid dimensions must be positive, got {}x{}", raw.grid_width, raw.grid_height),
            });
        }
        let width = i64::from(raw.grid_width);
        let height = i64::from(raw.grid_height);
        for (index, agent) in raw.agents.iter().enumerate() {
            if agent.id as usize != index {
                return Err(SimError::InvalidSnapshot {
                    reason: format!("agent at index {index} has id {}", agent.id),
                });
            }
            let Position { x, y } = agent.position;
            if !(0..width).contains(&x) || !(0..height).contains(&y) {
                return Err(SimError::InvalidSnapshot {
                    reason: format!("agent {} at ({x}, {y}) is outside the {width}x{height} grid", agent.id),
                });
            }
        }
        Ok(Self::new(raw.step, raw.grid_width, raw.grid_height, raw.agents.into()))
    }
}

/// Flat view of one agent, as exchanged with external collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: AgentId,
    pub x: i64,
    pub y: i64,
    pub health_state: HealthState,
    pub state_age: u64,
}

impl SimulationSnapshot {
    pub(crate) fn new(step: Step, grid_width: u32, grid_height: u32, agents: Arc<[Agent]>) -> Self {
        Self { step, grid_width, grid_height, agents }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn grid_dimensions(&self) -> (u32, u32) {
        (self.grid_width, self.grid_height)
    }

    /// Agents in id order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id as usize)
    }

    pub fn records(&self) -> impl Iterator<Item = AgentRecord> + '_ {
        self.agents.iter().map(|a| AgentRecord {
            agent_id: a.id,
            x: a.position.x,
            y: a.position.y,
            health_state: a.state,
            state_age: a.state_age,
        })
    }

    pub fn counts(&self) -> StateCounts {
        StateCounts::tally(&self.agents)
    }

    /// Row-major cell map for renderers. A cell shows its most severe
    /// occupant (infected, then deceased, recovered, susceptible);
    /// empty cells are `None`.
    pub fn occupancy_grid(&self) -> Vec<Option<HealthState>> {
        let width = self.grid_width as usize;
        let mut cells = vec![None; width * self.grid_height as usize];
        for agent in self.agents.iter() {
            let idx = agent.position.y as usize * width + agent.position.x as usize;
            let cell: &mut Option<HealthState> = &mut cells[idx];
            if cell.map_or(true, |current| severity(agent.state) > severity(current)) {
                *cell = Some(agent.state);
            }
        }
        cells
    }
}

fn severity(state: HealthState) -> u8 {
    match state {
        HealthState::Susceptible => 0,
        HealthState::Recovered => 1,
        HealthState::Deceased => 2,
        HealthState::Infected => 3,
    }
}

/// Number of agents in each health state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub susceptible: u32,
    pub infected: u32,
    pub recovered: u32,
    pub deceased: u32,
}

/// Share of the population in each health state, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatePercentages {
    pub susceptible: f64,
    pub infected: f64,
    pub recovered: f64,
    pub deceased: f64,
}

impl StateCounts {
    pub fn tally(agents: &[Agent]) -> Self {
        let mut counts = Self::default();
        for agent in agents {
            *counts.slot_mut(agent.state) += 1;
        }
        counts
    }

    pub fn get(&self, state: HealthState) -> u32 {
        match state {
            HealthState::Susceptible => self.susceptible,
            HealthState::Infected => self.infected,
            HealthState::Recovered => self.recovered,
            HealthState::Deceased => self.deceased,
        }
    }

    fn slot_mut(&mut self, state: HealthState) -> &mut u32 {
        match state {
            HealthState::Susceptible => &mut self.susceptible,
            HealthState::Infected => &mut self.infected,
            HealthState::Recovered => &mut self.recovered,
            HealthState::Deceased => &mut self.deceased,
        }
    }

    pub fn total(&self) -> u32 {
        self.susceptible + self.infected + self.recovered + self.deceased
    }

    /// No one is infected, so nothing can change health state again.
    pub fn is_outbreak_over(&self) -> bool {
        self.infected == 0
    }

    pub fn percentages(&self) -> StatePercentages {
        let total = f64::from(self.total().max(1));
        let pct = |n: u32| 100.0 * f64::from(n) / total;
        StatePercentages {
            susceptible: pct(self.susceptible),
            infected: pct(self.infected),
            recovered: pct(self.recovered),
            deceased: pct(self.deceased),
        }
    }
}
