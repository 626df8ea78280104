//! Rule traits.
//!
//! RULE: Rules are pure functions of the start-of-step state and the
//! draws they take from the RNG they are handed. They never see the
//! engine's mutable population and never apply their own decisions;
//! the engine commits every decision at once after all agents have
//! been evaluated.

use crate::{
    agent::{Agent, HealthState},
    config::SimConfig,
    grid::{Grid, GridView},
    movement::RandomWalk,
    progression::FixedDuration,
    rng::SimRng,
    transmission::CompoundExposure,
    types::Position,
};

/// Proposes where an agent stands next step.
pub trait MovementRule: Send {
    fn name(&self) -> &'static str;

    /// Must return an in-bounds position.
    fn propose_move(&self, agent: &Agent, grid: &Grid, rng: &mut SimRng) -> Position;
}

/// A positive infection decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Infection {
    /// Infected agents within range at the start of the step.
    pub infected_neighbours: u32,
}

/// Decides whether a susceptible agent is infected this step.
pub trait TransmissionRule: Send {
    fn name(&self) -> &'static str;

    /// Called only for susceptible agents.
    ///
    /// - `agent`:    the agent's start-of-step record
    /// - `position`: where the agent moves to this step
    /// - `view`:     start-of-step positions and states of everyone
    ///
    /// Returns `Some` when the agent becomes infected.
    fn maybe_infect(
        &self,
        agent: &Agent,
        position: Position,
        view: &GridView<'_>,
        rng: &mut SimRng,
    ) -> Option<Infection>;
}

/// Decides how an infected agent's illness develops this step.
pub trait ProgressionRule: Send {
    fn name(&self) -> &'static str;

    /// Called only for infected agents. Returning anything other than
    /// `Infected`, `Recovered` or `Deceased` is a defect the engine
    /// reports as an illegal transition.
    fn advance(&self, agent: &Agent, rng: &mut SimRng) -> HealthState;
}

/// The three rules a run is driven by.
pub struct RuleSet {
    pub movement: Box<dyn MovementRule>,
    pub transmission: Box<dyn TransmissionRule>,
    pub progression: Box<dyn ProgressionRule>,
}

impl RuleSet {
    /// The default rules, parameterized from the run configuration.
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            movement: Box::new(RandomWalk::new(config.max_step, config.edge_policy)),
            transmission: Box::new(CompoundExposure::new(
                config.transmission_probability,
                config.infection_radius,
            )),
            progression: Box::new(FixedDuration::new(
                config.illness_duration,
                config.fatality_probability,
            )),
        }
    }
}
