//! Fixed-duration illness.
//!
//! An infection lasts exactly `illness_duration` steps. On the step that
//! completes the illness, a single Bernoulli draw with the fatality
//! probability decides between death and recovery. Before that the
//! agent stays infected and no draw is taken.

use crate::{
    agent::{Agent, HealthState},
    rng::SimRng,
    rule::ProgressionRule,
};

#[derive(Debug, Clone, Copy)]
pub struct FixedDuration {
    duration: u32,
    fatality: f64,
}

impl FixedDuration {
    pub fn new(duration: u32, fatality: f64) -> Self {
        Self { duration, fatality }
    }

    /// Whether this step completes the agent's illness.
    /// `state_age` counts completed steps, so this step is the
    /// `state_age + 1`-th spent infected.
    pub fn resolves_now(&self, agent: &Agent) -> bool {
        agent.state_age + 1 >= u64::from(self.duration)
    }
}

impl ProgressionRule for FixedDuration {
    fn name(&self) -> &'static str {
        "fixed_duration"
    }

    fn advance(&self, agent: &Agent, rng: &mut SimRng) -> HealthState {
        if !self.resolves_now(agent) {
            return HealthState::Infected;
        }
        if rng.chance(self.fatality) {
            HealthState::Deceased
        } else {
            HealthState::Recovered
        }
    }
}
