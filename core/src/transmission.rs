//! Compound per-neighbour exposure.
//!
//! With `k` infected agents in range, each independently transmitting
//! with probability `p`, the chance of escaping every exposure is
//! `(1 - p)^k`, so the agent is infected with probability
//! `1 - (1 - p)^k`. No contact means no draw.

use crate::{
    agent::{Agent, HealthState},
    grid::GridView,
    rng::SimRng,
    rule::{Infection, TransmissionRule},
    types::Position,
};

#[derive(Debug, Clone, Copy)]
pub struct CompoundExposure {
    probability: f64,
    radius: f64,
}

impl CompoundExposure {
    pub fn new(probability: f64, radius: f64) -> Self {
        Self { probability, radius }
    }

    /// Chance of infection given `k` infected contacts.
    pub fn infection_probability(&self, k: u32) -> f64 {
        if k == 0 {
            return 0.0;
        }
        let escape = (1.0 - self.probability).powi(k.min(i32::MAX as u32) as i32);
        1.0 - escape
    }
}

impl TransmissionRule for CompoundExposure {
    fn name(&self) -> &'static str {
        "compound_exposure"
    }

    fn maybe_infect(
        &self,
        agent: &Agent,
        position: Position,
        view: &GridView<'_>,
        rng: &mut SimRng,
    ) -> Option<Infection> {
        let k = view
            .occupants_near(position, self.radius, agent.id)
            .into_iter()
            .filter(|id| view.agent(*id).state == HealthState::Infected)
            .count() as u32;
        if k == 0 {
            return None;
        }
        rng.chance(self.infection_probability(k))
            .then_some(Infection { infected_neighbours: k })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::DistanceMetric, grid::Grid};

    fn population(states: &[(i64, i64, HealthState)]) -> Vec<Agent> {
        states
            .iter()
            .enumerate()
            .map(|(i, (x, y, s))| Agent::new(i as u32, Position::new(*x, *y), *s))
            .collect()
    }

    #[test]
    fn probability_compounds_instead_of_adding() {
        let rule = CompoundExposure::new(0.4, 1.0);
        assert_eq!(rule.infection_probability(0), 0.0);
        assert!((rule.infection_probability(1) - 0.4).abs() < 1e-12);
        assert!((rule.infection_probability(2) - 0.64).abs() < 1e-12);
        // 0.4 * 5 would be 2.0.
        let p5 = rule.infection_probability(5);
        assert!(p5 < 1.0 && p5 > 0.9, "Expected compounding below 1, got {p5}");
    }

    #[test]
    fn no_infected_contact_means_no_draw() {
        use HealthState::*;
        let agents = population(&[(0, 0, Susceptible), (1, 0, Recovered), (9, 9, Infected)]);
        let grid = Grid::new(10, 10, DistanceMetric::Chebyshev);
        let view = grid.view(&agents);
        let rule = CompoundExposure::new(1.0, 1.0);

        let mut rng = SimRng::new(1);
        let mut untouched = SimRng::new(1);
        assert_eq!(rule.maybe_infect(&agents[0], agents[0].position, &view, &mut rng), None);
        assert_eq!(rng.next_f64().to_bits(), untouched.next_f64().to_bits());
    }

    #[test]
    fn only_infected_neighbours_count() {
        use HealthState::*;
        let agents = population(&[
            (5, 5, Susceptible),
            (5, 6, Infected),
            (6, 5, Infected),
            (4, 4, Deceased),
            (6, 6, Recovered),
        ]);
        let grid = Grid::new(10, 10, DistanceMetric::Chebyshev);
        let view = grid.view(&agents);
        let rule = CompoundExposure::new(1.0, 1.0);
        let mut rng = SimRng::new(2);
        assert_eq!(
            rule.maybe_infect(&agents[0], agents[0].position, &view, &mut rng),
            Some(Infection { infected_neighbours: 2 })
        );
    }

    #[test]
    fn uses_post_move_position() {
        use HealthState::*;
        let agents = population(&[(0, 0, Susceptible), (5, 5, Infected)]);
        let grid = Grid::new(10, 10, DistanceMetric::Chebyshev);
        let view = grid.view(&agents);
        let rule = CompoundExposure::new(1.0, 1.0);
        let mut rng = SimRng::new(3);
        assert!(rule.maybe_infect(&agents[0], Position::new(4, 4), &view, &mut rng).is_some());
        assert!(rule.maybe_infect(&agents[0], Position::new(1, 1), &view, &mut rng).is_none());
    }

    #[test]
    fn zero_probability_never_infects() {
        use HealthState::*;
        let agents = population(&[(3, 3, Susceptible), (3, 3, Infected), (3, 4, Infected)]);
        let grid = Grid::new(10, 10, DistanceMetric::Euclidean);
        let view = grid.view(&agents);
        let rule = CompoundExposure::new(0.0, 5.0);
        let mut rng = SimRng::new(4);
        for _ in 0..1_000 {
            assert!(rule.maybe_infect(&agents[0], agents[0].position, &view, &mut rng).is_none());
        }
    }

    #[test]
    fn observed_rate_matches_compound_probability() {
        use HealthState::*;
        let agents = population(&[(3, 3, Susceptible), (3, 4, Infected), (4, 3, Infected)]);
        let grid = Grid::new(10, 10, DistanceMetric::Chebyshev);
        let view = grid.view(&agents);
        let rule = CompoundExposure::new(0.25, 1.0);
        let mut rng = SimRng::new(0xC0FFEE);

        let trials = 20_000;
        let hits = (0..trials)
            .filter(|_| rule.maybe_infect(&agents[0], agents[0].position, &view, &mut rng).is_some())
            .count();
        let rate = hits as f64 / trials as f64;
        // 1 - 0.75^2 = 0.4375
        assert!((rate - 0.4375).abs() < 0.02, "Observed rate {rate:.4} far from 0.4375");
    }
}
