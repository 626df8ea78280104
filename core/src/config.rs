//! Simulation parameters.
//!
//! Every field has a serde default, so a JSON file only needs the
//! values it wants to change. Validation happens in `validate()`, which
//! the engine calls before touching any state.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// How distance between two cells is measured for infection contacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// max(|dx|, |dy|). Radius 1 is the 8-cell Moore neighbourhood.
    #[default]
    Chebyshev,
    /// sqrt(dx² + dy²).
    Euclidean,
}

/// What happens to a random-walk proposal that leaves the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Snap to the nearest in-bounds cell on each axis.
    #[default]
    Clamp,
    /// Mirror back across the boundary cell.
    Reflect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub population_size: u32,
    pub initial_infected_count: u32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub infection_radius: f64,
    /// Per-step, per-infected-neighbour transmission probability `p`.
    pub transmission_probability: f64,
    /// Steps an infection lasts before it resolves.
    pub illness_duration: u32,
    /// Probability `f` that a resolving infection ends in death.
    pub fatality_probability: f64,
    /// `None` makes the run non-reproducible.
    pub rng_seed: Option<u64>,
    pub distance_metric: DistanceMetric,
    pub edge_policy: EdgePolicy,
    /// Largest per-axis random-walk offset.
    pub max_step: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            population_size: 2_500,
            initial_infected_count: 2,
            grid_width: 50,
            grid_height: 50,
            infection_radius: 1.0,
            transmission_probability: 0.1,
            illness_duration: 10,
            fatality_probability: 0.05,
            rng_seed: None,
            distance_metric: DistanceMetric::Chebyshev,
            edge_policy: EdgePolicy::Clamp,
            max_step: 1,
        }
    }
}

impl SimConfig {
    /// Load from a JSON file.
    /// In tests, use SimConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SimConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(config)
    }

    /// Small, seeded configuration for tests.
    pub fn default_test() -> Self {
        Self {
            population_size: 50,
            initial_infected_count: 3,
            grid_width: 10,
            grid_height: 10,
            infection_radius: 1.0,
            transmission_probability: 0.3,
            illness_duration: 5,
            fatality_probability: 0.1,
            rng_seed: Some(42),
            ..Self::default()
        }
    }

    /// Reject malformed or contradictory parameters.
    pub fn validate(&self) -> SimResult<()> {
        if self.population_size == 0 {
            return Err(SimError::invalid_config("population_size must be positive"));
        }
        if self.initial_infected_count == 0 {
            return Err(SimError::invalid_config(
                "initial_infected_count must be positive",
            ));
        }
        if self.initial_infected_count > self.population_size {
            return Err(SimError::invalid_config(format!(
                "initial_infected_count ({}) exceeds population_size ({})",
                self.initial_infected_count, self.population_size
            )));
        }
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(SimError::invalid_config(format!(
                "grid dimensions must be positive, got {}x{}",
                self.grid_width, self.grid_height
            )));
        }
        if !self.infection_radius.is_finite() || self.infection_radius <= 0.0 {
            return Err(SimError::invalid_config(format!(
                "infection_radius must be a positive number, got {}",
                self.infection_radius
            )));
        }
        check_probability("transmission_probability", self.transmission_probability)?;
        check_probability("fatality_probability", self.fatality_probability)?;
        if self.illness_duration == 0 {
            return Err(SimError::invalid_config("illness_duration must be positive"));
        }
        if self.max_step == 0 {
            return Err(SimError::invalid_config("max_step must be positive"));
        }

        if self.infection_radius < 1.0 {
            log::warn!(
                "infection_radius {} < 1: only agents sharing a cell can infect each other",
                self.infection_radius
            );
        }
        Ok(())
    }
}

fn check_probability(name: &str, p: f64) -> SimResult<()> {
    // NaN fails the range check too.
    if !(0.0..=1.0).contains(&p) {
        return Err(SimError::invalid_config(format!(
            "{name} must be in [0, 1], got {p}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejects(config: SimConfig, needle: &str) {
        match config.validate() {
            Err(SimError::InvalidConfiguration { reason }) => assert!(
                reason.contains(needle),
                "Expected reason mentioning '{needle}', got '{reason}'"
            ),
            other => panic!("Expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        SimConfig::default().validate().unwrap();
        SimConfig::default_test().validate().unwrap();
    }

    #[test]
    fn contradictory_counts_are_rejected() {
        rejects(
            SimConfig { initial_infected_count: 51, ..SimConfig::default_test() },
            "exceeds population_size",
        );
        rejects(
            SimConfig { population_size: 0, ..SimConfig::default_test() },
            "population_size",
        );
        rejects(
            SimConfig { initial_infected_count: 0, ..SimConfig::default_test() },
            "initial_infected_count",
        );
    }

    #[test]
    fn out_of_range_parameters_are_rejected() {
        rejects(SimConfig { grid_width: 0, ..SimConfig::default_test() }, "grid");
        rejects(SimConfig { infection_radius: 0.0, ..SimConfig::default_test() }, "radius");
        rejects(
            SimConfig { infection_radius: f64::INFINITY, ..SimConfig::default_test() },
            "radius",
        );
        rejects(
            SimConfig { transmission_probability: 1.5, ..SimConfig::default_test() },
            "transmission_probability",
        );
        rejects(
            SimConfig { fatality_probability: f64::NAN, ..SimConfig::default_test() },
            "fatality_probability",
        );
        rejects(SimConfig { illness_duration: 0, ..SimConfig::default_test() }, "illness");
        rejects(SimConfig { max_step: 0, ..SimConfig::default_test() }, "max_step");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SimConfig = serde_json::from_str(
            r#"{ "population_size": 10, "distance_metric": "euclidean", "rng_seed": 7 }"#,
        )
        .unwrap();
        assert_eq!(config.population_size, 10);
        assert_eq!(config.distance_metric, DistanceMetric::Euclidean);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.grid_width, 50);
        assert_eq!(config.edge_policy, EdgePolicy::Clamp);
    }
}
