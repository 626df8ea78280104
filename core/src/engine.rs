//! The simulation engine.
//!
//! EXECUTION ORDER within a step (fixed, documented, never reordered):
//!   for each agent, in ascending id order:
//!     1. Movement      (MovementRule, every state but deceased)
//!     2. Transmission  (TransmissionRule, susceptible agents only)
//!     3. Progression   (ProgressionRule, infected agents only)
//!
//! RULES:
//!   - Every rule reads ONLY the start-of-step population. No agent's
//!     new position or state is visible to any other agent until the
//!     whole step commits.
//!   - All randomness flows through the engine's single SimRng.
//!   - A step either commits completely or not at all: the population
//!     and the RNG stream are replaced together at the end.
//!   - Consumers receive snapshots, never the working state.

use crate::{
    agent::{Agent, HealthState},
    clock::{EnginePhase, SimClock},
    config::SimConfig,
    error::{SimError, SimResult},
    event::SimEvent,
    grid::Grid,
    rng::SimRng,
    rule::{MovementRule, ProgressionRule, RuleSet, TransmissionRule},
    snapshot::{SimulationSnapshot, StateCounts},
    types::{AgentId, Position, RunId, Step},
};
use std::sync::Arc;

/// Everything that exists only once a run has been initialized.
struct RunState {
    config: SimConfig,
    grid: Grid,
    rng: SimRng,
    rules: RuleSet,
    agents: Arc<[Agent]>,
}

/// Rules registered before `initialize`; unset slots fall back to the
/// defaults built from the configuration.
#[derive(Default)]
struct RuleOverrides {
    movement: Option<Box<dyn MovementRule>>,
    transmission: Option<Box<dyn TransmissionRule>>,
    progression: Option<Box<dyn ProgressionRule>>,
}

pub struct SimEngine {
    pub run_id: RunId,
    clock: SimClock,
    overrides: RuleOverrides,
    run: Option<RunState>,
    last_events: Vec<SimEvent>,
}

impl SimEngine {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            clock: SimClock::new(),
            overrides: RuleOverrides::default(),
            run: None,
            last_events: Vec::new(),
        }
    }

    // ── Rule registration (before initialize only) ─────────────

    pub fn set_movement_rule(&mut self, rule: Box<dyn MovementRule>) -> SimResult<()> {
        self.require_phase(EnginePhase::NotStarted, "set_movement_rule")?;
        self.overrides.movement = Some(rule);
        Ok(())
    }

    pub fn set_transmission_rule(&mut self, rule: Box<dyn TransmissionRule>) -> SimResult<()> {
        self.require_phase(EnginePhase::NotStarted, "set_transmission_rule")?;
        self.overrides.transmission = Some(rule);
        Ok(())
    }

    pub fn set_progression_rule(&mut self, rule: Box<dyn ProgressionRule>) -> SimResult<()> {
        self.require_phase(EnginePhase::NotStarted, "set_progression_rule")?;
        self.overrides.progression = Some(rule);
        Ok(())
    }

    // ── Lifecycle ──────────────────────────────────────────────

    /// Validate `config`, scatter the population and seed the initial
    /// cases. Nothing is changed unless this returns `Ok`.
    pub fn initialize(&mut self, config: SimConfig) -> SimResult<SimulationSnapshot> {
        self.require_phase(EnginePhase::NotStarted, "initialize")?;
        config.validate()?;

        let seed = match config.rng_seed {
            Some(seed) => seed,
            None => {
                let seed = SimRng::entropy_seed();
                log::info!("run={} no rng_seed configured, drew seed {seed}", self.run_id);
                seed
            }
        };
        let mut rng = SimRng::new(seed);
        let grid = Grid::new(config.grid_width, config.grid_height, config.distance_metric);
        let agents = scatter_population(&config, &mut rng);

        let defaults = RuleSet::from_config(&config);
        let overrides = std::mem::take(&mut self.overrides);
        let rules = RuleSet {
            movement: overrides.movement.unwrap_or(defaults.movement),
            transmission: overrides.transmission.unwrap_or(defaults.transmission),
            progression: overrides.progression.unwrap_or(defaults.progression),
        };

        log::info!(
            "run={} initialized: population={} infected={} grid={}x{} metric={:?} edge={:?} seed={seed} rules=[{}, {}, {}]",
            self.run_id,
            config.population_size,
            config.initial_infected_count,
            config.grid_width,
            config.grid_height,
            config.distance_metric,
            config.edge_policy,
            rules.movement.name(),
            rules.transmission.name(),
            rules.progression.name(),
        );

        self.last_events = vec![SimEvent::RunInitialized {
            run_id: self.run_id.clone(),
            seed,
            population: config.population_size,
            initial_infected: config.initial_infected_count,
        }];
        self.run = Some(RunState {
            config,
            grid,
            rng,
            rules,
            agents: agents.into(),
        });
        self.clock.start();
        self.snapshot()
    }

    /// Advance one step. This is the core simulation step.
    pub fn step(&mut self) -> SimResult<SimulationSnapshot> {
        self.require_phase(EnginePhase::Running, "step")?;
        let step = self.clock.next_step();
        let run = self.run.as_mut().ok_or(SimError::InvalidState {
            operation: "step",
            phase: self.clock.phase,
        })?;

        // Work on a copy of the stream so a failed step leaves it untouched.
        let mut rng = run.rng.clone();
        let (next, mut events) = advance_population(run, step, &mut rng)?;
        let counts = StateCounts::tally(&next);
        events.push(SimEvent::StepCompleted { step, counts });

        run.agents = next.into();
        run.rng = rng;
        self.clock.advance();
        self.last_events = events;

        log::debug!(
            "step={step} S={} I={} R={} D={}",
            counts.susceptible,
            counts.infected,
            counts.recovered,
            counts.deceased
        );
        self.snapshot()
    }

    /// End the run. Snapshots stay readable; further steps are rejected.
    pub fn finish(&mut self) -> SimResult<()> {
        self.require_phase(EnginePhase::Running, "finish")?;
        self.clock.finish();
        log::info!("run={} finished at step {}", self.run_id, self.clock.current_step);
        Ok(())
    }

    /// Run `n` steps and return the last snapshot.
    pub fn run_steps(&mut self, n: u64) -> SimResult<SimulationSnapshot> {
        let mut snapshot = self.snapshot()?;
        for _ in 0..n {
            snapshot = self.step()?;
        }
        Ok(snapshot)
    }

    /// Step until `stop` holds for the latest snapshot or `max_steps`
    /// steps have run. The predicate is checked before the first step.
    pub fn run_until<F>(&mut self, max_steps: u64, mut stop: F) -> SimResult<SimulationSnapshot>
    where
        F: FnMut(&SimulationSnapshot) -> bool,
    {
        let mut snapshot = self.snapshot()?;
        for _ in 0..max_steps {
            if stop(&snapshot) {
                break;
            }
            snapshot = self.step()?;
        }
        Ok(snapshot)
    }

    // ── Queries ────────────────────────────────────────────────

    /// The snapshot for the current step.
    pub fn snapshot(&self) -> SimResult<SimulationSnapshot> {
        let run = self.run.as_ref().ok_or(SimError::InvalidState {
            operation: "snapshot",
            phase: self.clock.phase,
        })?;
        Ok(SimulationSnapshot::new(
            self.clock.current_step,
            run.grid.width(),
            run.grid.height(),
            Arc::clone(&run.agents),
        ))
    }

    pub fn phase(&self) -> EnginePhase {
        self.clock.phase
    }

    pub fn current_step(&self) -> Step {
        self.clock.current_step
    }

    /// The seed actually in use, including one drawn for an unseeded run.
    pub fn seed(&self) -> Option<u64> {
        self.run.as_ref().map(|r| r.rng.seed())
    }

    pub fn config(&self) -> Option<&SimConfig> {
        self.run.as_ref().map(|r| &r.config)
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.run.as_ref().map(|r| &r.grid)
    }

    /// Events emitted by the most recent `initialize` or `step`.
    pub fn last_events(&self) -> &[SimEvent] {
        &self.last_events
    }

    fn require_phase(&self, expected: EnginePhase, operation: &'static str) -> SimResult<()> {
        if self.clock.phase != expected {
            return Err(SimError::InvalidState {
                operation,
                phase: self.clock.phase,
            });
        }
        Ok(())
    }
}

/// Uniform random scatter, then a partial Fisher-Yates shuffle to pick
/// exactly `initial_infected_count` distinct agents to infect.
fn scatter_population(config: &SimConfig, rng: &mut SimRng) -> Vec<Agent> {
    let width = u64::from(config.grid_width);
    let height = u64::from(config.grid_height);
    let mut agents: Vec<Agent> = (0..config.population_size)
        .map(|id| {
            let x = rng.below(width) as i64;
            let y = rng.below(height) as i64;
            Agent::new(id, Position::new(x, y), HealthState::Susceptible)
        })
        .collect();

    let n = agents.len();
    let mut ids: Vec<AgentId> = (0..config.population_size).collect();
    for i in 0..config.initial_infected_count as usize {
        let j = i + rng.below((n - i) as u64) as usize;
        ids.swap(i, j);
        agents[ids[i] as usize].state = HealthState::Infected;
    }
    agents
}

/// Evaluate every agent against the frozen start-of-step population.
fn advance_population(
    run: &RunState,
    step: Step,
    rng: &mut SimRng,
) -> SimResult<(Vec<Agent>, Vec<SimEvent>)> {
    let prev = &run.agents;
    let view = run.grid.view(prev);
    let mut next = Vec::with_capacity(prev.len());
    let mut events = vec![SimEvent::StepStarted { step }];

    for agent in prev.iter() {
        let position = run.rules.movement.propose_move(agent, &run.grid, rng);
        if !run.grid.is_in_bounds(position) {
            log::error!(
                "step={step} movement rule '{}' placed agent {} out of bounds at {position:?}",
                run.rules.movement.name(),
                agent.id
            );
            return Err(SimError::OutOfBounds {
                agent_id: agent.id,
                x: position.x,
                y: position.y,
            });
        }

        let next_state = match agent.state {
            HealthState::Susceptible => {
                match run.rules.transmission.maybe_infect(agent, position, &view, rng) {
                    Some(infection) => {
                        events.push(SimEvent::AgentInfected {
                            step,
                            agent_id: agent.id,
                            infected_neighbours: infection.infected_neighbours,
                        });
                        HealthState::Infected
                    }
                    None => HealthState::Susceptible,
                }
            }
            HealthState::Infected => {
                let outcome = run.rules.progression.advance(agent, rng);
                let illness_steps = agent.state_age + 1;
                match outcome {
                    HealthState::Recovered => events.push(SimEvent::AgentRecovered {
                        step,
                        agent_id: agent.id,
                        illness_steps,
                    }),
                    HealthState::Deceased => events.push(SimEvent::AgentDied {
                        step,
                        agent_id: agent.id,
                        illness_steps,
                    }),
                    _ => {}
                }
                outcome
            }
            terminal => terminal,
        };

        let record = agent.advanced(position, next_state).inspect_err(|e| {
            log::error!("step={step} {e}");
        })?;
        next.push(record);
    }

    Ok((next, events))
}
