//! Engine lifecycle: NotStarted -> Running -> Finished, and the errors
//! raised when operations are called out of order.

use contagion_core::{
    agent::{Agent, HealthState},
    clock::EnginePhase,
    config::SimConfig,
    engine::SimEngine,
    error::SimError,
    grid::Grid,
    rng::SimRng,
    rule::{MovementRule, ProgressionRule},
    types::Position,
};

fn engine(run_id: &str) -> SimEngine {
    SimEngine::new(run_id.to_string())
}

fn assert_invalid_state<T: std::fmt::Debug>(result: Result<T, SimError>, operation: &str) {
    match result {
        Err(SimError::InvalidState { operation: op, .. }) => assert_eq!(op, operation),
        other => panic!("Expected InvalidState from {operation}(), got {other:?}"),
    }
}

#[test]
fn step_before_initialize_is_rejected() {
    let mut engine = engine("life-early");
    assert_eq!(engine.phase(), EnginePhase::NotStarted);
    assert_invalid_state(engine.step(), "step");
    assert_invalid_state(engine.snapshot(), "snapshot");
    assert_invalid_state(engine.finish(), "finish");
}

#[test]
fn invalid_configuration_changes_nothing() {
    let mut engine = engine("life-invalid");
    let bad = SimConfig { initial_infected_count: 60, population_size: 50, ..SimConfig::default_test() };

    let err = engine.initialize(bad).unwrap_err();
    assert!(
        matches!(err, SimError::InvalidConfiguration { .. }),
        "Expected InvalidConfiguration, got {err:?}"
    );
    assert_eq!(engine.phase(), EnginePhase::NotStarted);
    assert!(engine.seed().is_none(), "No run state should exist after a rejected config");

    // A valid configuration still works afterwards.
    let snapshot = engine.initialize(SimConfig::default_test()).unwrap();
    assert_eq!(snapshot.step(), 0);
    assert_eq!(engine.phase(), EnginePhase::Running);
}

#[test]
fn non_positive_counts_are_rejected() {
    for config in [
        SimConfig { population_size: 0, initial_infected_count: 0, ..SimConfig::default_test() },
        SimConfig { initial_infected_count: 0, ..SimConfig::default_test() },
    ] {
        let err = engine("life-zero").initialize(config).unwrap_err();
        assert!(matches!(err, SimError::InvalidConfiguration { .. }), "got {err:?}");
    }
}

#[test]
fn initialize_twice_is_rejected() {
    let mut engine = engine("life-twice");
    engine.initialize(SimConfig::default_test()).unwrap();
    assert_invalid_state(engine.initialize(SimConfig::default_test()), "initialize");
}

#[test]
fn finished_engine_refuses_to_step_but_keeps_its_snapshot() {
    let mut engine = engine("life-finish");
    engine.initialize(SimConfig::default_test()).unwrap();
    let last = engine.run_steps(5).unwrap();
    engine.finish().unwrap();

    assert_eq!(engine.phase(), EnginePhase::Finished);
    assert_invalid_state(engine.step(), "step");
    assert_invalid_state(engine.finish(), "finish");
    assert_eq!(engine.snapshot().unwrap(), last);
    assert_eq!(engine.current_step(), 5);
}

#[test]
fn finished_engine_cannot_be_restarted() {
    let mut engine = engine("life-no-restart");
    engine.initialize(SimConfig::default_test()).unwrap();
    let last = engine.run_steps(3).unwrap();
    engine.finish().unwrap();

    assert_invalid_state(engine.initialize(SimConfig::default_test()), "initialize");
    assert_invalid_state(engine.run_steps(1), "step");
    assert_invalid_state(engine.run_until(10, |_| false), "step");
    assert_invalid_state(engine.set_movement_rule(Box::new(Stay)), "set_movement_rule");
    assert_invalid_state(engine.set_progression_rule(Box::new(Relapse)), "set_progression_rule");

    assert_eq!(engine.phase(), EnginePhase::Finished);
    assert_eq!(engine.current_step(), 3);
    assert_eq!(engine.snapshot().unwrap(), last, "A rejected call changed the finished run");
}

#[test]
fn step_counter_advances_by_one() {
    let mut engine = engine("life-counter");
    let initial = engine.initialize(SimConfig::default_test()).unwrap();
    assert_eq!(initial.step(), 0);
    for expected in 1..=10 {
        assert_eq!(engine.step().unwrap().step(), expected);
    }
}

#[test]
fn run_until_stops_on_predicate() {
    let mut engine = engine("life-until");
    engine.initialize(SimConfig::default_test()).unwrap();
    let last = engine.run_until(10_000, |snap| snap.counts().is_outbreak_over()).unwrap();
    assert_eq!(last.counts().infected, 0, "run_until returned before the outbreak ended");
    assert!(last.step() < 10_000);
}

struct Stay;

impl MovementRule for Stay {
    fn name(&self) -> &'static str { "stay" }
    fn propose_move(&self, agent: &Agent, _grid: &Grid, _rng: &mut SimRng) -> Position {
        agent.position
    }
}

#[test]
fn rules_can_only_be_replaced_before_initialize() {
    let mut engine = engine("life-rules");
    engine.set_movement_rule(Box::new(Stay)).unwrap();
    let initial = engine.initialize(SimConfig::default_test()).unwrap();
    let after = engine.run_steps(10).unwrap();
    for (a, b) in initial.agents().iter().zip(after.agents()) {
        assert_eq!(a.position, b.position, "Agent {} moved under the Stay rule", a.id);
    }
    assert_invalid_state(engine.set_movement_rule(Box::new(Stay)), "set_movement_rule");
}

/// A broken rule that tries to cure agents back to susceptible.
struct Relapse;

impl ProgressionRule for Relapse {
    fn name(&self) -> &'static str { "relapse" }
    fn advance(&self, _agent: &Agent, _rng: &mut SimRng) -> HealthState {
        HealthState::Susceptible
    }
}

#[test]
fn illegal_transition_is_reported_and_not_committed() {
    let mut engine = engine("life-illegal");
    engine.set_progression_rule(Box::new(Relapse)).unwrap();
    let initial = engine.initialize(SimConfig::default_test()).unwrap();

    let err = engine.step().unwrap_err();
    assert!(
        matches!(
            err,
            SimError::IllegalTransition { from: HealthState::Infected, to: HealthState::Susceptible, .. }
        ),
        "Expected IllegalTransition, got {err:?}"
    );
    assert_eq!(engine.current_step(), 0, "Failed step must not advance the counter");
    assert_eq!(engine.snapshot().unwrap(), initial, "Failed step must not change agents");
}

struct OffTheEdge;

impl MovementRule for OffTheEdge {
    fn name(&self) -> &'static str { "off_the_edge" }
    fn propose_move(&self, _agent: &Agent, grid: &Grid, _rng: &mut SimRng) -> Position {
        Position::new(i64::from(grid.width()), 0)
    }
}

#[test]
fn out_of_bounds_move_is_reported() {
    let mut engine = engine("life-oob");
    engine.set_movement_rule(Box::new(OffTheEdge)).unwrap();
    engine.initialize(SimConfig::default_test()).unwrap();
    let err = engine.step().unwrap_err();
    assert!(matches!(err, SimError::OutOfBounds { agent_id: 0, .. }), "got {err:?}");
    assert_eq!(engine.current_step(), 0);
}

#[test]
fn failed_step_leaves_rng_stream_untouched() {
    // The stream must be where it was before the failed step, so a run
    // that keeps going (with a rule that stops failing) stays on track.
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FailOnce(Arc<AtomicBool>);
    impl MovementRule for FailOnce {
        fn name(&self) -> &'static str { "fail_once" }
        fn propose_move(&self, agent: &Agent, _grid: &Grid, rng: &mut SimRng) -> Position {
            let _ = rng.next_f64();
            if self.0.swap(false, Ordering::SeqCst) {
                Position::new(-1, -1)
            } else {
                agent.position
            }
        }
    }

    let mut flaky = engine("life-flaky");
    flaky.set_movement_rule(Box::new(FailOnce(Arc::new(AtomicBool::new(true))))).unwrap();
    flaky.initialize(SimConfig::default_test()).unwrap();
    assert!(flaky.step().is_err());
    let flaky_after = flaky.run_steps(5).unwrap();

    let mut steady = engine("life-steady");
    steady.set_movement_rule(Box::new(FailOnce(Arc::new(AtomicBool::new(false))))).unwrap();
    steady.initialize(SimConfig::default_test()).unwrap();
    let steady_after = steady.run_steps(5).unwrap();

    assert_eq!(flaky_after, steady_after);
}
