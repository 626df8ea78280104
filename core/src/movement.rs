//! Bounded random walk.
//!
//! Each step an agent draws an offset per axis, uniform over
//! `[-max_step, +max_step]`, x first then y. Proposals that leave the
//! grid are resolved by the run's edge policy in a single pass, so a
//! move never needs a second draw. Deceased agents stay put and draw
//! nothing.

use crate::{
    agent::{Agent, HealthState},
    config::EdgePolicy,
    grid::Grid,
    rng::SimRng,
    rule::MovementRule,
    types::Position,
};

#[derive(Debug, Clone, Copy)]
pub struct RandomWalk {
    max_step: u32,
    edge: EdgePolicy,
}

impl RandomWalk {
    pub fn new(max_step: u32, edge: EdgePolicy) -> Self {
        Self { max_step, edge }
    }
}

impl MovementRule for RandomWalk {
    fn name(&self) -> &'static str {
        "random_walk"
    }

    fn propose_move(&self, agent: &Agent, grid: &Grid, rng: &mut SimRng) -> Position {
        if agent.state == HealthState::Deceased {
            return agent.position;
        }
        let dx = rng.offset(self.max_step);
        let dy = rng.offset(self.max_step);
        Position::new(
            resolve_axis(agent.position.x + dx, grid.width(), self.edge),
            resolve_axis(agent.position.y + dy, grid.height(), self.edge),
        )
    }
}

/// Map a coordinate back onto `[0, len)`.
pub(crate) fn resolve_axis(val: i64, len: u32, edge: EdgePolicy) -> i64 {
    let n = i64::from(len);
    if (0..n).contains(&val) {
        return val;
    }
    match edge {
        EdgePolicy::Clamp => val.clamp(0, n - 1),
        EdgePolicy::Reflect => {
            if n == 1 {
                return 0;
            }
            // Reflection is periodic with period 2(n - 1):
            // 0, 1, .., n-1, n-2, .., 1, 0, 1, ..
            let period = 2 * (n - 1);
            let r = val.rem_euclid(period);
            if r < n { r } else { period - r }
        }
    }
}
