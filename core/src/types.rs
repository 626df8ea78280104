//! Shared primitive types used across the entire simulation.

use serde::{Deserialize, Serialize};

/// A simulation step. Step 0 is the initial population.
pub type Step = u64;

/// Stable agent identifier. Agents are numbered `0..population_size`
/// and the id doubles as the agent's index in every snapshot.
pub type AgentId = u32;

/// The canonical run identifier.
pub type RunId = String;

/// An integer cell coordinate on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Per-axis absolute offsets to `other`.
    pub fn abs_delta(&self, other: &Position) -> (u64, u64) {
        (self.x.abs_diff(other.x), self.y.abs_diff(other.y))
    }
}
