//! The bounded 2D grid and neighbourhood queries.
//!
//! `Grid` holds the immutable dimensions and the distance metric chosen
//! for the run. `GridView` is a read-only index of where every agent
//! stood at the start of a step; rules query it, nothing mutates it.

use crate::{
    agent::Agent,
    config::DistanceMetric,
    types::{AgentId, Position},
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    width: u32,
    height: u32,
    metric: DistanceMetric,
}

impl Grid {
    /// Callers validate dimensions first; see `SimConfig::validate`.
    pub fn new(width: u32, height: u32, metric: DistanceMetric) -> Self {
        debug_assert!(width > 0 && height > 0, "grid dimensions must be positive");
        Self { width, height, metric }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn cell_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Euclidean length of the grid's diagonal, corner to corner.
    pub fn diagonal(&self) -> f64 {
        let w = f64::from(self.width - 1);
        let h = f64::from(self.height - 1);
        (w * w + h * h).sqrt()
    }

    pub fn is_in_bounds(&self, position: Position) -> bool {
        (0..i64::from(self.width)).contains(&position.x)
            && (0..i64::from(self.height)).contains(&position.y)
    }

    /// Whether `a` and `b` are within `radius` under this grid's metric.
    /// The boundary is inclusive.
    pub fn within(&self, a: Position, b: Position, radius: f64) -> bool {
        let (dx, dy) = a.abs_delta(&b);
        match self.metric {
            DistanceMetric::Chebyshev => dx.max(dy) as f64 <= radius,
            DistanceMetric::Euclidean => {
                let sq = u128::from(dx) * u128::from(dx) + u128::from(dy) * u128::from(dy);
                sq as f64 <= radius * radius
            }
        }
    }

    /// Row-major cell index; `None` when out of bounds.
    pub fn cell_index(&self, position: Position) -> Option<usize> {
        self.is_in_bounds(position)
            .then(|| (position.y * i64::from(self.width) + position.x) as usize)
    }

    /// Index the given agents by cell for neighbourhood queries.
    pub fn view<'a>(&'a self, agents: &'a [Agent]) -> GridView<'a> {
        let mut cells: HashMap<Position, Vec<AgentId>> = HashMap::new();
        for agent in agents {
            cells.entry(agent.position).or_default().push(agent.id);
        }
        GridView { grid: self, agents, cells }
    }
}

/// Frozen occupancy of the grid at one instant.
pub struct GridView<'a> {
    grid: &'a Grid,
    agents: &'a [Agent],
    cells: HashMap<Position, Vec<AgentId>>,
}

impl<'a> GridView<'a> {
    pub fn grid(&self) -> &Grid {
        self.grid
    }

    pub fn is_in_bounds(&self, position: Position) -> bool {
        self.grid.is_in_bounds(position)
    }

    /// The agent record with the given id. Ids index the population.
    pub fn agent(&self, id: AgentId) -> &'a Agent {
        &self.agents[id as usize]
    }

    pub fn agents(&self) -> &'a [Agent] {
        self.agents
    }

    /// Ids of all agents within `radius` of `position`, except `exclude`.
    /// Sorted ascending.
    pub fn occupants_near(&self, position: Position, radius: f64, exclude: AgentId) -> Vec<AgentId> {
        // Integer offsets never exceed floor(radius) on either axis
        // under both metrics.
        let reach = radius.floor() as i64;
        let x_lo = position.x.saturating_sub(reach).max(0);
        let x_hi = position.x.saturating_add(reach).min(i64::from(self.grid.width) - 1);
        let y_lo = position.y.saturating_sub(reach).max(0);
        let y_hi = position.y.saturating_add(reach).min(i64::from(self.grid.height) - 1);
        if x_lo > x_hi || y_lo > y_hi {
            return Vec::new();
        }

        let box_cells = ((x_hi - x_lo + 1) as u128) * ((y_hi - y_lo + 1) as u128);
        let mut found: Vec<AgentId> = if box_cells > self.agents.len() as u128 {
            // Sparse population relative to the search box: scan agents.
            self.agents
                .iter()
                .filter(|a| a.id != exclude && self.grid.within(position, a.position, radius))
                .map(|a| a.id)
                .collect()
        } else {
            let mut ids = Vec::new();
            for y in y_lo..=y_hi {
                for x in x_lo..=x_hi {
                    let cell = Position::new(x, y);
                    if !self.grid.within(position, cell, radius) {
                        continue;
                    }
                    if let Some(occupants) = self.cells.get(&cell) {
                        ids.extend(occupants.iter().copied().filter(|id| *id != exclude));
                    }
                }
            }
            ids
        };
        found.sort_unstable();
        found
    }
}
