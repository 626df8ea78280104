//! Agent-based epidemic simulation on a bounded 2D grid.
//!
//! Agents random-walk across the grid; susceptible agents near infected
//! ones may catch the disease; infections resolve into recovery or
//! death after a fixed illness duration. `SimEngine` owns the
//! population and the RNG stream and hands out immutable
//! `SimulationSnapshot`s after every step.
//!
//! ```no_run
//! use contagion_core::{config::SimConfig, engine::SimEngine};
//!
//! let mut engine = SimEngine::new("demo".into());
//! engine.initialize(SimConfig::default_test())?;
//! let last = engine.run_until(365, |snap| snap.counts().is_outbreak_over())?;
//! println!("{:?}", last.counts().percentages());
//! # Ok::<(), contagion_core::error::SimError>(())
//! ```

pub mod agent;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod grid;
pub mod movement;
pub mod progression;
pub mod recorder;
pub mod rng;
pub mod rule;
pub mod snapshot;
pub mod store;
pub mod transmission;
pub mod types;
