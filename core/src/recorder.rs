//! Caller-side history retention.
//!
//! The engine keeps no history. A caller that wants one wraps a
//! `SimStore` in a `RunRecorder` and feeds it each snapshot after the
//! step has committed. Recorder errors are returned to the caller and
//! have no way back into the engine.

use crate::{
    config::SimConfig,
    error::SimResult,
    event::{EventLogEntry, SimEvent},
    snapshot::SimulationSnapshot,
    store::SimStore,
    types::{RunId, Step},
};

/// Full snapshots every 30 steps by default; counts are kept every step.
pub const DEFAULT_SNAPSHOT_INTERVAL: Step = 30;

pub struct RunRecorder {
    run_id: RunId,
    store: SimStore,
    snapshot_interval: Step,
}

impl RunRecorder {
    /// `snapshot_interval = 0` disables full snapshots except step 0.
    pub fn new(run_id: RunId, store: SimStore, snapshot_interval: Step) -> Self {
        Self { run_id, store, snapshot_interval }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn store(&self) -> &SimStore {
        &self.store
    }

    /// Register the run and record its initial state.
    pub fn begin(
        &self,
        config: &SimConfig,
        seed: u64,
        initial: &SimulationSnapshot,
        events: &[SimEvent],
    ) -> SimResult<()> {
        let config_json = serde_json::to_string(config)?;
        self.store
            .insert_run(&self.run_id, seed, env!("CARGO_PKG_VERSION"), &config_json)?;
        self.write_counts_and_events(initial, events)?;
        self.write_snapshot(initial)?;
        log::info!("run={} recording started (seed={seed})", self.run_id);
        Ok(())
    }

    /// Record one committed step.
    pub fn record_step(&self, snapshot: &SimulationSnapshot, events: &[SimEvent]) -> SimResult<()> {
        self.write_counts_and_events(snapshot, events)?;
        if self.snapshot_interval > 0 && snapshot.step().is_multiple_of(self.snapshot_interval) {
            self.write_snapshot(snapshot)?;
            log::debug!("Snapshot saved at step {}", snapshot.step());
        }
        Ok(())
    }

    /// Reload a stored snapshot.
    pub fn load_snapshot(&self, step: Step) -> SimResult<Option<SimulationSnapshot>> {
        match self.store.load_snapshot(&self.run_id, step)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn write_counts_and_events(&self, snapshot: &SimulationSnapshot, events: &[SimEvent]) -> SimResult<()> {
        let step = snapshot.step();
        self.store
            .insert_state_counts(&self.run_id, step, &snapshot.counts())?;
        for event in events {
            let entry = EventLogEntry {
                id:         None,
                run_id:     self.run_id.clone(),
                step,
                event_type: event.type_name().to_string(),
                payload:    serde_json::to_string(event)?,
            };
            self.store.append_event(&entry)?;
        }
        Ok(())
    }

    fn write_snapshot(&self, snapshot: &SimulationSnapshot) -> SimResult<()> {
        let json = serde_json::to_string(snapshot)?;
        self.store.save_snapshot(&self.run_id, snapshot.step(), &json)
    }
}
