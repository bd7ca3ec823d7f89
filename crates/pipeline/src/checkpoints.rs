//! Phase checkpoints keyed by run key.
//!
//! Reads and writes fail open: a run that cannot see its checkpoints simply
//! recomputes phases. Only the explicit clear propagates errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use wavelength_core::phases::Phase;
use wavelength_db::models::checkpoint::{Checkpoint, SaveCheckpoint};
use wavelength_db::store::CheckpointStore;

use crate::error::PipelineResult;

#[derive(Clone)]
pub struct PhaseCheckpoints {
    store: Arc<dyn CheckpointStore>,
}

impl PhaseCheckpoints {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Completed checkpoints for `run_key` by phase number. Empty when the
    /// key is unknown or the store cannot be read.
    pub async fn load(&self, run_key: &str) -> BTreeMap<i32, Checkpoint> {
        match self.store.load_completed(run_key).await {
            Ok(rows) => rows.into_iter().map(|c| (c.phase_number, c)).collect(),
            Err(e) => {
                tracing::warn!(run_key, error = %e, "Failed to load checkpoints, starting fresh");
                BTreeMap::new()
            }
        }
    }

    /// Upsert one phase result. Returns whether it was persisted.
    pub async fn save(&self, input: &SaveCheckpoint) -> bool {
        match self.store.upsert_checkpoint(input).await {
            Ok(()) => {
                tracing::debug!(
                    run_key = %input.run_key,
                    phase = input.phase_number,
                    "Checkpoint saved"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    run_key = %input.run_key,
                    phase = input.phase_number,
                    error = %e,
                    "Failed to save checkpoint"
                );
                false
            }
        }
    }

    pub async fn save_phase(
        &self,
        run_key: &str,
        subject_name: &str,
        phase: Phase,
        output: serde_json::Value,
        runtime_seconds: f64,
        input_config: Option<serde_json::Value>,
    ) -> bool {
        self.save(&SaveCheckpoint {
            run_key: run_key.to_string(),
            subject_name: subject_name.to_string(),
            phase_number: phase.number(),
            phase_name: phase.key().to_string(),
            phase_output: output,
            runtime_seconds,
            input_config,
        })
        .await
    }

    /// Delete every checkpoint for `run_key` so the next run starts fresh.
    pub async fn clear(&self, run_key: &str) -> PipelineResult<u64> {
        let removed = self.store.delete_checkpoints(run_key).await?;
        tracing::info!(run_key, removed, "Checkpoints cleared");
        Ok(removed)
    }
}
