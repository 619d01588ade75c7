//! Unit-level failure taxonomy.

use thiserror::Error;

/// Why a student was left pending. Never aborts the batch or the run.
#[derive(Debug, Error)]
pub enum UnitError {
    /// Something escaped the per-student pipeline (a course task panicked, etc.).
    #[error("pipeline failed for {key}: {reason}")]
    Pipeline { key: String, reason: String },
    /// The ledger row or the done flag could not be persisted.
    #[error("checkpoint write failed for {key}: {source:#}")]
    CheckpointWrite {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl UnitError {
    pub fn key(&self) -> &str {
        match self {
            UnitError::Pipeline { key, .. } | UnitError::CheckpointWrite { key, .. } => key,
        }
    }
}
