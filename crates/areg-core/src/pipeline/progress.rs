//! Progress events streamed to the CLI while a harvest runs.

use crate::model::{Hours, RunTally};

/// One observable step of a run. Sent on an unbounded channel so workers never wait on
/// the printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Pending students loaded.
    Loaded { pending: usize, batches: usize },
    StudentStarted { key: String, name: String },
    CourseFinished {
        key: String,
        course: String,
        hours: Hours,
        degraded: bool,
    },
    /// Row appended and flag flipped.
    StudentCommitted { key: String, name: String, total: Hours },
    StudentFailed { key: String, error: String },
    BatchFinished { index: usize, total: usize },
    Finished(RunTally),
}

pub type ProgressSender = tokio::sync::mpsc::UnboundedSender<ProgressEvent>;

/// Send if someone is listening; a closed receiver is not an error.
pub(crate) fn emit(tx: &Option<ProgressSender>, event: ProgressEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}
