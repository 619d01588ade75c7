//! Harvest driver.
//!
//! `Init → Loading → Running → Reporting → Done`: load the pending students, run them
//! through the batch scheduler (each student fans out one task per course), commit each
//! finished student, and report how many succeeded and failed.

mod error;
mod progress;
mod unit;

use anyhow::{Context as _, Result};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::aggregate::ScopeRule;
use crate::checkpoint::Checkpoint;
use crate::config::AregConfig;
use crate::fetch::SessionFetcher;
use crate::model::{Course, RunTally, TargetPeriod};
use crate::retry::RetryPolicy;
use crate::scheduler::{run_batches, BatchPlan};

pub use error::UnitError;
pub use progress::{ProgressEvent, ProgressSender};

use progress::emit;

/// Driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Loading,
    Running,
    Reporting,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Init => "init",
            Phase::Loading => "loading",
            Phase::Running => "running",
            Phase::Reporting => "reporting",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Tunables resolved from the config once at startup.
#[derive(Debug, Clone, Copy)]
pub struct HarvestSettings {
    pub retry: RetryPolicy,
    pub scope: ScopeRule,
    pub batch: BatchPlan,
}

impl HarvestSettings {
    pub fn from_config(cfg: &AregConfig, period: TargetPeriod) -> Self {
        Self {
            retry: RetryPolicy::from_config(&cfg.retry_config()),
            scope: ScopeRule::new(period, cfg.anomaly_threshold_hundredths()),
            batch: BatchPlan::new(cfg.batch_size, cfg.batch_delay()),
        }
    }
}

/// Shared, read-only state for every student task.
pub(crate) struct Context<F> {
    pub(crate) fetcher: Arc<F>,
    pub(crate) checkpoint: Arc<Checkpoint>,
    pub(crate) courses: Vec<Course>,
    pub(crate) settings: HarvestSettings,
    pub(crate) progress: Option<ProgressSender>,
}

/// One harvest run over every pending student.
pub struct Harvest<F> {
    ctx: Context<F>,
}

impl<F: SessionFetcher> Harvest<F> {
    /// `Init`: validate the course list. Nothing touches the network before this succeeds.
    pub fn new(
        fetcher: Arc<F>,
        checkpoint: Arc<Checkpoint>,
        courses: Vec<Course>,
        settings: HarvestSettings,
    ) -> Result<Self> {
        if courses.is_empty() {
            anyhow::bail!("course list is empty");
        }
        let mut ids = HashSet::new();
        for c in &courses {
            if !ids.insert(c.id.as_str()) {
                anyhow::bail!("course id {} appears more than once in the course list", c.id);
            }
        }
        tracing::debug!(phase = %Phase::Init, courses = courses.len(), "harvest configured");
        Ok(Self {
            ctx: Context {
                fetcher,
                checkpoint,
                courses,
                settings,
                progress: None,
            },
        })
    }

    /// Stream progress events to `tx` while running.
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.ctx.progress = Some(tx);
        self
    }

    /// Run to completion. Only a failure to read the pending set is an `Err`;
    /// per-student failures are counted in the tally.
    pub async fn run(self) -> Result<RunTally> {
        let ctx = Arc::new(self.ctx);
        let mut phase = Phase::Init;
        let mut tally = RunTally::default();

        enter(&mut phase, Phase::Loading);
        let pending = ctx
            .checkpoint
            .load_pending()
            .await
            .context("load pending students")?;

        if pending.is_empty() {
            tracing::info!("no pending students; everyone has been processed");
            emit(&ctx.progress, ProgressEvent::Loaded { pending: 0, batches: 0 });
        } else {
            enter(&mut phase, Phase::Running);
            let batches = ctx.settings.batch.batch_count(pending.len());
            tracing::info!(pending = pending.len(), batches, "students to process");
            emit(
                &ctx.progress,
                ProgressEvent::Loaded {
                    pending: pending.len(),
                    batches,
                },
            );

            run_batches(
                pending,
                &ctx.settings.batch,
                |student| unit::process_student(Arc::clone(&ctx), student),
                |report| {
                    for (student, res) in report.items {
                        let err = match res {
                            Ok(Ok(record)) => {
                                tally.succeeded += 1;
                                tally.degraded += record.degraded.len();
                                continue;
                            }
                            Ok(Err(e)) => e,
                            Err(join) => UnitError::Pipeline {
                                key: student.key.clone(),
                                reason: join.to_string(),
                            },
                        };
                        tally.failed += 1;
                        tracing::error!(student = %err.key(), "{}; left pending for the next run", err);
                        emit(
                            &ctx.progress,
                            ProgressEvent::StudentFailed {
                                key: err.key().to_string(),
                                error: err.to_string(),
                            },
                        );
                    }
                    emit(
                        &ctx.progress,
                        ProgressEvent::BatchFinished {
                            index: report.index,
                            total: report.total,
                        },
                    );
                },
            )
            .await;
        }

        enter(&mut phase, Phase::Reporting);
        tracing::info!(
            succeeded = tally.succeeded,
            failed = tally.failed,
            degraded = tally.degraded,
            "harvest finished"
        );
        emit(&ctx.progress, ProgressEvent::Finished(tally));

        enter(&mut phase, Phase::Done);
        Ok(tally)
    }
}

fn enter(phase: &mut Phase, next: Phase) {
    tracing::debug!(from = %phase, to = %next, "phase transition");
    *phase = next;
}
