//! Register recalculation: ask the portal to rebuild its cached session tables before a
//! harvest. Courses flagged `refresh: true` are skipped.

use std::future::Future;
use std::sync::Arc;

use crate::fetch::PortalClient;
use crate::model::Course;
use crate::retry::FetchError;
use crate::scheduler::{run_batches, BatchPlan};

/// Triggers one register recalculation. Returns the portal's confirmation text, if any.
pub trait RegisterRecalc: Send + Sync + 'static {
    fn recalc_register(
        &self,
        course_id: &str,
    ) -> impl Future<Output = Result<Option<String>, FetchError>> + Send;
}

impl RegisterRecalc for PortalClient {
    async fn recalc_register(&self, course_id: &str) -> Result<Option<String>, FetchError> {
        self.recalc(course_id).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshTally {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RefreshTally {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Recalculate every course with `refresh == false`, `plan.batch_size` at a time.
pub async fn refresh_courses<R: RegisterRecalc>(
    client: Arc<R>,
    courses: &[Course],
    plan: &BatchPlan,
) -> RefreshTally {
    let targets: Vec<Course> = courses.iter().filter(|c| !c.refresh).cloned().collect();
    let mut tally = RefreshTally {
        skipped: courses.len() - targets.len(),
        ..RefreshTally::default()
    };
    if targets.is_empty() {
        tracing::info!(skipped = tally.skipped, "no registers to recalculate");
        return tally;
    }
    tracing::info!(
        registers = targets.len(),
        batches = plan.batch_count(targets.len()),
        "recalculating registers"
    );

    run_batches(
        targets,
        plan,
        |course| {
            let client = Arc::clone(&client);
            async move { client.recalc_register(&course.id).await }
        },
        |report| {
            for (course, res) in report.items {
                match res {
                    Ok(Ok(msg)) => {
                        tally.succeeded += 1;
                        tracing::info!(
                            course = %course.id,
                            name = %course.name,
                            "recalculated: {}",
                            msg.as_deref().unwrap_or("no confirmation")
                        );
                    }
                    Ok(Err(e)) => {
                        tally.failed += 1;
                        tracing::error!(course = %course.id, name = %course.name, "recalc failed: {}", e);
                    }
                    Err(join) => {
                        tally.failed += 1;
                        tracing::error!(course = %course.id, name = %course.name, "recalc task failed: {}", join);
                    }
                }
            }
        },
    )
    .await;

    tracing::info!(
        succeeded = tally.succeeded,
        failed = tally.failed,
        skipped = tally.skipped,
        "refresh finished"
    );
    tally
}
