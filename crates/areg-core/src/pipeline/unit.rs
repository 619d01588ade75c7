//! Per-student pipeline: fetch every course concurrently, fold, commit.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::aggregate::{category_total, over_threshold, summarize};
use crate::fetch::SessionFetcher;
use crate::model::{Student, SummaryRecord};
use crate::retry::fetch_with_retry;

use super::error::UnitError;
use super::progress::{emit, ProgressEvent};
use super::Context;

/// Harvest one student and commit the row. The student stays pending on any `Err`.
pub(crate) async fn process_student<F: SessionFetcher>(
    ctx: Arc<Context<F>>,
    student: Student,
) -> Result<SummaryRecord, UnitError> {
    tracing::info!(student = %student.key, name = %student.name, "processing student");
    emit(
        &ctx.progress,
        ProgressEvent::StudentStarted {
            key: student.key.clone(),
            name: student.name.clone(),
        },
    );

    let student = Arc::new(student);
    let mut tasks = JoinSet::new();
    for course in ctx.courses.iter().cloned() {
        let ctx = Arc::clone(&ctx);
        let student = Arc::clone(&student);
        tasks.spawn(async move {
            let outcome =
                fetch_with_retry(ctx.fetcher.as_ref(), &ctx.settings.retry, &student, &course).await;
            (course, outcome)
        });
    }

    let mut sessions = HashMap::with_capacity(ctx.courses.len());
    let mut degraded = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (course, outcome) = joined.map_err(|e| UnitError::Pipeline {
            key: student.key.clone(),
            reason: format!("course task: {}", e),
        })?;

        for s in over_threshold(&outcome.sessions, &ctx.settings.scope) {
            tracing::warn!(
                student = %student.key,
                course = %course.id,
                start = %s.start,
                hours = %s.duration,
                "excluding session longer than the anomaly threshold"
            );
        }
        let hours = category_total(&outcome.sessions, &ctx.settings.scope);
        tracing::debug!(
            student = %student.key,
            course = %course.name,
            hours = %hours,
            attempts = outcome.attempts,
            "course finished"
        );
        emit(
            &ctx.progress,
            ProgressEvent::CourseFinished {
                key: student.key.clone(),
                course: course.name.clone(),
                hours,
                degraded: outcome.is_degraded(),
            },
        );
        if outcome.is_degraded() {
            degraded.push(course.id.clone());
        }
        sessions.insert(course.id, outcome.sessions);
    }

    let record = summarize(&student, &ctx.courses, &sessions, degraded, &ctx.settings.scope);
    tracing::info!(
        student = %record.key,
        total = %record.total,
        degraded = record.degraded.len(),
        "student total"
    );

    ctx.checkpoint
        .commit(&record)
        .await
        .map_err(|source| UnitError::CheckpointWrite {
            key: record.key.clone(),
            source,
        })?;

    tracing::info!(student = %record.key, "row appended and marked done");
    emit(
        &ctx.progress,
        ProgressEvent::StudentCommitted {
            key: record.key.clone(),
            name: record.name.clone(),
            total: record.total,
        },
    );
    Ok(record)
}
