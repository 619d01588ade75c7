//! Fold per-course session lists into one summary row.

use std::collections::HashMap;

use crate::model::{CategoryTotal, Course, Hours, Session, Student, SummaryRecord, TargetPeriod};

/// Which sessions count toward a total.
#[derive(Debug, Clone, Copy)]
pub struct ScopeRule {
    pub period: TargetPeriod,
    /// Sessions longer than this are excluded, not clamped.
    pub threshold: Hours,
}

impl ScopeRule {
    pub fn new(period: TargetPeriod, threshold_hundredths: u64) -> Self {
        Self {
            period,
            threshold: Hours::from_hundredths(threshold_hundredths),
        }
    }

    pub fn in_scope(&self, session: &Session) -> bool {
        self.period.contains(&session.start) && session.duration <= self.threshold
    }
}

/// Sum of in-scope session durations.
pub fn category_total(sessions: &[Session], rule: &ScopeRule) -> Hours {
    sessions
        .iter()
        .filter(|s| rule.in_scope(s))
        .map(|s| s.duration)
        .sum()
}

/// Sessions in the target month that were dropped for exceeding the threshold.
pub fn over_threshold<'a>(
    sessions: &'a [Session],
    rule: &'a ScopeRule,
) -> impl Iterator<Item = &'a Session> + 'a {
    sessions
        .iter()
        .filter(move |s| rule.period.contains(&s.start) && s.duration > rule.threshold)
}

/// Build the summary row for one student.
///
/// `courses` fixes the column order; a course missing from `sessions` contributes 0.00.
/// `degraded` lists course ids whose fetch fell back to an empty result.
pub fn summarize(
    student: &Student,
    courses: &[Course],
    sessions: &HashMap<String, Vec<Session>>,
    degraded: Vec<String>,
    rule: &ScopeRule,
) -> SummaryRecord {
    let categories: Vec<CategoryTotal> = courses
        .iter()
        .map(|c| CategoryTotal {
            course_id: c.id.clone(),
            course_name: c.name.clone(),
            hours: sessions
                .get(&c.id)
                .map(|list| category_total(list, rule))
                .unwrap_or_default(),
        })
        .collect();
    let total = categories.iter().map(|c| c.hours).sum();

    SummaryRecord {
        key: student.key.clone(),
        portal_id: student.portal_id.clone(),
        name: student.name.clone(),
        total,
        categories,
        degraded,
    }
}
