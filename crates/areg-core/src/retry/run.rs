//! Retry loop: fetch until success, a permanent failure, or the attempt budget runs out.

use crate::fetch::SessionFetcher;
use crate::model::{Course, Session, Student};

use super::error::FetchError;
use super::policy::{RetryDecision, RetryPolicy};

/// Result of a retried fetch. Never an error: a failed fetch degrades to no sessions.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub sessions: Vec<Session>,
    pub attempts: u32,
    /// Last error when the contribution was degraded to zero.
    pub degraded: Option<FetchError>,
}

impl FetchOutcome {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Runs `fetcher` for one (student, course) pair under `policy`.
/// On a transient failure, sleeps the fixed delay and tries again.
pub async fn fetch_with_retry<F>(
    fetcher: &F,
    policy: &RetryPolicy,
    student: &Student,
    course: &Course,
) -> FetchOutcome
where
    F: SessionFetcher,
{
    let mut attempt = 1u32;
    loop {
        match fetcher.fetch_sessions(&student.portal_id, &course.id).await {
            Ok(sessions) => {
                return FetchOutcome {
                    sessions,
                    attempts: attempt,
                    degraded: None,
                }
            }
            Err(e) => match policy.decide(attempt, &e) {
                RetryDecision::RetryAfter(d) => {
                    tracing::info!(
                        student = %student.key,
                        course = %course.id,
                        attempt,
                        max_attempts = policy.max_attempts(),
                        error = %e,
                        "retrying in {:?}",
                        d
                    );
                    tokio::time::sleep(d).await;
                    attempt += 1;
                }
                RetryDecision::NoRetry => {
                    tracing::warn!(
                        student = %student.key,
                        course = %course.id,
                        attempts = attempt,
                        error = %e,
                        "giving up on course; counting it as 0.00 hours"
                    );
                    return FetchOutcome {
                        sessions: Vec::new(),
                        attempts: attempt,
                        degraded: Some(e),
                    };
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Hours;
    use crate::retry::ErrorKind;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails `failures` times with `error`, then returns one session.
    struct Flaky {
        failures: u32,
        error: FetchError,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, error: FetchError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl SessionFetcher for Flaky {
        async fn fetch_sessions(
            &self,
            _portal_id: &str,
            _course_id: &str,
        ) -> Result<Vec<Session>, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(self.error.clone());
            }
            let start = NaiveDate::from_ymd_opt(2025, 3, 4)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap();
            Ok(vec![Session {
                start,
                end: None,
                duration: Hours::from_minutes(90).unwrap(),
            }])
        }
    }

    fn student() -> Student {
        Student {
            key: "AB12C3456".into(),
            portal_id: "42".into(),
            name: "Ann Lee".into(),
            done: false,
        }
    }

    fn course() -> Course {
        Course {
            id: "5".into(),
            name: "Math".into(),
            refresh: false,
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures_within_budget() {
        for n in 0..=3 {
            let f = Flaky::new(n, FetchError::timeout("30s"));
            let out = fetch_with_retry(&f, &policy(), &student(), &course()).await;
            assert!(!out.is_degraded(), "N={} should succeed", n);
            assert_eq!(out.sessions.len(), 1);
            assert_eq!(out.attempts, n + 1);
        }
    }

    #[tokio::test]
    async fn exhausted_retries_degrade_to_empty() {
        let f = Flaky::new(4, FetchError::timeout("30s"));
        let out = fetch_with_retry(&f, &policy(), &student(), &course()).await;
        assert!(out.is_degraded());
        assert!(out.sessions.is_empty());
        assert_eq!(out.attempts, 4);
        assert_eq!(f.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let f = Flaky::new(1, FetchError::malformed("login page"));
        let out = fetch_with_retry(&f, &policy(), &student(), &course()).await;
        assert!(out.is_degraded());
        assert_eq!(out.attempts, 1);
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.degraded.unwrap().kind(), ErrorKind::Malformed);
    }
}
