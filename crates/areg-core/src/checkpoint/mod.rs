//! Durable progress: which students are done, and the ledger their rows went to.
//!
//! A student is marked done only after its ledger row was appended. A crash between the
//! two leaves the student pending, so the next run appends a duplicate row rather than
//! losing one.

pub mod json;
pub mod ledger;
pub mod sqlite;

use anyhow::{Context, Result};

use crate::config::{AregConfig, CheckpointBackend};
use crate::model::{Course, Student, SummaryRecord, TargetPeriod};

pub use json::JsonRoster;
pub use ledger::Ledger;
pub use sqlite::SqliteRoster;

/// Done/pending counts for `status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub pending: usize,
}

impl Progress {
    pub fn from_students(students: &[Student]) -> Self {
        let done = students.iter().filter(|s| s.done).count();
        Self {
            done,
            pending: students.len() - done,
        }
    }

    pub fn total(&self) -> usize {
        self.done + self.pending
    }
}

/// Where the completion flags live.
pub enum Roster {
    Json(JsonRoster),
    Sqlite(SqliteRoster),
}

impl Roster {
    /// Open the backend selected in the config.
    pub async fn open(cfg: &AregConfig) -> Result<Self> {
        match cfg.paths.backend {
            CheckpointBackend::Json => Ok(Roster::Json(JsonRoster::open(&cfg.paths.roster).await?)),
            CheckpointBackend::Sqlite => {
                let path = cfg.database_path()?;
                let db = SqliteRoster::open_at(&path)
                    .await
                    .with_context(|| format!("open checkpoint db: {}", path.display()))?;
                Ok(Roster::Sqlite(db))
            }
        }
    }

    pub async fn load_pending(&self) -> Result<Vec<Student>> {
        match self {
            Roster::Json(r) => r.load_pending().await,
            Roster::Sqlite(r) => r.load_pending().await,
        }
    }

    pub async fn mark_done(&self, key: &str) -> Result<bool> {
        match self {
            Roster::Json(r) => r.mark_done(key).await,
            Roster::Sqlite(r) => r.mark_done(key).await,
        }
    }

    pub async fn mark_all_done(&self) -> Result<usize> {
        match self {
            Roster::Json(r) => r.mark_all_done().await,
            Roster::Sqlite(r) => r.mark_all_done().await,
        }
    }

    pub async fn progress(&self) -> Result<Progress> {
        match self {
            Roster::Json(r) => r.progress().await,
            Roster::Sqlite(r) => r.progress().await,
        }
    }
}

/// Roster plus ledger: the store the pipeline commits finished students to.
pub struct Checkpoint {
    roster: Roster,
    ledger: Ledger,
}

impl Checkpoint {
    pub fn new(roster: Roster, ledger: Ledger) -> Self {
        Self { roster, ledger }
    }

    /// Open the configured roster and the ledger for `period`.
    pub async fn open(cfg: &AregConfig, courses: &[Course], period: TargetPeriod) -> Result<Self> {
        let roster = Roster::open(cfg).await?;
        let ledger = Ledger::new(cfg.ledger_path(period), courses);
        Ok(Self::new(roster, ledger))
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Pending students in roster order.
    pub async fn load_pending(&self) -> Result<Vec<Student>> {
        self.roster.load_pending().await
    }

    pub async fn append_result(&self, record: &SummaryRecord) -> Result<()> {
        self.ledger.append(record).await
    }

    pub async fn mark_done(&self, key: &str) -> Result<()> {
        if !self.roster.mark_done(key).await? {
            anyhow::bail!("student {} is not in the roster", key);
        }
        Ok(())
    }

    /// Append the row, then flip the flag. The flag is never flipped if the append failed.
    pub async fn commit(&self, record: &SummaryRecord) -> Result<()> {
        self.append_result(record)
            .await
            .with_context(|| format!("append ledger row for {}", record.key))?;
        self.mark_done(&record.key)
            .await
            .with_context(|| format!("mark {} done", record.key))?;
        Ok(())
    }
}

/// Read the course list (`course_id`, `course_name`, `refresh`).
pub async fn load_courses(path: &std::path::Path) -> Result<Vec<Course>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read course list: {}", path.display()))?;
    let courses: Vec<Course> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse course list: {}", path.display()))?;
    Ok(courses)
}
