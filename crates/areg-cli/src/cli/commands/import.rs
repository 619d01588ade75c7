//! `areg import` – seed the SQLite checkpoint store from a JSON roster.

use anyhow::{Context, Result};
use areg_core::checkpoint::{JsonRoster, SqliteRoster};
use areg_core::config::{AregConfig, CheckpointBackend};
use std::path::Path;

pub async fn run_import(cfg: &AregConfig, roster: &Path) -> Result<()> {
    let json = JsonRoster::open(roster).await?;
    let students = json.students().await?;
    let db_path = cfg.database_path()?;
    let db = SqliteRoster::open_at(&db_path)
        .await
        .with_context(|| format!("open checkpoint db: {}", db_path.display()))?;
    let added = db.import(&students).await?;
    tracing::info!(added, total = students.len(), db = %db_path.display(), "roster imported");
    println!(
        "Imported {} new student(s) ({} in {}) into {}",
        added,
        students.len(),
        roster.display(),
        db_path.display()
    );
    if cfg.paths.backend != CheckpointBackend::Sqlite {
        println!("Note: set `backend = \"sqlite\"` under [paths] for `run` to use this database.");
    }
    Ok(())
}
