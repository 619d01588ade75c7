//! SQLite-backed checkpoint store (sqlx).
//!
//! One row per student with its completion flag and roster position. Seeded from a
//! JSON roster with [`SqliteRoster::import`]; flag flips are single-row transactions.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::Student;

use super::Progress;

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Current time as Unix seconds (for row timestamps).
fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Handle to the SQLite checkpoint database.
#[derive(Clone)]
pub struct SqliteRoster {
    pool: Pool<Sqlite>,
}

impl SqliteRoster {
    /// Open (or create) the database at `path`. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let db = SqliteRoster { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory database (tests).
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = SqliteRoster { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS units (
                key TEXT PRIMARY KEY,
                portal_id TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                done INTEGER NOT NULL DEFAULT 0,
                position INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert students not yet present, in order, after the existing ones.
    /// Existing rows keep their flag; their portal id and name are refreshed.
    /// Returns the number of new rows.
    pub async fn import(&self, students: &[Student]) -> Result<u64> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        let next: i64 = sqlx::query("SELECT COALESCE(MAX(position), -1) + 1 AS next FROM units")
            .fetch_one(&mut *tx)
            .await?
            .get("next");

        let mut inserted = 0u64;
        for (i, s) in students.iter().enumerate() {
            let r = sqlx::query(
                r#"
                INSERT INTO units (key, portal_id, name, done, position, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(key) DO NOTHING
                "#,
            )
            .bind(&s.key)
            .bind(&s.portal_id)
            .bind(&s.name)
            .bind(s.done)
            .bind(next + i as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            if r.rows_affected() == 0 {
                sqlx::query(
                    r#"
                    UPDATE units
                    SET portal_id = ?1,
                        name = ?2,
                        updated_at = ?3
                    WHERE key = ?4
                    "#,
                )
                .bind(&s.portal_id)
                .bind(&s.name)
                .bind(now)
                .bind(&s.key)
                .execute(&mut *tx)
                .await?;
            } else {
                inserted += 1;
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn load_pending(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query(
            r#"
            SELECT key, portal_id, name, done
            FROM units
            WHERE done = 0
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| Student {
                key: row.get("key"),
                portal_id: row.get("portal_id"),
                name: row.get("name"),
                done: row.get::<i64, _>("done") != 0,
            })
            .collect())
    }

    /// Flip the flag for `key`. Returns false if the key is unknown.
    pub async fn mark_done(&self, key: &str) -> Result<bool> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        let r = sqlx::query(
            r#"
            UPDATE units
            SET done = 1,
                updated_at = ?1
            WHERE key = ?2
            "#,
        )
        .bind(now)
        .bind(key)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(r.rows_affected() > 0)
    }

    pub async fn mark_all_done(&self) -> Result<usize> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE units
            SET done = 1,
                updated_at = ?1
            WHERE done = 0
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() as usize)
    }

    pub async fn progress(&self) -> Result<Progress> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(done), 0) AS done, COUNT(*) AS total
            FROM units
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        let done: i64 = row.get("done");
        let total: i64 = row.get("total");
        Ok(Progress {
            done: done as usize,
            pending: (total - done) as usize,
        })
    }
}
