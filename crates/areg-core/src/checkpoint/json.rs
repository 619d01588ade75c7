//! JSON roster file as checkpoint store.
//!
//! The roster is an array of student objects. Only the `CHECKED` flag is ever changed;
//! any other fields an operator keeps in the file are preserved on rewrite.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::model::Student;

use super::Progress;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Path for the temp file: appends `.tmp` (e.g. `base_data.json` → `base_data.json.tmp`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Write `bytes` to a temp file, fsync it, then rename over `path`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let tmp = temp_path(path);
    let mut f = tokio::fs::File::create(&tmp)
        .await
        .with_context(|| format!("create temp file: {}", tmp.display()))?;
    f.write_all(bytes).await.context("write temp file")?;
    f.sync_all().await.context("sync temp file")?;
    drop(f);
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Write a fresh roster (e.g. from `discover`).
pub async fn write_roster(path: &Path, students: &[Student]) -> Result<()> {
    let json = serde_json::to_vec_pretty(students).context("serialize roster")?;
    write_atomic(path, &json).await
}

/// Roster loaded from JSON; the in-memory copy is the one rewritten on every flag flip.
pub struct JsonRoster {
    path: PathBuf,
    records: Mutex<Vec<Value>>,
}

impl JsonRoster {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("read roster: {}", path.display()))?;
        let records: Vec<Value> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse roster: {}", path.display()))?;
        // Validate every entry up front so a bad roster fails before any fetch.
        // A repeated key would be harvested twice but only flagged done once.
        let mut seen: HashMap<String, usize> = HashMap::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            let student = parse_student(r)
                .with_context(|| format!("roster entry {} in {}", i, path.display()))?;
            if let Some(first) = seen.insert(student.key.clone(), i) {
                anyhow::bail!(
                    "duplicate PALS_ID {} in {} (entries {} and {})",
                    student.key,
                    path.display(),
                    first,
                    i
                );
            }
        }
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn students(&self) -> Result<Vec<Student>> {
        let records = self.records.lock().await;
        records.iter().map(parse_student).collect()
    }

    pub async fn load_pending(&self) -> Result<Vec<Student>> {
        Ok(self
            .students()
            .await?
            .into_iter()
            .filter(|s| !s.done)
            .collect())
    }

    /// Flip `CHECKED` for `key` and rewrite the file. Returns false if the key is unknown.
    pub async fn mark_done(&self, key: &str) -> Result<bool> {
        let mut records = self.records.lock().await;
        let mut next = records.clone();
        let mut found = false;
        for r in next.iter_mut() {
            if parse_student(r)?.key == key {
                set_checked(r);
                found = true;
                break;
            }
        }
        if !found {
            return Ok(false);
        }
        self.persist(&next).await?;
        *records = next;
        Ok(true)
    }

    pub async fn mark_all_done(&self) -> Result<usize> {
        let mut records = self.records.lock().await;
        let mut next = records.clone();
        let mut flipped = 0usize;
        for r in next.iter_mut() {
            if !parse_student(r)?.done {
                flipped += 1;
            }
            set_checked(r);
        }
        self.persist(&next).await?;
        *records = next;
        Ok(flipped)
    }

    pub async fn progress(&self) -> Result<Progress> {
        Ok(Progress::from_students(&self.students().await?))
    }

    async fn persist(&self, records: &[Value]) -> Result<()> {
        let json = serde_json::to_vec_pretty(records).context("serialize roster")?;
        write_atomic(&self.path, &json)
            .await
            .with_context(|| format!("write roster: {}", self.path.display()))
    }
}

fn set_checked(record: &mut Value) {
    if let Value::Object(map) = record {
        map.insert("CHECKED".to_string(), Value::Bool(true));
    }
}

fn parse_student(v: &Value) -> Result<Student> {
    Ok(Student::deserialize(v)?)
}
