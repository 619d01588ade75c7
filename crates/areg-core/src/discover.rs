//! Build a JSON roster from a course's register overview page.

use anyhow::{Context, Result};
use std::path::Path;

use crate::checkpoint::json::write_roster;
use crate::fetch::PortalClient;
use crate::model::Student;

/// Fetch the overview of `course_id` and write every student found to `out`, all pending.
/// Refuses to replace an existing roster unless `force` is set. Returns the number written.
pub async fn discover_roster(
    client: &PortalClient,
    course_id: &str,
    out: &Path,
    force: bool,
) -> Result<usize> {
    ensure_writable(out, force).await?;
    let students = client
        .discover_students(course_id)
        .await
        .with_context(|| format!("read register overview for course {}", course_id))?;
    tracing::info!(course = %course_id, students = students.len(), "students discovered");
    save_roster(out, &students, force).await
}

async fn ensure_writable(out: &Path, force: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(out).await.unwrap_or(false) {
        anyhow::bail!(
            "{} already exists; pass --force to replace it (completion flags will be reset)",
            out.display()
        );
    }
    Ok(())
}

/// Write a discovered roster. An empty list is an error: it almost always means the
/// session cookies expired and the portal served its login page.
pub async fn save_roster(out: &Path, students: &[Student], force: bool) -> Result<usize> {
    if students.is_empty() {
        anyhow::bail!("no students found; check MOODLE_SESSION and the course id");
    }
    ensure_writable(out, force).await?;
    write_roster(out, students)
        .await
        .with_context(|| format!("write roster: {}", out.display()))?;
    tracing::info!(roster = %out.display(), students = students.len(), "roster written");
    Ok(students.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::JsonRoster;

    fn student(key: &str, portal_id: &str) -> Student {
        Student {
            key: key.into(),
            portal_id: portal_id.into(),
            name: format!("Name {}", key),
            done: false,
        }
    }

    #[tokio::test]
    async fn written_roster_opens_as_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("base_data.json");
        let n = save_roster(&out, &[student("AB12C3456", "7"), student("AB12C3457", "8")], false)
            .await
            .unwrap();
        assert_eq!(n, 2);

        let roster = JsonRoster::open(&out).await.unwrap();
        let pending = roster.load_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].portal_id, "7");
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(raw[0]["PALS_ID"], "AB12C3456");
        assert_eq!(raw[0]["CHECKED"], false);
    }

    #[tokio::test]
    async fn existing_roster_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("base_data.json");
        std::fs::write(&out, "[]").unwrap();
        let students = [student("AB12C3456", "7")];
        assert!(save_roster(&out, &students, false).await.is_err());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "[]");
        assert_eq!(save_roster(&out, &students, true).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_discovery_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("base_data.json");
        assert!(save_roster(&out, &[], false).await.is_err());
        assert!(!out.exists());
    }
}
