//! Append-only CSV output ledger (`{year}/T{month}_REPORT.csv`).

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::model::{Course, SummaryRecord};

/// Identity and total columns that precede one column per course.
pub const IDENTITY_COLUMNS: [&str; 4] = ["PALS_ID", "USER_ID", "NAME", "TOTAL_HOURS"];

/// Ledger file. Rows are appended in completion order and never rewritten.
pub struct Ledger {
    path: PathBuf,
    header: Arc<Vec<String>>,
    lock: Mutex<()>,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>, courses: &[Course]) -> Self {
        let header = IDENTITY_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(courses.iter().map(|c| c.name.clone()))
            .collect();
        Self {
            path: path.into(),
            header: Arc::new(header),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, creating the file with a header first if it does not exist.
    pub async fn append(&self, record: &SummaryRecord) -> Result<()> {
        let row = record_fields(record);
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let header = Arc::clone(&self.header);
        tokio::task::spawn_blocking(move || append_blocking(&path, &header, &row))
            .await
            .context("ledger task")?
    }
}

fn record_fields(record: &SummaryRecord) -> Vec<String> {
    let mut row = vec![
        record.key.clone(),
        record.portal_id.clone(),
        record.name.clone(),
        record.total.to_string(),
    ];
    row.extend(record.categories.iter().map(|c| c.hours.to_string()));
    row
}

fn encode_row(fields: &[String]) -> Result<Vec<u8>> {
    let mut w = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    w.write_record(fields).context("encode ledger row")?;
    w.into_inner().map_err(|e| anyhow::anyhow!("encode ledger row: {}", e))
}

fn append_blocking(path: &Path, header: &[String], row: &[String]) -> Result<()> {
    let mut out = Vec::new();
    if !path.exists() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        out.extend(encode_row(header)?);
        tracing::info!("created ledger {}", path.display());
    } else {
        check_header(path, header)?;
        if !ends_with_newline(path)? {
            out.push(b'\n');
        }
    }
    out.extend(encode_row(row)?);

    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open ledger: {}", path.display()))?;
    f.write_all(&out)
        .with_context(|| format!("append to ledger: {}", path.display()))?;
    f.sync_data().context("sync ledger")?;
    Ok(())
}

/// Files written by older tools end without a trailing newline.
fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut f = fs::File::open(path).with_context(|| format!("open ledger: {}", path.display()))?;
    let len = f.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    f.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    f.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn check_header(path: &Path, header: &[String]) -> Result<()> {
    let f = fs::File::open(path).with_context(|| format!("open ledger: {}", path.display()))?;
    let mut first = String::new();
    BufReader::new(f).read_line(&mut first)?;
    let expected = encode_row(header)?;
    if first.trim_end() != String::from_utf8_lossy(&expected).trim_end() {
        tracing::warn!(
            ledger = %path.display(),
            "ledger header does not match the current course list; appending anyway"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryTotal, Hours};
    use tempfile::tempdir;

    fn courses() -> Vec<Course> {
        vec![
            Course {
                id: "1".into(),
                name: "Math".into(),
                refresh: false,
            },
            Course {
                id: "2".into(),
                name: "Art, Design".into(),
                refresh: false,
            },
        ]
    }

    fn record(key: &str, a: u64, b: u64) -> SummaryRecord {
        let categories = vec![
            CategoryTotal {
                course_id: "1".into(),
                course_name: "Math".into(),
                hours: Hours::from_hundredths(a),
            },
            CategoryTotal {
                course_id: "2".into(),
                course_name: "Art, Design".into(),
                hours: Hours::from_hundredths(b),
            },
        ];
        SummaryRecord {
            key: key.into(),
            portal_id: "42".into(),
            name: "Lee, Ann".into(),
            total: Hours::from_hundredths(a + b),
            categories,
            degraded: Vec::new(),
        }
    }

    #[tokio::test]
    async fn creates_header_then_appends_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("export").join("T3_REPORT.csv");
        let ledger = Ledger::new(&path, &courses());
        ledger.append(&record("AA00A0001", 350, 0)).await.unwrap();
        ledger.append(&record("AA00A0002", 125, 75)).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "PALS_ID,USER_ID,NAME,TOTAL_HOURS,Math,\"Art, Design\"",
                "AA00A0001,42,\"Lee, Ann\",3.50,3.50,0.00",
                "AA00A0002,42,\"Lee, Ann\",2.00,1.25,0.75",
            ]
        );
    }

    #[tokio::test]
    async fn repairs_missing_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("T3_REPORT.csv");
        std::fs::write(&path, "PALS_ID,USER_ID,NAME,TOTAL_HOURS,Math,\"Art, Design\"").unwrap();
        let ledger = Ledger::new(&path, &courses());
        ledger.append(&record("AA00A0001", 100, 0)).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with("1.00,1.00,0.00\n"));
    }

    #[tokio::test]
    async fn rows_parse_back_with_csv_reader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("T3_REPORT.csv");
        let ledger = Ledger::new(&path, &courses());
        ledger.append(&record("AA00A0001", 350, 0)).await.unwrap();
        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.len(), 6);
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][3], "3.50");
    }
}
