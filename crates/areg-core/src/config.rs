use anyhow::{Context, Result};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::TargetPeriod;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first one for a transient failure.
    pub max_retries: u32,
    /// Fixed delay in seconds between attempts (e.g. 2.0).
    pub delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_secs: 2.0,
        }
    }
}

/// Checkpoint backend: the JSON roster file itself, or an embedded SQLite database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    #[default]
    Json,
    Sqlite,
}

/// Input and output locations. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// JSON roster (`PALS_ID`, `USER_ID`, `FULLNAME`, `CHECKED`).
    pub roster: PathBuf,
    /// JSON course list (`course_id`, `course_name`, `refresh`).
    pub categories: PathBuf,
    /// Directory holding one `{year}/T{month}_REPORT.csv` ledger per target month.
    pub export_dir: PathBuf,
    #[serde(default)]
    pub backend: CheckpointBackend,
    /// SQLite file used when `backend = "sqlite"`.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            roster: PathBuf::from("base_data.json"),
            categories: PathBuf::from("course_data.json"),
            export_dir: PathBuf::from("export"),
            backend: CheckpointBackend::Json,
            database: None,
        }
    }
}

/// Settings for the `refresh` (recalc) utility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub batch_size: usize,
    pub delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            delay_ms: 500,
            timeout_secs: 300,
        }
    }
}

impl RefreshConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Global configuration loaded from `~/.config/areg/config.toml`.
///
/// Built once at startup and passed by reference; nothing reads the environment after that
/// except [`crate::fetch::Credentials::from_env`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AregConfig {
    /// Portal root, e.g. `https://glow.paclinks.org`.
    pub base_url: String,
    /// Target month (1-12). Required for `run`; may come from the CLI instead.
    #[serde(default)]
    pub month: Option<u32>,
    /// Target year; defaults to the current year when missing.
    #[serde(default)]
    pub year: Option<i32>,
    /// Units processed concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches in milliseconds.
    pub batch_delay_ms: u64,
    /// Per-request timeout for register fetches.
    pub request_timeout_secs: u64,
    /// Sessions longer than this are treated as data-entry artifacts and excluded.
    pub anomaly_threshold_hours: f64,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

impl Default for AregConfig {
    fn default() -> Self {
        Self {
            base_url: "https://glow.paclinks.org".to_string(),
            month: None,
            year: None,
            batch_size: 5,
            batch_delay_ms: 1000,
            request_timeout_secs: 30,
            anomaly_threshold_hours: 8.0,
            retry: None,
            paths: PathsConfig::default(),
            refresh: RefreshConfig::default(),
        }
    }
}

impl AregConfig {
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Anomaly threshold in hundredths of an hour (8.0 → 800).
    pub fn anomaly_threshold_hundredths(&self) -> u64 {
        (self.anomaly_threshold_hours.max(0.0) * 100.0).round() as u64
    }

    /// Resolve the harvest period; the month must be set and valid.
    pub fn target_period(&self) -> Result<TargetPeriod> {
        let month = self
            .month
            .context("target month is not set (config `month` or --month)")?;
        let year = self.year.unwrap_or_else(|| chrono::Local::now().year());
        TargetPeriod::new(year, month)
    }

    /// Ledger path for the target month: `{export_dir}/{year}/T{month}_REPORT.csv`.
    pub fn ledger_path(&self, period: TargetPeriod) -> PathBuf {
        self.paths
            .export_dir
            .join(period.year.to_string())
            .join(format!("T{}_REPORT.csv", period.month))
    }

    /// SQLite file for the sqlite backend; defaults to `areg.db` under the XDG state dir.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.paths.database {
            Some(p) => Ok(p.clone()),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("areg")?;
                Ok(xdg_dirs.get_state_home().join("areg").join("areg.db"))
            }
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("areg")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AregConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Like [`load_or_init`] but at an explicit path (`--config`).
pub fn load_or_init_at(path: &Path) -> Result<AregConfig> {
    if !path.exists() {
        let default_cfg = AregConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AregConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
