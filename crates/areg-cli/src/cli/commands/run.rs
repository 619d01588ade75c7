//! `areg run` – harvest every pending student into the monthly ledger.

use anyhow::Result;
use areg_core::checkpoint::{load_courses, Checkpoint};
use areg_core::config::AregConfig;
use areg_core::fetch::{Credentials, PortalClient};
use areg_core::pipeline::{Harvest, HarvestSettings, ProgressEvent};
use std::sync::Arc;
use std::time::Instant;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOverrides {
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub batch_size: Option<usize>,
}

impl RunOverrides {
    pub fn apply(self, mut cfg: AregConfig) -> AregConfig {
        if let Some(m) = self.month {
            cfg.month = Some(m);
        }
        if let Some(y) = self.year {
            cfg.year = Some(y);
        }
        if let Some(n) = self.batch_size {
            cfg.batch_size = n;
        }
        cfg
    }
}

pub async fn run_harvest(cfg: AregConfig) -> Result<()> {
    // Everything that can be wrong with the inputs fails here, before any request.
    let period = cfg.target_period()?;
    let courses = load_courses(&cfg.paths.categories).await?;
    let credentials = Credentials::from_env()?;
    let client = PortalClient::new(&cfg.base_url, credentials, cfg.request_timeout())?;
    let checkpoint = Checkpoint::open(&cfg, &courses, period).await?;
    let ledger = checkpoint.ledger().path().to_path_buf();
    let settings = HarvestSettings::from_config(&cfg, period);

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
    let harvest = Harvest::new(Arc::new(client), Arc::new(checkpoint), courses, settings)?
        .with_progress(progress_tx);

    println!(
        "Harvesting {}-{:02} into {}",
        period.year,
        period.month,
        ledger.display()
    );
    let started = Instant::now();
    let printer = tokio::spawn(async move {
        while let Some(ev) = progress_rx.recv().await {
            match ev {
                ProgressEvent::Loaded { pending, batches } if pending > 0 => {
                    println!("{} student(s) pending, {} batch(es)", pending, batches);
                }
                ProgressEvent::Loaded { .. } => println!("Nothing to do: every student is done."),
                ProgressEvent::CourseFinished {
                    key,
                    course,
                    degraded: true,
                    ..
                } => {
                    println!("  {} {}: unavailable, counted as 0.00", key, course);
                }
                ProgressEvent::StudentCommitted { key, name, total } => {
                    println!("  {} {:<32} {:>7}", key, name, total);
                }
                ProgressEvent::StudentFailed { key, error } => {
                    println!("  {} FAILED: {}", key, error);
                }
                ProgressEvent::BatchFinished { index, total } => {
                    println!("batch {}/{} done", index + 1, total);
                }
                _ => {}
            }
        }
    });

    let tally = harvest.run().await?;
    let _ = printer.await;

    println!(
        "Done in {:.1}s: {} succeeded, {} failed, {} course fetch(es) counted as zero.",
        started.elapsed().as_secs_f64(),
        tally.succeeded,
        tally.failed,
        tally.degraded
    );
    if !tally.is_clean() {
        anyhow::bail!(
            "{} student(s) failed and stay pending; run again to retry them",
            tally.failed
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let cfg = AregConfig {
            month: Some(2),
            year: Some(2024),
            ..AregConfig::default()
        };
        let cfg = RunOverrides {
            month: Some(3),
            year: None,
            batch_size: Some(8),
        }
        .apply(cfg);
        assert_eq!(cfg.month, Some(3));
        assert_eq!(cfg.year, Some(2024));
        assert_eq!(cfg.batch_size, 8);
    }
}
