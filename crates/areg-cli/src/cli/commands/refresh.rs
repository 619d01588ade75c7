//! `areg refresh` – ask the portal to recalculate registers before a harvest.

use anyhow::Result;
use areg_core::checkpoint::load_courses;
use areg_core::config::AregConfig;
use areg_core::fetch::{Credentials, PortalClient};
use areg_core::refresh::refresh_courses;
use areg_core::scheduler::BatchPlan;
use std::sync::Arc;

pub async fn run_refresh(cfg: &AregConfig) -> Result<()> {
    let courses = load_courses(&cfg.paths.categories).await?;
    let client = PortalClient::new(&cfg.base_url, Credentials::from_env()?, cfg.request_timeout())?
        .with_timeout(cfg.refresh.timeout());
    let plan = BatchPlan::new(cfg.refresh.batch_size, cfg.refresh.delay());

    let tally = refresh_courses(Arc::new(client), &courses, &plan).await;
    println!(
        "Recalculated {} register(s), {} failed, {} skipped (already refreshed).",
        tally.succeeded, tally.failed, tally.skipped
    );
    if !tally.is_clean() {
        anyhow::bail!("{} register(s) could not be recalculated; see the log", tally.failed);
    }
    Ok(())
}
