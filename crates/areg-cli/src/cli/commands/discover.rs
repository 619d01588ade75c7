//! `areg discover` – build a JSON roster from a course's register overview.

use anyhow::Result;
use areg_core::config::AregConfig;
use areg_core::discover::discover_roster;
use areg_core::fetch::{Credentials, PortalClient};
use std::path::Path;

pub async fn run_discover(cfg: &AregConfig, course: &str, out: &Path, force: bool) -> Result<()> {
    let client = PortalClient::new(&cfg.base_url, Credentials::from_env()?, cfg.request_timeout())?;
    let n = discover_roster(&client, course, out, force).await?;
    println!("Wrote {} student(s) to {}", n, out.display());
    Ok(())
}
