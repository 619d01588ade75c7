//! `areg mark-all` – mark every student done.

use anyhow::Result;
use areg_core::checkpoint::Roster;
use areg_core::config::AregConfig;

pub async fn run_mark_all(cfg: &AregConfig) -> Result<()> {
    let roster = Roster::open(cfg).await?;
    let n = roster.mark_all_done().await?;
    tracing::info!(marked = n, "marked all students done");
    println!("Marked {} student(s) done.", n);
    Ok(())
}
