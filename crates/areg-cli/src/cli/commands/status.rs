//! `areg status` – done/pending counts of the checkpoint store.

use anyhow::Result;
use areg_core::checkpoint::Roster;
use areg_core::config::{AregConfig, CheckpointBackend};

pub async fn run_status(cfg: &AregConfig) -> Result<()> {
    let roster = Roster::open(cfg).await?;
    let p = roster.progress().await?;
    let store = match cfg.paths.backend {
        CheckpointBackend::Json => cfg.paths.roster.display().to_string(),
        CheckpointBackend::Sqlite => cfg.database_path()?.display().to_string(),
    };
    println!("store:   {}", store);
    if p.total() == 0 {
        println!("No students in the roster.");
        return Ok(());
    }
    println!("done:    {} / {}", p.done, p.total());
    println!("pending: {}", p.pending);
    if let Ok(period) = cfg.target_period() {
        println!("ledger:  {}", cfg.ledger_path(period).display());
    }
    Ok(())
}
