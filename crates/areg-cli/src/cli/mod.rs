//! CLI for the AREG attendance-register harvester.

mod commands;

use anyhow::Result;
use areg_core::config::{self, AregConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{
    run_discover, run_harvest, run_import, run_mark_all, run_refresh, run_status, RunOverrides,
};

/// Top-level CLI for the AREG harvester.
#[derive(Debug, Parser)]
#[command(name = "areg")]
#[command(about = "AREG: harvest monthly attendance-register hours into a CSV ledger", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/areg/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Harvest every pending student and append their rows to the monthly ledger.
    Run {
        /// Target month (1-12). Overrides `month` in the config.
        #[arg(long, value_name = "M")]
        month: Option<u32>,
        /// Target year. Overrides `year` in the config.
        #[arg(long, value_name = "Y")]
        year: Option<i32>,
        /// Students processed concurrently per batch.
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },

    /// Show how many students are done and pending.
    Status,

    /// Mark every student done (skip the rest of this month).
    MarkAll,

    /// Seed the SQLite checkpoint store from a JSON roster.
    Import {
        /// JSON roster to read (default: `paths.roster` from the config).
        #[arg(value_name = "ROSTER")]
        roster: Option<PathBuf>,
    },

    /// Build a JSON roster from a course's register overview.
    Discover {
        /// Course (register) id to read students from.
        course: String,
        /// Where to write the roster (default: `paths.roster` from the config).
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
        /// Replace an existing roster (resets every completion flag).
        #[arg(long)]
        force: bool,
    },

    /// Ask the portal to recalculate every register not yet refreshed.
    Refresh,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_or_init_at(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);
        cli.command.dispatch(cfg).await
    }

    async fn dispatch(self, cfg: AregConfig) -> Result<()> {
        match self {
            CliCommand::Run {
                month,
                year,
                batch_size,
            } => {
                let overrides = RunOverrides {
                    month,
                    year,
                    batch_size,
                };
                run_harvest(overrides.apply(cfg)).await?
            }
            CliCommand::Status => run_status(&cfg).await?,
            CliCommand::MarkAll => run_mark_all(&cfg).await?,
            CliCommand::Import { roster } => {
                let roster = roster.unwrap_or_else(|| cfg.paths.roster.clone());
                run_import(&cfg, &roster).await?
            }
            CliCommand::Discover { course, out, force } => {
                let out = out.unwrap_or_else(|| cfg.paths.roster.clone());
                run_discover(&cfg, &course, &out, force).await?
            }
            CliCommand::Refresh => run_refresh(&cfg).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
