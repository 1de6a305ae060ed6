//! CLI for the SDM download manager.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sdm_core::config;
use sdm_core::snapshot_db::SnapshotDb;
use std::path::PathBuf;

use commands::{run_add, run_cancel, run_manager, run_pause, run_resume, run_status};

/// Top-level CLI for the SDM download manager.
#[derive(Debug, Parser)]
#[command(name = "sdm")]
#[command(about = "SDM: suspendable, resumable download manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue URLs for the next `sdm run`.
    Add {
        /// Direct HTTP/HTTPS URLs to download.
        #[arg(required = true, num_args = 1..)]
        urls: Vec<String>,
    },

    /// Download everything pending, printing progress until done or Ctrl-C.
    Run {
        /// Maximum concurrent downloads (default from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// Where finished files go (default from config, else the current directory).
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,
    },

    /// List URLs waiting for the next run.
    Status,

    /// Pause a running download in the active `sdm run`.
    Pause {
        /// Transfer identifier, as printed by `sdm run`.
        id: u64,
    },

    /// Resume a paused or failed download in the active `sdm run`.
    Resume {
        /// Transfer identifier.
        id: u64,
    },

    /// Cancel a download in the active `sdm run`.
    Cancel {
        /// Transfer identifier.
        id: u64,
        /// Start it over from the back of the queue instead of dropping it.
        #[arg(long)]
        retry: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Add { urls } => {
                let db = SnapshotDb::open_default().await?;
                run_add(&db, &urls).await?;
            }
            CliCommand::Run { jobs, download_dir } => {
                let db = SnapshotDb::open_default().await?;
                run_manager(db, &cfg, jobs, download_dir).await?;
            }
            CliCommand::Status => {
                let db = SnapshotDb::open_default().await?;
                run_status(&db).await?;
            }
            CliCommand::Pause { id } => run_pause(id).await?,
            CliCommand::Resume { id } => run_resume(id).await?,
            CliCommand::Cancel { id, retry } => run_cancel(id, retry).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
