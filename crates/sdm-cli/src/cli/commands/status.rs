//! `sdm status` – list URLs waiting in the pending slot.

use anyhow::Result;
use sdm_core::snapshot_db::SnapshotDb;
use sdm_core::url_model;

pub async fn run_status(db: &SnapshotDb) -> Result<()> {
    let pending = db.read_snapshot().await?;
    if pending.is_empty() {
        println!("No pending downloads.");
    } else {
        println!("{:<4} {:<32} {}", "#", "NAME", "URL");
        for (i, url) in pending.iter().enumerate() {
            println!("{:<4} {:<32} {}", i + 1, url_model::display_name(url), url);
        }
    }
    Ok(())
}
