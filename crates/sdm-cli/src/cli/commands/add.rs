//! `sdm add <url>...` – queue URLs in the pending slot for the next run.

use anyhow::{bail, Result};
use sdm_core::snapshot_db::SnapshotDb;
use sdm_core::url_model;

pub async fn run_add(db: &SnapshotDb, urls: &[String]) -> Result<()> {
    for url in urls {
        if let Err(reason) = url_model::validate(url) {
            bail!("invalid URL {url}: {reason}");
        }
    }
    let pending = db.append_urls(urls).await?;
    println!(
        "Queued {} URL(s); {} pending. Start with `sdm run`.",
        urls.len(),
        pending
    );
    Ok(())
}
