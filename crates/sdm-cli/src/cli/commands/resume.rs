//! `sdm resume <id>` – re-queue a paused or failed download.

use anyhow::Result;

use crate::cli::control_socket::{self, ControlAction};

pub async fn run_resume(id: u64) -> Result<()> {
    let reply = control_socket::send_default(ControlAction::Resume, id).await?;
    println!("resume #{id}: {reply}");
    Ok(())
}
