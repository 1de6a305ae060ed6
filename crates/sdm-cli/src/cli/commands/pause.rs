//! `sdm pause <id>` – ask the running instance to pause a download.

use anyhow::Result;

use crate::cli::control_socket::{self, ControlAction};

pub async fn run_pause(id: u64) -> Result<()> {
    let reply = control_socket::send_default(ControlAction::Pause, id).await?;
    println!("pause #{id}: {reply}");
    Ok(())
}
