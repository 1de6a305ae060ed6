//! `sdm cancel <id> [--retry]` – drop a download, or restart it from zero.

use anyhow::Result;

use crate::cli::control_socket::{self, ControlAction};

pub async fn run_cancel(id: u64, retry: bool) -> Result<()> {
    let action = if retry {
        ControlAction::Retry
    } else {
        ControlAction::Cancel
    };
    let reply = control_socket::send_default(action, id).await?;
    println!("{} #{id}: {reply}", action.as_str());
    Ok(())
}
