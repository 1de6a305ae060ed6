//! CLI command handlers, one file per command.

mod add;
mod cancel;
mod pause;
mod resume;
mod run;
mod status;

pub use add::run_add;
pub use cancel::run_cancel;
pub use pause::run_pause;
pub use resume::run_resume;
pub use run::run_manager;
pub use status::run_status;
