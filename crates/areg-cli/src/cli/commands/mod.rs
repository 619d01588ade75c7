//! CLI command handlers, one file per command.

mod discover;
mod import;
mod mark_all;
mod refresh;
mod run;
mod status;

pub use discover::run_discover;
pub use import::run_import;
pub use mark_all::run_mark_all;
pub use refresh::run_refresh;
pub use run::{run_harvest, RunOverrides};
pub use status::run_status;
