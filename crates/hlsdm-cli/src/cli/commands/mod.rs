//! CLI command handlers, one file per command.

mod batch;
mod control;
mod get;
mod history;
mod parse;

pub use batch::{run_batch, BatchArgs};
pub use control::run_control;
pub use get::run_get;
pub use history::run_history;
pub use parse::run_parse;

use anyhow::Result;
use hlsdm_core::config::HlsdmConfig;
use std::path::PathBuf;

/// `--output-dir`, else config `download_dir`, else the current directory.
fn output_dir(cfg: &HlsdmConfig, arg: Option<PathBuf>) -> Result<PathBuf> {
    match arg.or_else(|| cfg.download_dir.clone()) {
        Some(dir) => Ok(dir),
        None => Ok(std::env::current_dir()?),
    }
}
