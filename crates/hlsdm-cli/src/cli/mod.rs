//! CLI for the HLSDM stream download manager.

mod commands;
mod control_socket;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hlsdm_core::config;
use hlsdm_core::control::ControlCommand;
use hlsdm_core::history::HistoryDb;
use hlsdm_core::ids::QueueId;
use std::path::PathBuf;

use commands::{run_batch, run_control, run_get, run_history, run_parse, BatchArgs};

/// Top-level CLI for the HLSDM stream download manager.
#[derive(Debug, Parser)]
#[command(name = "hlsdm")]
#[command(about = "HLSDM: HLS (M3U8) stream downloader with batch queues", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one stream and merge it into a single file.
    Get {
        /// HTTP/HTTPS URL of the M3U8 playlist.
        url: String,
        /// Title used for the output file name (default: from the playlist URL).
        #[arg(long)]
        title: Option<String>,
        /// Segments fetched at once (1–8; default from config).
        #[arg(long, short = 'c', value_name = "N")]
        concurrency: Option<usize>,
        /// Directory for the merged file (default: config download_dir or current directory).
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Download several streams as one queue.
    Batch {
        /// Playlist URLs.
        urls: Vec<String>,
        /// Read more URLs from a file, one per line (`#` starts a comment).
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
        /// Titles, in URL order. Repeat the flag once per URL.
        #[arg(long = "title", value_name = "TITLE")]
        titles: Vec<String>,
        /// Streams downloaded at once (1–5; default from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// Queue name.
        #[arg(long)]
        name: Option<String>,
        /// Directory for merged files.
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Pause a running batch queue.
    Pause {
        /// Queue identifier (e.g. q-1).
        id: QueueId,
    },

    /// Resume a paused batch queue.
    Resume {
        /// Queue identifier.
        id: QueueId,
    },

    /// Cancel a batch queue for good.
    Cancel {
        /// Queue identifier.
        id: QueueId,
    },

    /// Show or manage the download history.
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },

    /// Resolve a playlist and print its segments without downloading.
    Parse {
        /// HTTP/HTTPS URL of the M3U8 playlist.
        url: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum HistoryAction {
    /// List entries, newest first.
    List {
        /// Only entries with this status (pending, downloading, completed, failed).
        #[arg(long)]
        status: Option<String>,
    },
    /// Entries whose title or URL contains the query (case-insensitive).
    Search { query: String },
    /// Totals and combined size.
    Stats,
    /// Write the history as JSON to a file (stdout if omitted).
    Export { path: Option<PathBuf> },
    /// Replace the history with entries from a JSON file.
    Import { path: PathBuf },
    /// Remove one entry.
    Remove { id: String },
    /// Remove every entry.
    Clear,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                title,
                concurrency,
                output_dir,
            } => {
                let db = HistoryDb::open_default().await?;
                run_get(&cfg, &db, &url, title.as_deref(), concurrency, output_dir).await?;
            }
            CliCommand::Batch {
                urls,
                file,
                titles,
                jobs,
                name,
                output_dir,
            } => {
                let db = HistoryDb::open_default().await?;
                let args = BatchArgs {
                    urls,
                    file,
                    titles,
                    jobs,
                    name,
                    output_dir,
                };
                run_batch(&cfg, &db, args).await?;
            }
            CliCommand::Pause { id } => run_control(ControlCommand::Pause(id)).await?,
            CliCommand::Resume { id } => run_control(ControlCommand::Resume(id)).await?,
            CliCommand::Cancel { id } => run_control(ControlCommand::Cancel(id)).await?,
            CliCommand::History { action } => {
                let db = HistoryDb::open_default().await?;
                run_history(&cfg, &db, action.unwrap_or(HistoryAction::List { status: None })).await?;
            }
            CliCommand::Parse { url } => run_parse(&cfg, &url).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
