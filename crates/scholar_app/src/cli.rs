use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use scholar_engine::ExportFormat;

use crate::logging::LogDestination;

#[derive(Parser, Debug)]
#[command(
    name = "scholar",
    version,
    about = "Harvests author contact emails from journal article pages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// RON configuration file (defaults to ./scholar.ron when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Where log output goes
    #[arg(long, value_enum, global = true, default_value_t = LogDestination::Both)]
    pub log: LogDestination,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a list of article pages and export the contacts found
    ///
    /// While running, type `p` + Enter to pause, `r` to resume, `s` to stop.
    #[command(group(ArgGroup::new("source").required(true).args(["urls", "search"])))]
    Run {
        /// File with one article URL per line
        #[arg(long)]
        urls: Option<PathBuf>,

        /// Search results page to collect article links from
        #[arg(long)]
        search: Option<String>,

        /// Delay between two URLs, in milliseconds
        #[arg(long)]
        rate_limit_ms: Option<u64>,

        /// Attempts per URL, first try included
        #[arg(long)]
        max_retries: Option<u32>,

        /// Export format written when the job ends
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Output directory for exports and the results snapshot
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Re-export the saved results
    Export {
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Prepend export metadata and statistics (json only)
        #[arg(long)]
        with_stats: bool,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print statistics of the saved results
    Stats {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
