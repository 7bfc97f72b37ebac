mod cli;
mod config;
mod logging;
mod runner;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use runner::UrlSource;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log, cli.verbose);

    let mut config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            urls,
            search,
            rate_limit_ms,
            max_retries,
            format,
            out,
        } => {
            if let Some(rate_limit_ms) = rate_limit_ms {
                config.job.rate_limit_ms = rate_limit_ms;
            }
            if let Some(max_retries) = max_retries {
                config.job.max_retries = max_retries;
            }
            if let Some(out) = out {
                config.output_dir = out;
            }
            let source = match (urls, search) {
                (Some(path), _) => UrlSource::File(path),
                (None, Some(url)) => UrlSource::Search(url),
                (None, None) => anyhow::bail!("either --urls or --search is required"),
            };
            runner::run_job(config, source, format).await
        }
        Commands::Export {
            format,
            with_stats,
            out,
        } => {
            let dir = out.unwrap_or(config.output_dir);
            let path = runner::export_saved(&dir, format, with_stats)?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Stats { out } => {
            let dir = out.unwrap_or(config.output_dir);
            print!("{}", runner::saved_stats(&dir)?);
            Ok(())
        }
    }
}
