//! pywhl - Python wheel downloader CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pywhl_cli::cmd;
use pywhl_cli::settings::Overrides;
use pywhl_cli::{CacheCommands, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never tear the progress table on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let quiet = cli.quiet;
    let index_url = cli.index_url;

    match cli.command {
        Commands::Download {
            spec,
            requirements,
            python,
            platform,
            deps,
            output,
            no_cache,
            parallel,
            allow_free_threaded,
            strict,
        } => {
            let overrides = Overrides {
                python,
                platform,
                output,
                parallel,
                index_url,
            };
            let flags = cmd::download::DownloadFlags {
                deps,
                use_cache: !no_cache,
                allow_free_threaded,
                strict,
                quiet,
            };
            match requirements {
                Some(path) => cmd::download::download_requirements(&path, &overrides, &flags).await,
                None => {
                    let spec = spec.unwrap_or_default();
                    cmd::download::download(&spec, &overrides, &flags).await
                }
            }
        }
        Commands::Resolve {
            spec,
            python,
            platform,
            json,
        } => {
            let overrides = Overrides {
                python,
                platform,
                index_url,
                ..Default::default()
            };
            cmd::resolve::resolve(&spec, &overrides, json).await
        }
        Commands::Info { package, versions } => {
            let overrides = Overrides {
                index_url,
                ..Default::default()
            };
            cmd::info::info(&package, versions, &overrides).await
        }
        Commands::Cache { command } => match command {
            CacheCommands::List => cmd::cache::list(),
            CacheCommands::Info => cmd::cache::info(),
            CacheCommands::Clean { all, older_than } => cmd::cache::clean(all, older_than),
        },
    }
}
