//! Exposes the command line application.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures::future::join_all;
use remote_loader::config::Config;
use remote_loader::decode::SniffDecoder;
use remote_loader::services::LoaderServices;

use crate::logging;
use crate::output::{self, Outcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per resource.
    Pretty,
    /// A JSON array with one object per resource.
    Json,
}

/// Loads images from URLs, fetching every distinct URL at most once.
///
/// All URLs are loaded concurrently. Fetched resources are cached in memory, and on disk
/// if a cache directory is configured.
#[derive(Clone, Parser, Debug)]
#[command(name = "rloader", author, version, about, long_about)]
struct Cli {
    /// The URLs to load.
    #[arg(required = true, value_name = "URL")]
    urls: Vec<String>,

    /// Path to your configuration file.
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the persistent cache, overriding the configuration.
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// The maximum number of concurrent fetches, overriding the configuration.
    #[arg(long, value_name = "N")]
    max_concurrent: Option<usize>,

    /// Only look at the cache, never fetch.
    #[arg(long)]
    cached_only: bool,

    /// The output format.
    #[arg(long, value_enum, default_value = "pretty")]
    format: OutputFormat,
}

impl Cli {
    /// Returns the path to the configuration file.
    fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    /// Loads the configuration and applies the command line overrides.
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::get(self.config()).context("failed loading config")?;
        if let Some(ref cache_dir) = self.cache_dir {
            config.cache_dir = Some(cache_dir.clone());
        }
        if let Some(max_concurrent) = self.max_concurrent {
            config.max_concurrent_fetches = max_concurrent;
        }
        Ok(config)
    }
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: config.sentry_dsn.clone(),
        release: sentry::release_name!(),
        ..Default::default()
    });

    // SAFETY: We are still single-threaded, the runtime is created below.
    unsafe { logging::init_logging(&config) };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("rloader")
        .enable_all()
        .build()
        .context("failed to create runtime")?;

    let outcomes = runtime.block_on(load_all(config, &cli.urls, cli.cached_only))?;

    let mut stdout = std::io::stdout().lock();
    match cli.format {
        OutputFormat::Pretty => output::print_pretty(&mut stdout, &outcomes)?,
        OutputFormat::Json => output::print_json(&mut stdout, &outcomes)?,
    }

    Ok(())
}

async fn load_all(config: Config, urls: &[String], cached_only: bool) -> Result<Vec<Outcome>> {
    let services = LoaderServices::new(config)?;
    let loader = Arc::new(services.loader(SniffDecoder));

    if cached_only {
        let outcomes = urls
            .iter()
            .map(|url| Outcome::from_cached(url, loader.load_cached(url)))
            .collect();
        return Ok(outcomes);
    }

    let loads = urls.iter().map(|url| {
        let loader = Arc::clone(&loader);
        let url = url.clone();
        tokio::spawn(async move {
            let result = loader.try_load(&url).await;
            Outcome::from_result(&url, result)
        })
    });

    let mut outcomes = Vec::with_capacity(urls.len());
    for outcome in join_all(loads).await {
        outcomes.push(outcome.context("load task panicked")?);
    }
    tracing::debug!(?loader, "Finished loading");

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "rloader",
            "--cache-dir",
            "/tmp/rloader",
            "--max-concurrent",
            "3",
            "--format",
            "json",
            "https://example.com/a.png",
            "https://example.com/b.png",
        ]);
        assert_eq!(cli.urls.len(), 2);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(!cli.cached_only);

        let config = cli.load_config().unwrap();
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/rloader")));
        assert_eq!(config.max_concurrent_fetches, 3);
    }

    #[test]
    fn test_cli_requires_urls() {
        assert!(Cli::try_parse_from(["rloader", "--cached-only"]).is_err());
    }
}
