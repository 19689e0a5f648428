use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use siphon::cache::CacheStore;
use siphon::config::Config;
use siphon::events::{handle_fetch_request, FeedEvent, FetchRequest};
use siphon::feed::FeedFetcher;
use siphon::service::IngestionService;

/// Get the default config file path (~/.config/siphon/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("siphon")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "siphon", about = "Fetch and normalize RSS/Atom/RDF feeds")]
struct Args {
    /// Config file (defaults to ~/.config/siphon/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch feeds and print one JSON event per URL
    Fetch {
        /// Feed URLs; scheme-less hosts are tried over https then http
        urls: Vec<String>,

        /// Read JSON `{"url": ...}` requests from stdin, one per line
        #[arg(long)]
        stdin: bool,
    },
    /// Pre-populate the cache from the config's warm_urls plus any given here
    Warm {
        urls: Vec<String>,

        /// Repeat every N minutes instead of running once (overrides config)
        #[arg(long, value_name = "MINUTES")]
        interval_minutes: Option<u64>,
    },
}

fn build_service(config: &Config) -> Result<IngestionService> {
    let options = config.fetch_options();

    // The proxy is optional: a bad proxy configuration only drops the proxy attempt
    let proxy = config
        .proxy_settings()
        .and_then(|settings| match settings.build_client(options.timeout) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "Proxy client unavailable, continuing without proxy");
                None
            }
        });

    let fetcher = FeedFetcher::new(options, proxy).context("Failed to build HTTP client")?;
    let cache = Arc::new(CacheStore::new(config.cache_ttl()));
    Ok(IngestionService::new(fetcher, cache))
}

fn print_event(event: &FeedEvent) -> Result<()> {
    let line = serde_json::to_string(event).context("Failed to serialize event")?;
    println!("{line}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let service = Arc::new(build_service(&config)?);

    match args.command {
        Command::Fetch { urls, stdin } => {
            let requests: Vec<FetchRequest> = urls.into_iter().map(FetchRequest::new).collect();
            let events = join_all(
                requests
                    .iter()
                    .map(|request| handle_fetch_request(&service, request)),
            )
            .await;
            for event in &events {
                print_event(event)?;
            }

            if stdin {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let payload: serde_json::Value = match serde_json::from_str(&line) {
                        Ok(value) => value,
                        Err(e) => {
                            tracing::warn!(error = %e, "Ignoring request line that is not JSON");
                            continue;
                        }
                    };
                    let request = FetchRequest::from_payload(payload);
                    print_event(&handle_fetch_request(&service, &request).await)?;
                }
            }
        }
        Command::Warm {
            urls,
            interval_minutes,
        } => {
            let mut targets = config.warm_urls.clone();
            targets.extend(urls);
            if targets.iter().all(|u| u.trim().is_empty()) {
                anyhow::bail!("No URLs to warm: pass some or set warm_urls in the config file");
            }

            let every = interval_minutes.unwrap_or(config.warm_interval_minutes);
            if every == 0 {
                service.warm_batch(&targets).await;
                println!("Cached {} of {} feeds", service.cache().len(), targets.len());
            } else {
                let handle = Arc::clone(&service)
                    .spawn_warmup(targets, Duration::from_secs(every.saturating_mul(60)));
                tokio::signal::ctrl_c()
                    .await
                    .context("Failed to listen for Ctrl+C")?;
                handle.abort();
                println!("Stopped; {} feeds cached", service.cache().len());
            }
        }
    }

    Ok(())
}
