use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use spooky_feed::config::Config;
use spooky_feed::feed::{
    build_client, Category, ExtractionStrategy, FeedAggregator, DEFAULT_LATEST_COUNT,
};
use spooky_feed::util::validate_url;

/// Default config location (~/.config/spooky-feed/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("spooky-feed")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "spooky-feed",
    about = "Fetch, normalize and re-serve the Spooky Bitch Show podcast feed"
)]
struct Cli {
    /// Config file (defaults to ~/.config/spooky-feed/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override the XML extraction strategy from the config
    #[arg(long, value_enum, global = true)]
    strategy: Option<ExtractionStrategy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the assembled feed as JSON
    Feed,

    /// Print a list of episodes as JSON
    Episodes {
        /// Only the newest N episodes (N defaults to 2)
        #[arg(long, value_name = "N")]
        latest: Option<Option<usize>>,

        /// Only episodes in this category (e.g. "true crime")
        #[arg(long, value_name = "NAME")]
        category: Option<String>,
    },

    /// Print one episode as JSON; exits with 1 when it does not exist
    Episode(EpisodeLookup),

    /// Write the upstream RSS with item links rewritten to local episode pages
    Rss {
        /// Public site root (overrides `base_url` from the config)
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Write to this file instead of stdout
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct EpisodeLookup {
    #[arg(long)]
    id: Option<String>,

    #[arg(long)]
    slug: Option<String>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", json).context("Failed to write to stdout")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries JSON/RSS, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.validate().context("Invalid configuration")?;

    let client = build_client().context("Failed to build HTTP client")?;
    let mut aggregator = FeedAggregator::new(client, &config);
    if let Some(strategy) = cli.strategy {
        aggregator = aggregator.with_strategy(strategy);
    }
    tracing::debug!(strategy = %aggregator.strategy(), "Aggregator ready");

    match cli.command {
        Command::Feed => {
            print_json(&aggregator.fetch_podcast_feed().await)?;
        }
        Command::Episodes { latest, category } => {
            if let Some(name) = &category {
                if Category::from_name(name).is_none() {
                    tracing::warn!(category = %name, "Unknown category, no episodes will match");
                }
            }
            let latest = latest.map(|count| count.unwrap_or(DEFAULT_LATEST_COUNT));
            let episodes = match (latest, category) {
                (Some(count), None) => aggregator.latest_episodes(count).await,
                (None, Some(name)) => aggregator.episodes_by_category(&name).await,
                (Some(count), Some(name)) => {
                    let mut episodes = aggregator.episodes_by_category(&name).await;
                    episodes.truncate(count);
                    episodes
                }
                (None, None) => aggregator.all_episodes().await,
            };
            print_json(&episodes)?;
        }
        Command::Episode(lookup) => {
            let found = match (&lookup.id, &lookup.slug) {
                (Some(id), _) => aggregator.episode_by_id(id).await,
                (None, Some(slug)) => aggregator.episode_by_slug(slug).await,
                (None, None) => None,
            };
            match found {
                Some(episode) => print_json(&episode)?,
                None => {
                    eprintln!("Error: Episode not found");
                    std::process::exit(1);
                }
            }
        }
        Command::Rss { base_url, output } => {
            let base_url = base_url.or(config.base_url).context(
                "No base URL configured: pass --base-url or set `base_url` in the config file",
            )?;
            validate_url(&base_url).context("Invalid --base-url")?;

            let response = aggregator.rss_passthrough(&base_url).await;
            if !response.is_success() {
                tracing::warn!(status = response.status, "Serving fallback RSS document");
                eprintln!(
                    "Warning: upstream feed unavailable, wrote the error document (status {})",
                    response.status
                );
            }

            match output {
                Some(path) => std::fs::write(&path, &response.body)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout
                        .write_all(response.body.as_bytes())
                        .context("Failed to write to stdout")?;
                }
            }
        }
    }

    Ok(())
}
