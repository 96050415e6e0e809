//! Polling reader — terminal client for the echo server.
//!
//! Polls the server at a fixed cadence, prints each new message and keeps
//! the session's history in memory. Ctrl-C stops the poller and prints the
//! full history.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use common::config::ReaderConfig;
use common::payload::PollingData;
use poller::{Poller, PollerConfig};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

mod history;

use history::History;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Endpoint to poll. Overrides `pollingUrl` from the config file.
    #[arg(long)]
    url: Option<String>,
    /// Milliseconds between cycle starts. Overrides `intervalMs`.
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Keep only the newest N entries. Overrides `maxHistory`.
    #[arg(long)]
    max_history: Option<usize>,
    #[arg(long, default_value = "reader.json")]
    config: PathBuf,
}

/// Effective settings after layering CLI flags over the config file.
#[derive(Debug, PartialEq, Eq)]
struct Settings {
    url: String,
    interval_ms: u64,
    max_history: Option<usize>,
}

impl Settings {
    fn resolve(args: &Args, config: &ReaderConfig) -> Self {
        Self {
            url: args
                .url
                .clone()
                .unwrap_or_else(|| config.polling_url().to_string()),
            interval_ms: args.interval_ms.unwrap_or_else(|| config.interval_ms()),
            max_history: args.max_history.or(config.max_history),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reader=info,poller=info".into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = ReaderConfig::load(&args.config).context("Failed to load reader config")?;
    let settings = Settings::resolve(&args, &config);

    info!(
        url = %settings.url,
        interval_ms = settings.interval_ms,
        "Polling Reader v{}",
        env!("CARGO_PKG_VERSION")
    );

    let history = Arc::new(Mutex::new(History::new(settings.max_history)));
    println!("Polling...");

    let sink = Arc::clone(&history);
    let poller = Poller::spawn(
        PollerConfig::new(settings.url).with_interval_ms(settings.interval_ms),
        move |data: PollingData| {
            let mut history = sink
                .lock()
                .map_err(|_| anyhow!("history lock poisoned"))?;
            history.push(data);
            println!("{}", history.render_latest());
            Ok(())
        },
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    poller.stop();
    poller.stopped().await;

    let stats = poller.stats();
    info!(
        attempts = stats.attempts,
        deliveries = stats.deliveries,
        failures = stats.failures,
        "Reader stopped"
    );

    let history = history
        .lock()
        .map_err(|_| anyhow!("history lock poisoned"))?;
    if history.is_empty() {
        info!("No messages received");
    } else {
        info!(entries = history.len(), "History collected");
    }
    println!("\n{}", history.render());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags_or_file() {
        let args = Args::parse_from(["reader"]);
        let settings = Settings::resolve(&args, &ReaderConfig::default());
        assert_eq!(
            settings,
            Settings {
                url: "http://localhost:3000/api/polling".into(),
                interval_ms: 5000,
                max_history: None,
            }
        );
    }

    #[test]
    fn test_flags_override_config_file() {
        let config = ReaderConfig {
            polling_url: Some("http://config.test/api/polling".into()),
            interval_ms: Some(2000),
            max_history: Some(50),
        };
        let args = Args::parse_from(["reader", "--interval-ms", "250", "--max-history", "3"]);
        let settings = Settings::resolve(&args, &config);

        assert_eq!(settings.url, "http://config.test/api/polling");
        assert_eq!(settings.interval_ms, 250);
        assert_eq!(settings.max_history, Some(3));
    }

    #[test]
    fn test_url_flag() {
        let args = Args::parse_from(["reader", "--url", "http://127.0.0.1:9000/api/polling"]);
        let settings = Settings::resolve(&args, &ReaderConfig::default());
        assert_eq!(settings.url, "http://127.0.0.1:9000/api/polling");
    }
}
