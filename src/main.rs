use std::process::ExitCode;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use news_relay::config::Config;
use news_relay::fetcher::Fetcher;
use news_relay::notifier::WebhookNotifier;
use news_relay::rate_limit::RateLimiter;
use news_relay::relay::Relay;
use news_relay::scheduler::Scheduler;
use news_relay::store::DedupStore;

const DEFAULT_CONFIG_PATH: &str = "relay.toml";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_relay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("RELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    if std::env::args().any(|arg| arg == "--check-config") {
        return Ok(check_config(&config_path));
    }

    // Load configuration
    let config = Config::load_with_env(&config_path)?;
    config.check()?;
    info!("Loaded configuration from {}", config_path);

    let timeout = Duration::from_secs(config.http_timeout_secs);
    let fetcher = Fetcher::new(config.feed.url.clone(), timeout)?;
    let notifier = WebhookNotifier::new(
        config.webhook.url.clone(),
        config.webhook.footer.clone(),
        timeout,
    )?;

    let store = DedupStore::load(&config.storage.path).await;
    let limiter = RateLimiter::new(
        config.rate_limit.max_posts,
        Duration::from_secs(config.rate_limit.window_secs),
    );

    let relay = Relay::new(fetcher, notifier, store, limiter)
        .with_ping_everyone(config.webhook.ping_everyone)
        .with_dispatch_delay(Duration::from_millis(config.rate_limit.dispatch_delay_ms));
    info!("News relay initialized");

    let scheduler = Scheduler::new(
        config.feed.poll_interval_minutes,
        config.post_latest_on_start,
    );

    scheduler
        .run_until(&relay, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(ExitCode::SUCCESS)
}

/// Validate the configuration without starting the relay.
fn check_config(path: &str) -> ExitCode {
    let config = match Config::load_with_env(path) {
        Ok(config) => config,
        Err(e) => {
            error!("Error reading config {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    match config.check() {
        Ok(()) => {
            info!("Configuration looks good");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Invalid configuration in {}: {}", path, e);
            ExitCode::FAILURE
        }
    }
}
