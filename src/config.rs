use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Placeholder shipped in the sample config.
pub const WEBHOOK_PLACEHOLDER: &str = "YOUR_DISCORD_WEBHOOK_URL_HERE";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub feed: FeedConfig,
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Post a marked test message at startup instead of the first cycle
    #[serde(default)]
    pub post_latest_on_start: bool,
    /// HTTP timeout in seconds for both the feed and the webhook
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub url: String,
    /// Poll interval in minutes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_true")]
    pub ping_everyone: bool,
    #[serde(default = "default_footer")]
    pub footer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_posts")]
    pub max_posts: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Pause between posts within one cycle
    #[serde(default = "default_dispatch_delay_ms")]
    pub dispatch_delay_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_posts: default_max_posts(),
            window_secs: default_window_secs(),
            dispatch_delay_ms: default_dispatch_delay_ms(),
        }
    }
}

fn default_poll_interval() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_footer() -> String {
    "Path of Exile News".to_string()
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/posted_articles.json")
}

fn default_max_posts() -> usize {
    crate::rate_limit::DEFAULT_MAX_POSTS
}

fn default_window_secs() -> u64 {
    crate::rate_limit::DEFAULT_WINDOW_SECS
}

fn default_dispatch_delay_ms() -> u64 {
    crate::relay::DEFAULT_DISPATCH_DELAY.as_millis() as u64
}

fn default_http_timeout() -> u64 {
    30
}

/// Problems found by [`Config::check`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("webhook URL not configured")]
    MissingWebhook,

    #[error("webhook URL is still the placeholder value")]
    PlaceholderWebhook,

    #[error("webhook URL must start with http:// or https://: {0}")]
    InvalidWebhook(String),

    #[error("feed URL not configured")]
    MissingFeed,

    #[error("poll interval must be at least one minute")]
    InvalidPollInterval,

    #[error("rate limit must allow at least one post per window")]
    InvalidRateLimit,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load from `path` and apply overrides from the process environment.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment-style overrides looked up through `lookup`.
    ///
    /// Numeric values that fail to parse are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DISCORD_WEBHOOK_URL") {
            self.webhook.url = url;
        }

        if let Some(url) = lookup("FEED_URL") {
            self.feed.url = url;
        }

        if let Some(raw) = lookup("POLL_INTERVAL_MINUTES") {
            match raw.trim().parse::<u64>() {
                Ok(minutes) => self.feed.poll_interval_minutes = minutes,
                Err(e) => warn!("Ignoring POLL_INTERVAL_MINUTES={:?}: {}", raw, e),
            }
        }

        if let Some(path) = lookup("STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("POST_LATEST_ON_START") {
            self.post_latest_on_start = raw.trim() == "true";
        }

        if let Some(raw) = lookup("PING_EVERYONE") {
            let raw = raw.trim();
            self.webhook.ping_everyone = !(raw.eq_ignore_ascii_case("false") || raw == "0");
        }
    }

    /// Validate the settings the relay cannot run without.
    pub fn check(&self) -> Result<(), ConfigError> {
        let webhook = self.webhook.url.trim();
        if webhook.is_empty() {
            return Err(ConfigError::MissingWebhook);
        }
        if webhook == WEBHOOK_PLACEHOLDER {
            return Err(ConfigError::PlaceholderWebhook);
        }
        if !(webhook.starts_with("http://") || webhook.starts_with("https://")) {
            return Err(ConfigError::InvalidWebhook(webhook.to_string()));
        }
        if self.feed.url.trim().is_empty() {
            return Err(ConfigError::MissingFeed);
        }
        if self.feed.poll_interval_minutes == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        if self.rate_limit.max_posts == 0 {
            return Err(ConfigError::InvalidRateLimit);
        }
        Ok(())
    }
}
