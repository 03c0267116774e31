//! Webhook notifications for new articles.
//!
//! Each article becomes a single webhook message carrying one embed. The
//! payload follows the Discord webhook shape:
//!
//! ```json
//! { "content": "@everyone", "embeds": [{ "title": "...", "url": "...",
//!   "description": "...", "color": 11493413, "timestamp": "...",
//!   "footer": { "text": "..." } }] }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::article::Article;
use crate::error::{RelayError, Result};

/// Accent color for regular announcements.
pub const ARTICLE_COLOR: u32 = 0xAF6025;

/// Accent color for manual test posts.
pub const TEST_COLOR: u32 = 0xFF6B35;

/// Character budget for regular descriptions.
pub const DESCRIPTION_LIMIT: usize = 300;

/// Character budget for test-post descriptions.
pub const TEST_DESCRIPTION_LIMIT: usize = 250;

pub const DEFAULT_DESCRIPTION: &str = "No description available";

const ELLIPSIS: &str = "...";
const MENTION_EVERYONE: &str = "@everyone";
const TEST_TITLE_PREFIX: &str = "🧪 TEST: ";
const TEST_NOTICE: &str = "\n\n**This is a test post to verify the bot is working correctly.**";

/// Something that can announce an article.
#[async_trait]
pub trait Notify: Send + Sync {
    /// Announce an article. Returns `true` only if the endpoint accepted it.
    async fn send(&self, article: &Article, ping_everyone: bool) -> bool;

    /// Post a clearly marked test message for an article.
    async fn send_test(&self, article: &Article) -> bool;
}

#[async_trait]
impl<T: Notify + ?Sized> Notify for Arc<T> {
    async fn send(&self, article: &Article, ping_everyone: bool) -> bool {
        (**self).send(article, ping_everyone).await
    }

    async fn send_test(&self, article: &Article) -> bool {
        (**self).send_test(article).await
    }
}

pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    footer: String,
}

impl WebhookNotifier {
    pub fn new(
        webhook_url: impl Into<String>,
        footer: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            footer: footer.into(),
        })
    }

    pub fn article_payload(&self, article: &Article, ping_everyone: bool) -> WebhookPayload {
        let embed = Embed {
            title: article.title.clone(),
            url: article.link.clone(),
            description: truncate_description(article.summary.as_deref(), DESCRIPTION_LIMIT),
            color: ARTICLE_COLOR,
            timestamp: article.published_at.map(|t| t.to_rfc3339()),
            footer: EmbedFooter {
                text: self.footer.clone(),
            },
        };

        WebhookPayload {
            content: ping_everyone.then(|| MENTION_EVERYONE.to_string()),
            embeds: vec![embed],
        }
    }

    pub fn test_payload(&self, article: &Article) -> WebhookPayload {
        let mut description =
            truncate_description(article.summary.as_deref(), TEST_DESCRIPTION_LIMIT);
        description.push_str(TEST_NOTICE);

        let embed = Embed {
            title: format!("{TEST_TITLE_PREFIX}{}", article.title),
            url: article.link.clone(),
            description,
            color: TEST_COLOR,
            timestamp: article.published_at.map(|t| t.to_rfc3339()),
            footer: EmbedFooter {
                text: format!("{} • Test Mode", self.footer),
            },
        };

        WebhookPayload {
            content: None,
            embeds: vec![embed],
        }
    }

    /// POST a payload, treating any non-2xx answer as an error.
    pub async fn post(&self, payload: &WebhookPayload) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(RelayError::WebhookStatus { status, body })
    }
}

#[async_trait]
impl Notify for WebhookNotifier {
    async fn send(&self, article: &Article, ping_everyone: bool) -> bool {
        let payload = self.article_payload(article, ping_everyone);
        debug!(title = %article.title, ping_everyone, "Posting article");

        match self.post(&payload).await {
            Ok(()) => {
                info!("Posted article: {}", article.title);
                true
            }
            Err(e) => {
                warn!(title = %article.title, "Webhook post failed: {}", e);
                false
            }
        }
    }

    async fn send_test(&self, article: &Article) -> bool {
        let payload = self.test_payload(article);

        match self.post(&payload).await {
            Ok(()) => {
                info!("Test post successful, the relay is working");
                true
            }
            Err(e) => {
                warn!("Test post failed: {}", e);
                false
            }
        }
    }
}

/// Cut `summary` to `limit` characters and append an ellipsis.
///
/// A missing summary becomes [`DEFAULT_DESCRIPTION`]. The ellipsis is always
/// appended, matching the announcement format.
pub fn truncate_description(summary: Option<&str>, limit: usize) -> String {
    let text = summary.unwrap_or(DEFAULT_DESCRIPTION);
    let mut out: String = text.chars().take(limit).collect();
    out.push_str(ELLIPSIS);
    out
}

// =============================================================================
// Webhook API types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn notifier() -> WebhookNotifier {
        WebhookNotifier::new(
            "http://localhost/webhook",
            "Path of Exile News",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn article() -> Article {
        Article::new("https://example.com/news/1", "New League")
            .with_summary("Announcing the new league")
            .with_published_at("2024-12-09T12:00:00Z".parse::<DateTime<Utc>>().unwrap())
    }

    mod truncate_description_tests {
        use super::*;

        #[test]
        fn test_short_text_gets_ellipsis() {
            assert_eq!(truncate_description(Some("Hello"), 300), "Hello...");
        }

        #[test]
        fn test_long_text_is_cut() {
            let long = "a".repeat(400);
            let result = truncate_description(Some(&long), 300);
            assert_eq!(result.len(), 303);
            assert!(result.ends_with("..."));
        }

        #[test]
        fn test_missing_summary_uses_default() {
            assert_eq!(
                truncate_description(None, 300),
                "No description available..."
            );
        }

        #[test]
        fn test_counts_characters_not_bytes() {
            let text = "é".repeat(10);
            let result = truncate_description(Some(&text), 4);
            assert_eq!(result, "éééé...");
        }
    }

    mod payload_tests {
        use super::*;

        #[test]
        fn test_article_payload_with_ping() {
            let payload = notifier().article_payload(&article(), true);
            let value = serde_json::to_value(&payload).unwrap();

            assert_eq!(
                value,
                json!({
                    "content": "@everyone",
                    "embeds": [{
                        "title": "New League",
                        "url": "https://example.com/news/1",
                        "description": "Announcing the new league...",
                        "color": 0xAF6025,
                        "timestamp": "2024-12-09T12:00:00+00:00",
                        "footer": { "text": "Path of Exile News" }
                    }]
                })
            );
        }

        #[test]
        fn test_article_payload_without_ping_omits_content() {
            let payload = notifier().article_payload(&article(), false);
            let value = serde_json::to_value(&payload).unwrap();

            assert!(value.get("content").is_none());
            assert_eq!(value["embeds"].as_array().unwrap().len(), 1);
        }

        #[test]
        fn test_missing_timestamp_is_omitted() {
            let article = Article::new("https://example.com/a", "No Date");
            let payload = notifier().article_payload(&article, false);
            let value = serde_json::to_value(&payload).unwrap();

            assert!(value["embeds"][0].get("timestamp").is_none());
            assert_eq!(
                value["embeds"][0]["description"],
                "No description available..."
            );
        }

        #[test]
        fn test_test_payload_is_marked() {
            let payload = notifier().test_payload(&article());
            let embed = &payload.embeds[0];

            assert!(payload.content.is_none());
            assert_eq!(embed.title, "🧪 TEST: New League");
            assert_eq!(embed.color, TEST_COLOR);
            assert_eq!(embed.footer.text, "Path of Exile News • Test Mode");
            assert!(embed
                .description
                .starts_with("Announcing the new league..."));
            assert!(embed
                .description
                .ends_with("**This is a test post to verify the bot is working correctly.**"));
        }

        #[test]
        fn test_test_payload_uses_shorter_budget() {
            let article = Article::new("https://example.com/a", "Long").with_summary("b".repeat(400));
            let payload = notifier().test_payload(&article);
            let description = &payload.embeds[0].description;

            let body = description.split("...").next().unwrap();
            assert_eq!(body.chars().count(), TEST_DESCRIPTION_LIMIT);
        }
    }
}
