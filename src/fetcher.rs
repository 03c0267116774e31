use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;
use tracing::{info, warn};

use crate::article::Article;
use crate::error::{RelayError, Result};

const USER_AGENT: &str = "NewsRelay/1.0 (Feed Relay)";

/// Anything that can produce the current list of articles, newest first.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the feed. Failures are logged and reported as an empty list.
    async fn fetch(&self) -> Vec<Article>;
}

#[async_trait]
impl<T: FeedSource + ?Sized> FeedSource for Arc<T> {
    async fn fetch(&self) -> Vec<Article> {
        (**self).fetch().await
    }
}

pub struct Fetcher {
    client: Client,
    url: String,
}

impl Fetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Fetch and parse the feed, surfacing any error to the caller.
    pub async fn fetch_feed(&self) -> Result<Vec<Article>> {
        info!("Fetching feed: {}", self.url);

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::FeedStatus(status));
        }

        let bytes = response.bytes().await?;
        Self::parse_articles(&bytes)
    }

    /// Parse a feed document into articles, keeping the document's order.
    pub fn parse_articles(bytes: &[u8]) -> Result<Vec<Article>> {
        let parsed = parser::parse(bytes)?;
        Ok(parsed
            .entries
            .into_iter()
            .filter_map(Self::entry_to_article)
            .collect())
    }

    pub fn entry_to_article(entry: Entry) -> Option<Article> {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_else(|| "Untitled".to_string());

        let link = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();

        if link.is_empty() {
            warn!("Skipping entry with no link: {}", title);
            return None;
        }

        // Prefer the summary, fall back to the full content body
        let summary = entry
            .summary
            .as_ref()
            .map(|s| s.content.clone())
            .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
            .map(|raw| Self::plain_text_snippet(&raw))
            .filter(|s| !s.is_empty());

        let published: Option<DateTime<Utc>> = entry.published.or(entry.updated);

        let mut article = Article::new(link, title);
        article.summary = summary;
        article.published_at = published;
        Some(article)
    }

    /// Reduce an HTML fragment to plain text: tags dropped, a few common
    /// entities decoded, whitespace collapsed.
    pub fn plain_text_snippet(html: &str) -> String {
        let mut text = String::with_capacity(html.len());
        let mut in_tag = false;

        for ch in html.chars() {
            match ch {
                '<' => in_tag = true,
                '>' if in_tag => {
                    in_tag = false;
                    text.push(' ');
                }
                _ if !in_tag => text.push(ch),
                _ => {}
            }
        }

        let decoded = text
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&amp;", "&");

        decoded.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[async_trait]
impl FeedSource for Fetcher {
    async fn fetch(&self) -> Vec<Article> {
        match self.fetch_feed().await {
            Ok(articles) => {
                info!("Fetched {} articles", articles.len());
                articles
            }
            Err(e) => {
                warn!("Error fetching feed '{}': {}", self.url, e);
                Vec::new()
            }
        }
    }
}
