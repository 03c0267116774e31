use chrono::{DateTime, Utc};

/// One entry taken from the feed.
///
/// `id` is the canonical link, so `id == link` for every article built by the
/// fetcher. Both fields are kept so callers can read whichever fits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub link: String,
}

impl Article {
    pub fn new(link: impl Into<String>, title: impl Into<String>) -> Self {
        let link = link.into();
        Self {
            id: link.clone(),
            title: title.into(),
            summary: None,
            published_at: None,
            link,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}
