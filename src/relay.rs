//! The relay engine: bootstrap on first run, then diff-and-dispatch cycles.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::article::Article;
use crate::clock::{Clock, SystemClock};
use crate::fetcher::FeedSource;
use crate::notifier::Notify;
use crate::rate_limit::RateLimiter;
use crate::store::DedupStore;

/// Pause between successful posts within one cycle.
pub const DEFAULT_DISPATCH_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// First-run seeding of the store.
    Bootstrap,
    /// Regular diff-and-dispatch pass.
    Sync,
    /// Another cycle was still running.
    Skipped,
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub kind: CycleKind,
    pub fetched: usize,
    pub new: usize,
    pub dispatched: usize,
    pub rate_limited: usize,
    pub failed: usize,
}

impl CycleReport {
    fn new(kind: CycleKind) -> Self {
        Self {
            kind,
            fetched: 0,
            new: 0,
            dispatched: 0,
            rate_limited: 0,
            failed: 0,
        }
    }
}

enum Dispatch {
    Sent,
    RateLimited,
    Failed,
}

struct RelayState {
    store: DedupStore,
    limiter: RateLimiter,
}

pub struct Relay<F, N> {
    source: F,
    notifier: N,
    clock: Arc<dyn Clock>,
    ping_everyone: bool,
    dispatch_delay: Duration,
    state: Mutex<RelayState>,
}

impl<F: FeedSource, N: Notify> Relay<F, N> {
    pub fn new(source: F, notifier: N, store: DedupStore, limiter: RateLimiter) -> Self {
        Self {
            source,
            notifier,
            clock: Arc::new(SystemClock),
            ping_everyone: true,
            dispatch_delay: DEFAULT_DISPATCH_DELAY,
            state: Mutex::new(RelayState { store, limiter }),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ping_everyone(mut self, ping_everyone: bool) -> Self {
        self.ping_everyone = ping_everyone;
        self
    }

    pub fn with_dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = delay;
        self
    }

    /// Run one cycle: Bootstrap while the store is in first-run state,
    /// otherwise the regular sync pass.
    ///
    /// Only one cycle runs at a time. A call made while another cycle holds
    /// the state returns immediately with [`CycleKind::Skipped`].
    pub async fn run_cycle(&self) -> CycleReport {
        let Ok(mut state) = self.state.try_lock() else {
            info!("Cycle already in progress, skipping");
            return CycleReport::new(CycleKind::Skipped);
        };

        let report = if state.store.is_first_run() {
            self.bootstrap(&mut state).await
        } else {
            self.sync(&mut state).await
        };

        info!(
            kind = ?report.kind,
            fetched = report.fetched,
            new = report.new,
            dispatched = report.dispatched,
            rate_limited = report.rate_limited,
            failed = report.failed,
            "Cycle complete"
        );
        report
    }

    /// Post the newest article as a marked test message.
    ///
    /// Neither consults the rate limiter nor touches the store.
    pub async fn post_latest(&self) -> bool {
        info!("Fetching latest article for testing");

        let articles = self.source.fetch().await;
        let Some(latest) = articles.first() else {
            info!("No articles found in feed");
            return false;
        };

        info!("Posting latest article: {}", latest.title);
        self.notifier.send_test(latest).await
    }

    pub async fn is_first_run(&self) -> bool {
        self.state.lock().await.store.is_first_run()
    }

    /// Snapshot of the announced ids in insertion order.
    pub async fn seen_ids(&self) -> Vec<String> {
        self.state.lock().await.store.ids().to_vec()
    }

    async fn bootstrap(&self, state: &mut RelayState) -> CycleReport {
        let mut report = CycleReport::new(CycleKind::Bootstrap);
        info!("First run, announcing only the latest article");

        let articles = self.source.fetch().await;
        report.fetched = articles.len();

        let Some(latest) = articles.first() else {
            info!("No articles found in feed");
            return report;
        };
        report.new = 1;

        match self.dispatch(state, latest).await {
            Dispatch::Sent => {
                report.dispatched = 1;
                for article in &articles {
                    state.store.add(article.id.as_str());
                }
                state.store.mark_seeded();
                info!("Seeded history with {} articles", articles.len());
                self.persist(&state.store).await;
            }
            Dispatch::RateLimited => report.rate_limited = 1,
            Dispatch::Failed => report.failed = 1,
        }

        report
    }

    async fn sync(&self, state: &mut RelayState) -> CycleReport {
        let mut report = CycleReport::new(CycleKind::Sync);
        info!("Checking for new posts");

        let articles = self.source.fetch().await;
        report.fetched = articles.len();

        // A feed may list the same link twice; announce it once
        let mut queued = HashSet::new();
        let mut fresh: Vec<&Article> = articles
            .iter()
            .filter(|a| !state.store.contains(&a.id) && queued.insert(a.id.as_str()))
            .collect();
        report.new = fresh.len();

        if fresh.is_empty() {
            info!("No new articles found");
            return report;
        }

        info!("Found {} new articles", fresh.len());

        // Oldest first
        fresh.reverse();
        let total = fresh.len();

        for (idx, article) in fresh.into_iter().enumerate() {
            match self.dispatch(state, article).await {
                Dispatch::Sent => {
                    report.dispatched += 1;
                    state.store.add(article.id.as_str());
                    self.persist(&state.store).await;

                    if idx + 1 < total && !self.dispatch_delay.is_zero() {
                        tokio::time::sleep(self.dispatch_delay).await;
                    }
                }
                Dispatch::RateLimited => report.rate_limited += 1,
                Dispatch::Failed => report.failed += 1,
            }
        }

        report
    }

    async fn dispatch(&self, state: &mut RelayState, article: &Article) -> Dispatch {
        if !state.limiter.try_acquire(self.clock.now()) {
            info!(title = %article.title, "Rate limit reached, deferring to next cycle");
            return Dispatch::RateLimited;
        }

        if self.notifier.send(article, self.ping_everyone).await {
            Dispatch::Sent
        } else {
            warn!(title = %article.title, "Dispatch failed, will retry next cycle");
            Dispatch::Failed
        }
    }

    async fn persist(&self, store: &DedupStore) {
        if let Err(e) = store.persist().await {
            error!("Error saving posted articles to {}: {}", store.path().display(), e);
        }
    }
}
