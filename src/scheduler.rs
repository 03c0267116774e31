use std::future::Future;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use crate::fetcher::FeedSource;
use crate::notifier::Notify;
use crate::relay::Relay;

/// Drives the relay: one run at startup, then one cycle per interval.
pub struct Scheduler {
    interval: Duration,
    post_latest_on_start: bool,
}

impl Scheduler {
    pub fn new(interval_minutes: u64, post_latest_on_start: bool) -> Self {
        Self {
            interval: Duration::from_secs(interval_minutes.max(1) * 60),
            post_latest_on_start,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The unconditional run at process start.
    ///
    /// In manual test mode this is the marked test post instead of a cycle.
    pub async fn run_startup<F: FeedSource, N: Notify>(&self, relay: &Relay<F, N>) {
        if self.post_latest_on_start {
            info!("POST_LATEST_ON_START enabled, posting latest article for testing");
            relay.post_latest().await;
        } else {
            relay.run_cycle().await;
        }
    }

    /// Run the startup pass, then tick until `shutdown` resolves.
    ///
    /// Cycles are awaited inline, so a slow cycle delays the next tick rather
    /// than overlapping it. Shutdown is observed between cycles.
    ///
    /// Every tick goes through [`Relay::run_cycle`], so a store still in
    /// first-run state is bootstrapped on the tick. That includes a start in
    /// test mode on an empty store: the first tick announces only the newest
    /// article and seeds the rest instead of announcing the whole feed.
    pub async fn run_until<F, N, S>(&self, relay: &Relay<F, N>, shutdown: S)
    where
        F: FeedSource,
        N: Notify,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.run_startup(relay).await;

        info!(
            "Relay started, checking for updates every {} minutes",
            self.interval.as_secs() / 60
        );

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping relay");
                    break;
                }
                _ = ticker.tick() => {
                    info!("Starting scheduled check");
                    relay.run_cycle().await;
                }
            }
        }
    }
}
