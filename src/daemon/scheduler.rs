//! Recheck loop feeding the update store.

use crate::common::updates::UpdateRecord;
use crate::daemon::server::SharedStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// The page-checking engine. Returns the pages that changed since their
/// last check.
pub trait Scraper: Send + Sync + 'static {
    fn check_all(&self) -> anyhow::Result<Vec<UpdateRecord>>;
}

/// Scraper that never reports a change, for a daemon without a page engine.
#[derive(Debug, Default)]
pub struct IdleScraper;

impl Scraper for IdleScraper {
    fn check_all(&self) -> anyhow::Result<Vec<UpdateRecord>> {
        debug!("no page engine configured, nothing to check");
        Ok(Vec::new())
    }
}

/// Runs the scraper every `interval`, or at once when `recheck` is notified.
pub struct Scheduler {
    store: SharedStore,
    recheck: Arc<Notify>,
    interval: Duration,
    scraper: Arc<dyn Scraper>,
}

impl Scheduler {
    pub fn new(
        store: SharedStore,
        recheck: Arc<Notify>,
        interval: Duration,
        scraper: Arc<dyn Scraper>,
    ) -> Self {
        Self {
            store,
            recheck,
            interval,
            scraper,
        }
    }

    /// Loop forever. The first check happens immediately.
    pub async fn run(self) {
        let mut ticker = ticker(self.interval);
        loop {
            tokio::select! {
                biased;
                _ = ticker.tick() => debug!("scheduled recheck"),
                _ = self.recheck.notified() => {
                    info!("forced recheck");
                    ticker.reset();
                }
            }
            self.check_once().await;
        }
    }

    /// Run the scraper once and merge what it found. Returns how many
    /// updates were new.
    pub async fn check_once(&self) -> usize {
        let scraper = self.scraper.clone();
        let records = match tokio::task::spawn_blocking(move || scraper.check_all()).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!("page check failed: {:#}", e);
                return 0;
            }
            Err(e) => {
                warn!("page check panicked: {}", e);
                return 0;
            }
        };

        let mut store = self.store.write().await;
        let added = store.merge(records);
        if added > 0 {
            info!("{} new updates", added);
            if let Err(e) = store.save() {
                warn!("updates not durably recorded: {}", e);
            }
        }
        added
    }
}

/// Interval that waits a full period after a late check instead of
/// bursting through the ticks it missed.
fn ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
