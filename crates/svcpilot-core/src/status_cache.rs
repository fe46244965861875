//! Last-known service status with periodic and on-demand refresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::status_source::StatusSource;
use crate::StatusInfo;

/// A status value together with the time it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedStatus {
    pub info: StatusInfo,
    pub fetched_at: DateTime<Utc>,
}

/// Holds the last status read. `None` only until the first refresh lands.
pub struct StatusCache {
    source: Arc<dyn StatusSource>,
    latest: watch::Sender<Option<CachedStatus>>,
    stale: AtomicBool,
    wake: Notify,
}

impl StatusCache {
    pub fn new(source: Arc<dyn StatusSource>) -> Arc<Self> {
        let (latest, _) = watch::channel(None);
        Arc::new(Self {
            source,
            latest,
            stale: AtomicBool::new(true),
            wake: Notify::new(),
        })
    }

    /// Cached status, or `None` while the first read is pending.
    pub fn current(&self) -> Option<StatusInfo> {
        self.latest.borrow().as_ref().map(|cached| cached.info.clone())
    }

    pub fn snapshot(&self) -> Option<CachedStatus> {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CachedStatus>> {
        self.latest.subscribe()
    }

    /// Cached status unless it was invalidated or never fetched.
    pub async fn get(&self) -> StatusInfo {
        if !self.stale.load(Ordering::Acquire) {
            if let Some(info) = self.current() {
                return info;
            }
        }
        self.refetch().await
    }

    /// Fetch from the source and replace the cached value.
    ///
    /// A failed fetch yields the not-installed fallback; stale "running"
    /// state is never preserved.
    pub async fn refetch(&self) -> StatusInfo {
        self.stale.store(false, Ordering::Release);
        let info = self.source.fetch_status().await;
        let previous = self.latest.send_replace(Some(CachedStatus {
            info: info.clone(),
            fetched_at: Utc::now(),
        }));
        let previous_status = previous.map(|cached| cached.info.status);
        if previous_status != Some(info.status) {
            info!(status = %info.status, previous = ?previous_status, "service status changed");
        }
        info
    }

    /// Mark the cached value stale and wake the poller for an early refresh.
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Refresh on a fixed cadence and whenever the cache is invalidated.
    ///
    /// Runs independently of in-flight mutations; abort the handle to stop.
    pub fn spawn_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = cache.wake.notified() => {}
                }
                cache.refetch().await;
            }
        })
    }
}
