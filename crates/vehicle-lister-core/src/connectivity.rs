//! Online/offline signal.
//!
//! `ConnectivityMonitor` holds the current connectivity state and fans it out
//! to subscribers. Each subscription first yields the current value, then every
//! reported transition, and ends only when the monitor is dropped. Redundant
//! identical values may be delivered; consumers must tolerate them.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Create a monitor from the initial synchronous connectivity read.
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record a host-level transition. Every report is delivered, even when
    /// the value did not change.
    pub fn report(&self, online: bool) {
        self.tx.send_replace(online);
    }

    pub fn went_offline(&self) {
        info!("Connectivity lost");
        self.report(false);
    }

    pub fn went_online(&self) {
        info!("Connectivity restored");
        self.report(true);
    }

    /// Live stream of connectivity values, starting with the current one.
    pub fn subscribe(&self) -> impl Stream<Item = bool> + Send + 'static {
        let rx = self.tx.subscribe();
        stream::unfold((rx, true), |(mut rx, first)| async move {
            if first {
                let current = *rx.borrow_and_update();
                return Some((current, (rx, false)));
            }
            match rx.changed().await {
                Ok(()) => {
                    let value = *rx.borrow_and_update();
                    Some((value, (rx, false)))
                }
                // Monitor dropped
                Err(_) => None,
            }
        })
    }

    /// One-off reachability check, used for the initial state.
    pub async fn check(url: &str, timeout: Duration) -> bool {
        match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => head_ok(&client, url).await,
            Err(e) => {
                error!(error = %e, "Failed to build connectivity check client");
                false
            }
        }
    }

    /// Poll `url` with HEAD requests every `interval` and report transitions.
    pub fn spawn_watcher(&self, url: String, interval: Duration, timeout: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let client = match reqwest::Client::builder().timeout(timeout).build() {
                Ok(client) => client,
                Err(e) => {
                    error!(error = %e, "Failed to build connectivity check client");
                    return;
                }
            };

            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let online = head_ok(&client, &url).await;
                if online != monitor.is_online() {
                    if online {
                        monitor.went_online();
                    } else {
                        monitor.went_offline();
                    }
                }
            }
        })
    }
}

/// Any HTTP response counts as online; transport errors count as offline.
async fn head_ok(client: &reqwest::Client, url: &str) -> bool {
    let online = client.head(url).send().await.is_ok();
    debug!(online, url, "Connectivity check");
    online
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_subscription_starts_with_current_value() {
        let monitor = ConnectivityMonitor::new(true);
        let mut updates = Box::pin(monitor.subscribe());
        assert_eq!(updates.next().await, Some(true));

        monitor.went_offline();
        assert_eq!(updates.next().await, Some(false));
        monitor.went_online();
        assert_eq!(updates.next().await, Some(true));
    }

    #[tokio::test]
    async fn test_subscription_is_restartable() {
        let monitor = ConnectivityMonitor::new(true);
        monitor.went_offline();

        let mut first = Box::pin(monitor.subscribe());
        assert_eq!(first.next().await, Some(false));
        drop(first);

        let mut second = Box::pin(monitor.subscribe());
        assert_eq!(second.next().await, Some(false));
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn test_redundant_reports_are_delivered() {
        let monitor = ConnectivityMonitor::new(false);
        let mut updates = Box::pin(monitor.subscribe());
        assert_eq!(updates.next().await, Some(false));
        monitor.report(false);
        assert_eq!(updates.next().await, Some(false));
    }

    #[tokio::test]
    async fn test_stream_ends_when_monitor_dropped() {
        let monitor = ConnectivityMonitor::new(true);
        let mut updates = Box::pin(monitor.subscribe());
        assert_eq!(updates.next().await, Some(true));
        drop(monitor);
        assert_eq!(updates.next().await, None);
    }
}
