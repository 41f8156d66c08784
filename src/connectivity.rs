//! Network reachability monitoring
//!
//! The job pipeline calls [`ConnectivityMonitor::await_connectivity`] before every
//! fetch attempt, so work pauses during an outage instead of burning the retry budget.
//! The monitor is shared by all workers. Workers that probe at the same time share a
//! single probe, and online/offline transitions are announced once per transition no
//! matter how many workers are polling.

use crate::config::ConnectivityConfig;
use crate::error::{Error, Result};
use crate::types::Event;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Sentinel for "not currently offline"
const NOT_OFFLINE: u64 = u64::MAX;

/// A single reachability check
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Return true only if the network is reachable
    ///
    /// Implementations must return within a bounded time and must map every error
    /// to `false`.
    async fn probe(&self) -> bool;
}

/// Probe that issues an HTTP GET against a well-known endpoint
pub struct HttpConnectivityProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpConnectivityProbe {
    /// Create a probe for `url` with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    /// Create a probe from the connectivity section of the configuration
    pub fn from_config(config: &ConnectivityConfig) -> Result<Self> {
        Self::new(config.probe_url.clone(), config.probe_timeout)
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    async fn probe(&self) -> bool {
        let request = self.client.get(&self.url).send();
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => {
                let status = response.status();
                status.is_success() || status.is_redirection()
            }
            Ok(Err(e)) => {
                tracing::debug!(url = %self.url, error = %e, "connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(url = %self.url, "connectivity probe timed out");
                false
            }
        }
    }
}

/// Probe currently running, shared by every caller that arrives while it runs
type InFlight = Shared<BoxFuture<'static, bool>>;

/// Shared connectivity state plus the wait-for-network loop
pub struct ConnectivityMonitor {
    probe: Arc<dyn ConnectivityProbe>,
    poll_interval: Duration,
    offline_timeout: Option<Duration>,
    link: Arc<LinkState>,
    in_flight: Mutex<Option<InFlight>>,
}

impl ConnectivityMonitor {
    /// Create a monitor around `probe`
    pub fn new(probe: Arc<dyn ConnectivityProbe>, config: &ConnectivityConfig) -> Self {
        Self {
            probe,
            poll_interval: config.poll_interval,
            offline_timeout: config.offline_timeout,
            link: Arc::new(LinkState::new(None)),
            in_flight: Mutex::new(None),
        }
    }

    /// Also announce transitions on an event channel
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.link = Arc::new(LinkState::new(Some(event_tx)));
        self
    }

    /// Last known state (true until a probe fails)
    pub fn is_online(&self) -> bool {
        self.link.online.load(Ordering::SeqCst)
    }

    /// Run one probe and record the resulting state
    ///
    /// Callers arriving while a probe is running wait for that probe instead of
    /// starting another, so no caller waits longer than one probe. Only one probe
    /// runs at a time and its result is recorded before the next can start, so
    /// recorded state always follows probe order.
    pub async fn probe(&self) -> bool {
        let running = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(running) if running.peek().is_none() => running.clone(),
                _ => {
                    let probe = Arc::clone(&self.probe);
                    let link = Arc::clone(&self.link);
                    let fresh = async move {
                        let reachable = probe.probe().await;
                        link.record(reachable);
                        reachable
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };
        running.await
    }

    /// Wait until a probe succeeds
    ///
    /// Probes immediately, then every poll interval while offline. Returns
    /// [`Error::Offline`] only if an offline timeout is configured and elapses.
    pub async fn await_connectivity(&self) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.probe().await {
                return Ok(());
            }
            if let Some(limit) = self.offline_timeout
                && started.elapsed() >= limit
            {
                tracing::error!(
                    waited_secs = started.elapsed().as_secs(),
                    "Gave up waiting for network connectivity"
                );
                return Err(Error::Offline {
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Online flag and outage start, updated by finished probes
struct LinkState {
    online: AtomicBool,
    epoch: Instant,
    offline_since_ms: AtomicU64,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl LinkState {
    fn new(event_tx: Option<broadcast::Sender<Event>>) -> Self {
        Self {
            online: AtomicBool::new(true),
            epoch: Instant::now(),
            offline_since_ms: AtomicU64::new(NOT_OFFLINE),
            event_tx,
        }
    }

    fn record(&self, reachable: bool) {
        if reachable {
            self.mark_online();
        } else {
            self.mark_offline();
        }
    }

    fn mark_offline(&self) {
        if self.online.swap(false, Ordering::SeqCst) {
            let now_ms = self.epoch.elapsed().as_millis() as u64;
            self.offline_since_ms.store(now_ms, Ordering::SeqCst);
            tracing::warn!("Network connection lost, pausing downloads until it returns");
            self.emit(Event::ConnectivityLost);
        }
    }

    fn mark_online(&self) {
        if !self.online.swap(true, Ordering::SeqCst) {
            let since = self.offline_since_ms.swap(NOT_OFFLINE, Ordering::SeqCst);
            let offline_secs = if since == NOT_OFFLINE {
                0
            } else {
                let now_ms = self.epoch.elapsed().as_millis() as u64;
                now_ms.saturating_sub(since) / 1000
            };
            tracing::info!(offline_secs, "Network connection restored, resuming downloads");
            self.emit(Event::ConnectivityRestored { offline_secs });
        }
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            tx.send(event).ok();
        }
    }
}
