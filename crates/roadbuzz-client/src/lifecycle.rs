//! Subscription lifecycle for the push channel.
//!
//! Logical subscribers register callbacks; the underlying connection is
//! reference-counted. The first subscription opens it, the last
//! unsubscribe tears it down. While subscribed, the supervisor folds
//! every decoded event into the store and fans it out to callbacks.
//!
//! State machine: `Disconnected -> Connecting { attempt } -> Connected`,
//! back to `Connecting` on transport error after a fixed reconnect delay
//! (deliberately not exponential; a persistent outage is reconciled by
//! snapshot fetches, not by the channel). The channel does not replay
//! events missed while disconnected, so on every successful (re)connect
//! the supervisor pulls a snapshot to close the gap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use roadbuzz_core::{Report, ReportStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::fetcher::SnapshotFetcher;
use crate::transport::{PushConnection, PushTransport};

/// Connection state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No subscribers; no connection.
    #[default]
    Disconnected,
    /// Connection attempt in flight. `attempt` counts consecutive tries
    /// since the last successful connect, starting at 1.
    Connecting {
        /// Consecutive attempt number.
        attempt: u32,
    },
    /// Channel established; events are flowing.
    Connected,
}

type ReportCallback = dyn Fn(&Report) + Send + Sync;

struct SubscriberTable {
    next_id: u64,
    callbacks: HashMap<u64, Arc<ReportCallback>>,
    worker: Option<JoinHandle<()>>,
}

/// Reference-counted owner of the push-channel connection.
///
/// Cheap to clone; all clones share one connection and one subscriber
/// table.
#[derive(Clone)]
pub struct LiveUpdateFeed {
    shared: Arc<FeedShared>,
}

struct FeedShared {
    transport: Arc<dyn PushTransport>,
    store: Arc<ReportStore>,
    /// Snapshot fetcher run after every successful (re)connect; `None`
    /// disables reconcile-on-connect.
    fetcher: Option<Arc<SnapshotFetcher>>,
    reconnect_delay: Duration,
    state: watch::Sender<ChannelState>,
    table: Mutex<SubscriberTable>,
    events_dropped: AtomicU64,
}

impl LiveUpdateFeed {
    /// Creates a feed over the given transport and store.
    ///
    /// `fetcher` enables the reconcile-on-connect snapshot pull.
    #[must_use]
    pub fn new(
        transport: Arc<dyn PushTransport>,
        store: Arc<ReportStore>,
        fetcher: Option<Arc<SnapshotFetcher>>,
        reconnect_delay: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            shared: Arc::new(FeedShared {
                transport,
                store,
                fetcher,
                reconnect_delay,
                state,
                table: Mutex::new(SubscriberTable {
                    next_id: 0,
                    callbacks: HashMap::new(),
                    worker: None,
                }),
                events_dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Registers a callback for decoded report events and returns its
    /// subscription handle. The first registration opens the channel.
    ///
    /// Must be called within a tokio runtime; the connection worker is
    /// spawned onto it.
    pub fn subscribe(&self, callback: impl Fn(&Report) + Send + Sync + 'static) -> Subscription {
        let mut table = self.shared.lock_table();
        let id = table.next_id;
        table.next_id += 1;
        table.callbacks.insert(id, Arc::new(callback));
        if table.callbacks.len() == 1 {
            debug!("first subscriber, opening push channel");
            let shared = Arc::clone(&self.shared);
            table.worker = Some(tokio::spawn(run_channel(shared)));
        }
        drop(table);
        Subscription {
            shared: Arc::clone(&self.shared),
            id,
            active: true,
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    /// Watches connection state transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Number of registered logical subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.lock_table().callbacks.len()
    }

    /// Running count of malformed events dropped off the channel.
    #[must_use]
    pub fn events_dropped(&self) -> u64 {
        self.shared.events_dropped.load(Ordering::Relaxed)
    }
}

impl FeedShared {
    fn lock_table(&self) -> std::sync::MutexGuard<'_, SubscriberTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Removes a subscriber; tears the channel down when it was the
    /// last one.
    fn remove_subscriber(&self, id: u64) {
        let mut table = self.lock_table();
        if table.callbacks.remove(&id).is_none() {
            return;
        }
        if table.callbacks.is_empty() {
            if let Some(worker) = table.worker.take() {
                worker.abort();
            }
            // Dropping the aborted worker drops the connection it owned.
            self.state.send_replace(ChannelState::Disconnected);
            info!("last subscriber gone, push channel closed");
        }
    }

    /// Decodes one raw channel message, folds it into the store, and
    /// fans it out. Malformed payloads are dropped and counted, never
    /// fatal.
    fn ingest(&self, raw: &str) {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(error) => {
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(%error, "dropping undecodable channel message");
                return;
            },
        };
        let report = match Report::decode(value) {
            Ok(report) => report,
            Err(error) => {
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(%error, "dropping invalid report event");
                return;
            },
        };
        let outcome = self.store.apply_update(report.clone(), Utc::now());
        debug!(report_id = %report.id, ?outcome, "channel event merged");
        self.dispatch(&report);
    }

    /// Fans an event out to the registered callbacks. The table lock is
    /// not held across callback invocations; membership is re-checked
    /// per callback, so an event in flight at unsubscribe time is
    /// dropped on a best-effort basis. A callback that has already
    /// passed the re-check on another thread may still finish running
    /// after `unsubscribe` returns.
    fn dispatch(&self, report: &Report) {
        let targets: Vec<(u64, Arc<ReportCallback>)> = {
            let table = self.lock_table();
            table
                .callbacks
                .iter()
                .map(|(id, cb)| (*id, Arc::clone(cb)))
                .collect()
        };
        for (id, callback) in targets {
            if self.lock_table().callbacks.contains_key(&id) {
                callback(report);
            }
        }
    }
}

/// Connection worker: runs for as long as at least one subscriber is
/// registered; aborted by the last unsubscribe.
async fn run_channel(shared: Arc<FeedShared>) {
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        shared
            .state
            .send_replace(ChannelState::Connecting { attempt });
        match shared.transport.connect().await {
            Ok(mut connection) => {
                shared.state.send_replace(ChannelState::Connected);
                info!("push channel connected");
                attempt = 0;
                // The channel does not replay missed events; reconcile
                // the gap with a fresh snapshot.
                if let Some(fetcher) = &shared.fetcher {
                    if let Err(error) = fetcher.fetch_and_replace().await {
                        warn!(%error, "post-connect snapshot reconciliation failed");
                    }
                }
                loop {
                    match connection.next_message().await {
                        Ok(Some(raw)) => shared.ingest(&raw),
                        Ok(None) => {
                            info!("push channel closed by server");
                            break;
                        },
                        Err(error) => {
                            warn!(%error, "push channel transport error");
                            break;
                        },
                    }
                }
            },
            Err(error) => {
                warn!(%error, attempt, "push channel connect failed");
            },
        }
        tokio::time::sleep(shared.reconnect_delay).await;
    }
}

/// Handle for one logical subscriber. Unsubscribes on drop; explicit
/// [`Subscription::unsubscribe`] is idempotent.
pub struct Subscription {
    shared: Arc<FeedShared>,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Deregisters the callback. Safe to call repeatedly; the second
    /// and later calls are no-ops.
    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.shared.remove_subscriber(self.id);
    }

    /// True until the first `unsubscribe` (or drop).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
