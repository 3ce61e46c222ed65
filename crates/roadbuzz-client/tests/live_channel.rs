//! Integration tests for the push-channel lifecycle.
//!
//! Uses a scripted in-memory transport so the tests control exactly when
//! connects complete, when messages arrive, and when the transport
//! fails. Covers the subscribe/unsubscribe reference counting, the
//! `Disconnected -> Connecting -> Connected` transitions, reconnect
//! after transport errors, reconcile-on-connect, and the no-delivery
//! guarantee after unsubscribe.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use roadbuzz_client::gateway::{BoxFuture, ReportsGateway};
use roadbuzz_client::lifecycle::{ChannelState, LiveUpdateFeed};
use roadbuzz_client::transport::{PushConnection, PushTransport};
use roadbuzz_client::{ClientError, SnapshotFetcher};
use roadbuzz_core::{RecencyPolicy, Report, ReportId, ReportStore};
use secrecy::SecretString;
use tokio::sync::mpsc;
use tokio::time::timeout;

const STEP: Duration = Duration::from_secs(5);
const RECONNECT: Duration = Duration::from_millis(10);

/// One scripted connection; the test side feeds messages through `tx`.
struct TestConnection {
    rx: mpsc::UnboundedReceiver<Result<String, ClientError>>,
}

impl PushConnection for TestConnection {
    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<String>, ClientError>> {
        Box::pin(async move {
            match self.rx.recv().await {
                Some(Ok(message)) => Ok(Some(message)),
                Some(Err(error)) => Err(error),
                None => Ok(None),
            }
        })
    }
}

/// Transport whose `connect` completes only when the test hands it a
/// connection, so `Connecting` is observable for as long as needed.
struct TestTransport {
    pending: tokio::sync::Mutex<mpsc::UnboundedReceiver<TestConnection>>,
    connects: AtomicU32,
}

impl TestTransport {
    fn new() -> (Arc<Self>, mpsc::UnboundedSender<TestConnection>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                pending: tokio::sync::Mutex::new(rx),
                connects: AtomicU32::new(0),
            }),
            tx,
        )
    }

    fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

impl PushTransport for TestTransport {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn PushConnection>, ClientError>> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let connection = self.pending.lock().await.recv().await;
            connection
                .map(|c| Box::new(c) as Box<dyn PushConnection>)
                .ok_or_else(|| ClientError::Transport("scripted transport exhausted".into()))
        })
    }
}

fn open_connection(
    tx: &mpsc::UnboundedSender<TestConnection>,
) -> mpsc::UnboundedSender<Result<String, ClientError>> {
    let (msg_tx, msg_rx) = mpsc::unbounded_channel();
    tx.send(TestConnection { rx: msg_rx })
        .expect("transport dropped");
    msg_tx
}

fn report_json(id: i64) -> String {
    serde_json::json!({
        "id": id,
        "title": format!("report {id}"),
        "category": "ACCIDENT",
        "severity": "HIGH",
        "latitude": 23.8,
        "longitude": 90.4,
        "active": true,
        "createdAt": Utc::now().to_rfc3339(),
    })
    .to_string()
}

fn store() -> Arc<ReportStore> {
    Arc::new(ReportStore::new(10, RecencyPolicy::default()))
}

async fn wait_for_state(feed: &LiveUpdateFeed, want: fn(&ChannelState) -> bool) -> ChannelState {
    let mut watch = feed.state_changes();
    let state = *timeout(STEP, watch.wait_for(want))
        .await
        .expect("timed out waiting for channel state")
        .expect("state channel closed");
    state
}

#[tokio::test]
async fn first_subscribe_connects_and_last_unsubscribe_tears_down() {
    let (transport, connect_tx) = TestTransport::new();
    let store = store();
    let feed = LiveUpdateFeed::new(transport, Arc::clone(&store), None, RECONNECT);
    assert_eq!(feed.state(), ChannelState::Disconnected);

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let mut subscription = feed.subscribe(move |report: &Report| {
        let _ = seen_tx.send(report.clone());
    });

    // First subscriber: DISCONNECTED -> CONNECTING(1) -> CONNECTED.
    wait_for_state(&feed, |s| matches!(s, ChannelState::Connecting { attempt: 1 })).await;
    let messages = open_connection(&connect_tx);
    wait_for_state(&feed, |s| *s == ChannelState::Connected).await;

    messages.send(Ok(report_json(1))).unwrap();
    let delivered = timeout(STEP, seen_rx.recv()).await.unwrap().unwrap();
    assert_eq!(delivered.id, ReportId(1));
    assert_eq!(store.len(), 1);

    // Sole subscriber leaves: back to DISCONNECTED.
    subscription.unsubscribe();
    assert_eq!(feed.state(), ChannelState::Disconnected);
    assert_eq!(feed.subscriber_count(), 0);

    // Late message from the transport side must not be delivered.
    let _ = messages.send(Ok(report_json(2)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(seen_rx.try_recv().is_err());
    assert!(store.get(ReportId(2)).is_none());
}

#[tokio::test]
async fn unsubscribe_is_idempotent_and_refcount_holds_the_channel_open() {
    let (transport, connect_tx) = TestTransport::new();
    let feed = LiveUpdateFeed::new(transport, store(), None, RECONNECT);

    let mut first = feed.subscribe(|_| {});
    let second = feed.subscribe(|_| {});
    assert_eq!(feed.subscriber_count(), 2);

    let _messages = open_connection(&connect_tx);
    wait_for_state(&feed, |s| *s == ChannelState::Connected).await;

    first.unsubscribe();
    first.unsubscribe();
    assert!(!first.is_active());
    assert_eq!(feed.subscriber_count(), 1);
    assert_eq!(feed.state(), ChannelState::Connected);

    drop(second);
    assert_eq!(feed.state(), ChannelState::Disconnected);
}

#[tokio::test]
async fn transport_error_reconnects_and_keeps_applied_state() {
    let (transport, connect_tx) = TestTransport::new();
    let store = store();
    let feed = LiveUpdateFeed::new(
        Arc::clone(&transport) as Arc<dyn PushTransport>,
        Arc::clone(&store),
        None,
        RECONNECT,
    );

    let _subscription = feed.subscribe(|_| {});
    let messages = open_connection(&connect_tx);
    wait_for_state(&feed, |s| *s == ChannelState::Connected).await;
    messages.send(Ok(report_json(1))).unwrap();

    // Drop the link; the already-applied report must survive the outage.
    messages
        .send(Err(ClientError::Transport("connection reset".into())))
        .unwrap();
    wait_for_state(&feed, |s| matches!(s, ChannelState::Connecting { .. })).await;
    assert_eq!(store.len(), 1);

    let messages = open_connection(&connect_tx);
    wait_for_state(&feed, |s| *s == ChannelState::Connected).await;
    assert!(transport.connect_count() >= 2);

    messages.send(Ok(report_json(2))).unwrap();
    timeout(STEP, async {
        while store.len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("second report never applied");
}

#[tokio::test]
async fn malformed_events_are_dropped_without_killing_the_subscriber() {
    let (transport, connect_tx) = TestTransport::new();
    let store = store();
    let feed = LiveUpdateFeed::new(transport, Arc::clone(&store), None, RECONNECT);

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let _subscription = feed.subscribe(move |report: &Report| {
        let _ = seen_tx.send(report.id);
    });
    let messages = open_connection(&connect_tx);
    wait_for_state(&feed, |s| *s == ChannelState::Connected).await;

    messages.send(Ok("not json at all".to_string())).unwrap();
    messages
        .send(Ok(r#"{"title":"no id or createdAt"}"#.to_string()))
        .unwrap();
    messages.send(Ok(report_json(7))).unwrap();

    let delivered = timeout(STEP, seen_rx.recv()).await.unwrap().unwrap();
    assert_eq!(delivered, ReportId(7));
    assert_eq!(feed.events_dropped(), 2);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn duplicate_event_delivery_is_a_safe_noop() {
    let (transport, connect_tx) = TestTransport::new();
    let store = store();
    let feed = LiveUpdateFeed::new(transport, Arc::clone(&store), None, RECONNECT);

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let _subscription = feed.subscribe(move |report: &Report| {
        let _ = seen_tx.send(report.clone());
    });
    let messages = open_connection(&connect_tx);
    wait_for_state(&feed, |s| *s == ChannelState::Connected).await;

    let event = report_json(3);
    messages.send(Ok(event.clone())).unwrap();
    messages.send(Ok(event)).unwrap();

    let first = timeout(STEP, seen_rx.recv()).await.unwrap().unwrap();
    let second = timeout(STEP, seen_rx.recv()).await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(store.len(), 1);
}

/// Gateway whose snapshot is scripted; used to verify the
/// reconcile-on-connect fetch.
struct SnapshotOnlyGateway {
    rows: Vec<serde_json::Value>,
    fetches: AtomicU32,
}

impl ReportsGateway for SnapshotOnlyGateway {
    fn fetch_recent(
        &self,
        _hours: u32,
    ) -> BoxFuture<'_, Result<Vec<serde_json::Value>, ClientError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.clone();
        Box::pin(async move { Ok(rows) })
    }

    fn vote<'a>(
        &'a self,
        _id: ReportId,
        _vote: roadbuzz_core::VoteType,
        _token: &'a SecretString,
    ) -> BoxFuture<'a, Result<Report, ClientError>> {
        unimplemented!("not used here")
    }

    fn create_report<'a>(
        &'a self,
        _draft: &'a roadbuzz_core::NewReport,
        _token: &'a SecretString,
    ) -> BoxFuture<'a, Result<Report, ClientError>> {
        unimplemented!("not used here")
    }

    fn delete_report<'a>(
        &'a self,
        _id: ReportId,
        _token: &'a SecretString,
    ) -> BoxFuture<'a, Result<(), ClientError>> {
        unimplemented!("not used here")
    }
}

#[tokio::test]
async fn reconnect_triggers_a_reconciling_snapshot_fetch() {
    let (transport, connect_tx) = TestTransport::new();
    let store = store();
    let gateway = Arc::new(SnapshotOnlyGateway {
        rows: vec![serde_json::from_str(&report_json(42)).unwrap()],
        fetches: AtomicU32::new(0),
    });
    let fetcher = Arc::new(SnapshotFetcher::new(
        Arc::clone(&gateway) as Arc<dyn ReportsGateway>,
        Arc::clone(&store),
    ));
    let feed = LiveUpdateFeed::new(transport, Arc::clone(&store), Some(fetcher), RECONNECT);

    let _subscription = feed.subscribe(|_| {});
    let messages = open_connection(&connect_tx);
    wait_for_state(&feed, |s| *s == ChannelState::Connected).await;

    // The missed-event gap is closed by the snapshot, not the stream.
    timeout(STEP, async {
        while store.get(ReportId(42)).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("snapshot never reconciled");
    assert_eq!(gateway.fetches.load(Ordering::SeqCst), 1);

    // Force a reconnect; the snapshot runs again.
    messages
        .send(Err(ClientError::Transport("gone".into())))
        .unwrap();
    let _messages = open_connection(&connect_tx);
    wait_for_state(&feed, |s| *s == ChannelState::Connected).await;
    timeout(STEP, async {
        while gateway.fetches.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("no reconciling fetch after reconnect");
}
