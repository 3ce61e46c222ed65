//! Wired-up client facade.
//!
//! Owns the store and the collaborators around it. UI layers hold one of
//! these (or clones of its feed/store handles) instead of reaching into
//! module-level globals.

use std::sync::Arc;

use roadbuzz_core::{
    ClientConfig, NewReport, RecencyPolicy, Report, ReportId, ReportStore, VoteType,
};

use crate::authoring::ReportAuthoring;
use crate::error::ClientError;
use crate::fetcher::SnapshotFetcher;
use crate::gateway::{HttpReportsGateway, ReportsGateway};
use crate::lifecycle::{ChannelState, LiveUpdateFeed, Subscription};
use crate::session::Session;
use crate::transport::{HttpStreamTransport, PushTransport};
use crate::voting::VoteCommandHandler;

/// The assembled roadbuzz client: store, fetcher, command handlers, and
/// the live-update feed.
pub struct RoadbuzzClient {
    store: Arc<ReportStore>,
    session: Arc<Session>,
    fetcher: Arc<SnapshotFetcher>,
    votes: VoteCommandHandler,
    authoring: ReportAuthoring,
    feed: LiveUpdateFeed,
}

impl RoadbuzzClient {
    /// Builds a client with HTTP collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the config fails validation
    /// or an HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config
            .validate()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        let gateway: Arc<dyn ReportsGateway> =
            Arc::new(HttpReportsGateway::new(&config.api_base_url)?);
        let transport: Arc<dyn PushTransport> =
            Arc::new(HttpStreamTransport::new(&config.push_url)?);
        Ok(Self::with_parts(gateway, transport, config))
    }

    /// Builds a client over caller-supplied collaborators. This is the
    /// seam integration tests use to substitute fakes.
    #[must_use]
    pub fn with_parts(
        gateway: Arc<dyn ReportsGateway>,
        transport: Arc<dyn PushTransport>,
        config: &ClientConfig,
    ) -> Self {
        let store = Arc::new(ReportStore::new(
            config.max_items,
            RecencyPolicy::new(config.recency_window),
        ));
        let session = Arc::new(Session::anonymous());
        let fetcher = Arc::new(SnapshotFetcher::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
        ));
        let feed = LiveUpdateFeed::new(
            transport,
            Arc::clone(&store),
            config.snapshot_on_connect.then(|| Arc::clone(&fetcher)),
            config.reconnect_delay,
        );
        let votes = VoteCommandHandler::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            Arc::clone(&session),
        );
        let authoring = ReportAuthoring::new(gateway, Arc::clone(&store), Arc::clone(&session));
        Self {
            store,
            session,
            fetcher,
            votes,
            authoring,
            feed,
        }
    }

    /// The reconciled live view, most recent first.
    #[must_use]
    pub fn current_view(&self) -> Vec<Report> {
        self.store.current_view()
    }

    /// Shared handle to the store.
    #[must_use]
    pub fn store(&self) -> Arc<ReportStore> {
        Arc::clone(&self.store)
    }

    /// The caller session, for sign-in/sign-out.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Pulls a snapshot and replaces the visible set. Manual refresh;
    /// also called automatically after each channel (re)connect when
    /// `snapshot_on_connect` is set.
    ///
    /// # Errors
    ///
    /// Propagates the fetch error; the store is untouched on failure.
    pub async fn refresh(&self) -> Result<usize, ClientError> {
        self.fetcher.fetch_and_replace().await
    }

    /// Casts a vote; see [`VoteCommandHandler::vote`].
    ///
    /// # Errors
    ///
    /// See [`VoteCommandHandler::vote`].
    pub async fn vote(&self, id: ReportId, vote: VoteType) -> Result<Report, ClientError> {
        self.votes.vote(id, vote).await
    }

    /// Files a new report; see [`ReportAuthoring::create_report`].
    ///
    /// # Errors
    ///
    /// See [`ReportAuthoring::create_report`].
    pub async fn create_report(&self, draft: NewReport) -> Result<Report, ClientError> {
        self.authoring.create_report(draft).await
    }

    /// Retires a report; see [`ReportAuthoring::delete_report`].
    ///
    /// # Errors
    ///
    /// See [`ReportAuthoring::delete_report`].
    pub async fn delete_report(&self, id: ReportId) -> Result<(), ClientError> {
        self.authoring.delete_report(id).await
    }

    /// Registers a live-update callback; the first subscription opens
    /// the push channel.
    pub fn subscribe(&self, callback: impl Fn(&Report) + Send + Sync + 'static) -> Subscription {
        self.feed.subscribe(callback)
    }

    /// Current push-channel state.
    #[must_use]
    pub fn channel_state(&self) -> ChannelState {
        self.feed.state()
    }

    /// The live-update feed, for state watching or extra subscriptions.
    #[must_use]
    pub fn feed(&self) -> &LiveUpdateFeed {
        &self.feed
    }
}
