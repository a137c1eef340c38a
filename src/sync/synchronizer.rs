//! The account status synchronizer: swaps sessions as the tracked account
//! changes and exposes one stable, reactively-updated view channel.

use crate::rpc::client::CodeReader;
use crate::runtime::config::SyncConfig;
use crate::runtime::telemetry::Telemetry;
use crate::service::client::MetadataSource;
use crate::sync::key::AccountKey;
use crate::sync::merge::StatusView;
use crate::sync::session::{SessionParams, SyncSession};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Reconciles on-chain deployment status and off-chain metadata for one
/// account at a time.
///
/// Consumers subscribe once and keep their receiver across account changes;
/// every session publishes into the same channel. Changing the tracked key
/// tears the old session down completely (cancel, then join) before the new
/// one starts, so a late probe or fetch can never leak into the new view.
pub struct AccountSynchronizer<C, M> {
    chain: Arc<C>,
    service: Arc<M>,
    config: SyncConfig,
    telemetry: Arc<Telemetry>,
    shutdown_root: CancellationToken,
    status_tx: watch::Sender<StatusView>,
    session: Option<SyncSession<M>>,
}

impl<C, M> AccountSynchronizer<C, M>
where
    C: CodeReader + 'static,
    M: MetadataSource + 'static,
{
    /// Creates a synchronizer with its own root cancellation token. Use
    /// [`Self::with_cancellation_token`] to integrate with an existing
    /// shutdown mechanism.
    pub fn new(config: SyncConfig, chain: Arc<C>, service: Arc<M>) -> Self {
        Self::with_cancellation_token(config, chain, service, CancellationToken::new())
    }

    pub fn with_cancellation_token(
        config: SyncConfig,
        chain: Arc<C>,
        service: Arc<M>,
        shutdown_root: CancellationToken,
    ) -> Self {
        let (status_tx, _) = watch::channel(StatusView::default());
        Self {
            chain,
            service,
            config,
            telemetry: Arc::new(Telemetry::default()),
            shutdown_root,
            status_tx,
            session: None,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns a clone of the telemetry handle for observability.
    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Key of the currently tracked account, if any.
    pub fn account(&self) -> Option<&AccountKey> {
        self.session.as_ref().map(|session| session.key())
    }

    /// Subscribes to the merged view. The receiver stays valid across
    /// account changes.
    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.status_tx.subscribe()
    }

    /// Latest merged view.
    pub fn current(&self) -> StatusView {
        *self.status_tx.borrow()
    }

    /// Starts tracking `key`, tearing down any previous session first.
    /// Re-setting the key already being tracked is a no-op.
    pub async fn set_account(&mut self, key: AccountKey) {
        if self
            .session
            .as_ref()
            .is_some_and(|session| session.key() == &key)
        {
            return;
        }

        self.teardown_session().await;
        let session = SyncSession::start(SessionParams {
            key,
            chain: self.chain.clone(),
            service: self.service.clone(),
            config: self.config.clone(),
            telemetry: self.telemetry.clone(),
            shutdown_root: &self.shutdown_root,
            status_tx: self.status_tx.clone(),
        });
        self.session = Some(session);
    }

    /// Stops tracking and resets the view to its defaults. Idempotent.
    pub async fn clear_account(&mut self) {
        self.teardown_session().await;
        self.status_tx.send_replace(StatusView::default());
    }

    /// Explicit metadata re-trigger: cancels any fetch still in flight and
    /// starts a new one for the current key. No-op when no account is
    /// tracked.
    pub fn refresh_metadata(&self) {
        if let Some(session) = &self.session {
            session.refresh_metadata();
        }
    }

    /// Tears down the active session. Idempotent and safe to call multiple
    /// times.
    pub async fn shutdown(&mut self) {
        self.teardown_session().await;
    }

    /// Replaces the root shutdown token used to derive per-session
    /// cancellation tokens. Must only be called while no session is active.
    pub fn replace_shutdown_root(&mut self, shutdown: CancellationToken) {
        debug_assert!(
            self.session.is_none(),
            "shutdown token should not change while a session is active"
        );
        self.shutdown_root = shutdown;
    }

    async fn teardown_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.teardown().await;
        }
    }
}
