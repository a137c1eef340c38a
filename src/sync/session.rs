//! One synchronization session per account key: wires the deployment
//! poller, metadata fetcher, merge loop, and metrics reporter under a single
//! child cancellation token.

use crate::rpc::client::CodeReader;
use crate::runtime::config::SyncConfig;
use crate::runtime::telemetry::{self, Telemetry};
use crate::service::client::MetadataSource;
use crate::sync::deployment::{spawn_deployment_poller, DeploymentPollerParams, DeploymentState};
use crate::sync::key::AccountKey;
use crate::sync::merge::{merge_status, StatusView};
use crate::sync::metadata::{MetadataFetcher, MetadataSnapshot};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) struct SessionParams<'a, C, M> {
    pub key: AccountKey,
    pub chain: Arc<C>,
    pub service: Arc<M>,
    pub config: SyncConfig,
    pub telemetry: Arc<Telemetry>,
    pub shutdown_root: &'a CancellationToken,
    pub status_tx: watch::Sender<StatusView>,
}

pub(crate) struct SyncSession<M> {
    key: AccountKey,
    run_token: CancellationToken,
    fetcher: Arc<MetadataFetcher<M>>,
    poller_handle: JoinHandle<()>,
    merge_handle: JoinHandle<()>,
    metrics_handle: JoinHandle<()>,
}

impl<M> SyncSession<M>
where
    M: MetadataSource + 'static,
{
    /// Starts polling and fetching for the given key. The published view is
    /// reset to its defaults so stale data from a previous key can never
    /// leak into the new session.
    pub(crate) fn start<C>(params: SessionParams<'_, C, M>) -> Self
    where
        C: CodeReader + 'static,
    {
        let SessionParams {
            key,
            chain,
            service,
            config,
            telemetry,
            shutdown_root,
            status_tx,
        } = params;

        let run_token = shutdown_root.child_token();
        telemetry.record_session_started();
        tracing::info!(key = %key, "starting account session");

        status_tx.send_replace(StatusView::default());

        let (deployment_rx, poller_handle) = spawn_deployment_poller(DeploymentPollerParams {
            chain,
            address: key.address.clone(),
            poll_interval: config.poll_interval(),
            shutdown: run_token.clone(),
            telemetry: telemetry.clone(),
        });

        let fetcher = Arc::new(MetadataFetcher::new(
            service,
            key.clone(),
            run_token.clone(),
            telemetry.clone(),
        ));
        let metadata_rx = fetcher.subscribe();
        fetcher.trigger();

        let merge_handle = spawn_merge_loop(
            deployment_rx,
            metadata_rx,
            status_tx.clone(),
            run_token.clone(),
        );

        let metrics_handle = telemetry::spawn_metrics_reporter(
            telemetry,
            status_tx.subscribe(),
            run_token.clone(),
            config.metrics_interval(),
        );

        Self {
            key,
            run_token,
            fetcher,
            poller_handle,
            merge_handle,
            metrics_handle,
        }
    }

    pub(crate) fn key(&self) -> &AccountKey {
        &self.key
    }

    /// Re-triggers the metadata fetch for the session key, superseding any
    /// fetch still in flight.
    pub(crate) fn refresh_metadata(&self) {
        self.fetcher.trigger();
    }

    /// Cancels the session and joins every task it spawned. After this
    /// returns, no further view update can occur, even if an in-flight probe
    /// or fetch later resolves.
    pub(crate) async fn teardown(self) {
        tracing::info!(key = %self.key, "tearing down account session");
        self.run_token.cancel();
        self.fetcher.shutdown().await;

        let tasks = [
            ("deployment poller", self.poller_handle),
            ("status merge loop", self.merge_handle),
            ("metrics reporter", self.metrics_handle),
        ];
        for (name, handle) in tasks {
            if let Err(err) = handle.await {
                tracing::warn!(task = name, error = %err, "session task panicked during teardown");
            }
        }
    }
}

/// Recomputes the merged view whenever either source changes. The merge
/// itself is pure; this loop only moves data between channels.
fn spawn_merge_loop(
    mut deployment_rx: watch::Receiver<DeploymentState>,
    mut metadata_rx: watch::Receiver<MetadataSnapshot>,
    status_tx: watch::Sender<StatusView>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let view = {
                let deployment = *deployment_rx.borrow_and_update();
                let snapshot = metadata_rx.borrow_and_update().clone();
                merge_status(deployment, snapshot.metadata.as_ref(), snapshot.in_flight)
            };
            if shutdown.is_cancelled() {
                break;
            }
            status_tx.send_replace(view);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = deployment_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = metadata_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("status merge loop stopped");
    })
}
