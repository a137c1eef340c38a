//! Cancellable, single-flight metadata fetching with stale-response
//! suppression.

use crate::runtime::telemetry::Telemetry;
use crate::service::client::{MetadataSource, ServiceError};
use crate::service::types::AccountMetadata;
use crate::sync::key::AccountKey;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Latest fetch state for the session key. `metadata` stays `None` until the
/// first successful fetch; failures keep the previous value.
#[derive(Debug, Clone, Default)]
pub struct MetadataSnapshot {
    pub metadata: Option<AccountMetadata>,
    pub in_flight: bool,
}

struct InflightFetch {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Issues at most one outstanding metadata request per session. Triggering
/// again signals the prior request's token before the replacement starts; a
/// generation counter keeps any late result of a superseded request from
/// ever reaching the snapshot channel.
pub(crate) struct MetadataFetcher<M> {
    service: Arc<M>,
    key: AccountKey,
    run_token: CancellationToken,
    telemetry: Arc<Telemetry>,
    generation: Arc<AtomicU64>,
    snapshot_tx: watch::Sender<MetadataSnapshot>,
    inflight: Mutex<Option<InflightFetch>>,
}

impl<M> MetadataFetcher<M>
where
    M: MetadataSource + 'static,
{
    pub(crate) fn new(
        service: Arc<M>,
        key: AccountKey,
        run_token: CancellationToken,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(MetadataSnapshot::default());
        Self {
            service,
            key,
            run_token,
            telemetry,
            generation: Arc::new(AtomicU64::new(0)),
            snapshot_tx,
            inflight: Mutex::new(None),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<MetadataSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Starts a fetch for the session key, cancelling any fetch still in
    /// flight. The superseded task exits on its own; the generation check
    /// keeps its result out of the snapshot.
    pub(crate) fn trigger(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut slot = self.inflight.lock().expect("inflight slot poisoned");
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
        }

        let cancel = self.run_token.child_token();
        self.snapshot_tx
            .send_modify(|snapshot| snapshot.in_flight = true);

        let handle = tokio::spawn(run_fetch(FetchContext {
            service: self.service.clone(),
            key: self.key.clone(),
            cancel: cancel.clone(),
            run_token: self.run_token.clone(),
            telemetry: self.telemetry.clone(),
            generation,
            latest_generation: self.generation.clone(),
            snapshot_tx: self.snapshot_tx.clone(),
        }));

        *slot = Some(InflightFetch { cancel, handle });
    }

    /// Cancels and joins the latest fetch task. After this returns no
    /// snapshot update can occur.
    pub(crate) async fn shutdown(&self) {
        let inflight = self.inflight.lock().expect("inflight slot poisoned").take();
        if let Some(inflight) = inflight {
            inflight.cancel.cancel();
            if let Err(err) = inflight.handle.await {
                tracing::warn!(error = %err, "metadata fetch task panicked");
            }
        }
    }
}

struct FetchContext<M> {
    service: Arc<M>,
    key: AccountKey,
    cancel: CancellationToken,
    run_token: CancellationToken,
    telemetry: Arc<Telemetry>,
    generation: u64,
    latest_generation: Arc<AtomicU64>,
    snapshot_tx: watch::Sender<MetadataSnapshot>,
}

async fn run_fetch<M>(ctx: FetchContext<M>)
where
    M: MetadataSource,
{
    // The source may honour the token itself; the outer race guarantees
    // cancellation even when it does not.
    let result = tokio::select! {
        _ = ctx.cancel.cancelled() => Err(ServiceError::Cancelled),
        result = ctx.service.fetch_account(&ctx.key, ctx.cancel.clone()) => result,
    };

    // The staleness check runs inside the sender's critical section so a
    // concurrent trigger() can never interleave between check and publish.
    let applied = ctx.snapshot_tx.send_if_modified(|snapshot| {
        let superseded = ctx.generation != ctx.latest_generation.load(Ordering::SeqCst);
        if superseded || ctx.run_token.is_cancelled() {
            return false;
        }

        match &result {
            Ok(metadata) => {
                snapshot.metadata = Some(metadata.clone());
                snapshot.in_flight = false;
            }
            // Failures keep the previous value; only the flag clears.
            Err(_) => snapshot.in_flight = false,
        }
        true
    });

    if !applied {
        if result.is_ok() {
            ctx.telemetry.record_stale_response();
        }
        tracing::debug!(key = %ctx.key, "discarding stale metadata response");
        return;
    }

    match result {
        Ok(_) => ctx.telemetry.record_metadata_fetch(),
        Err(ServiceError::Cancelled) => {
            tracing::debug!(key = %ctx.key, "metadata fetch cancelled");
        }
        Err(err) => {
            ctx.telemetry.record_metadata_failure();
            tracing::warn!(
                key = %ctx.key,
                error = %err,
                "metadata fetch failed; keeping last known value"
            );
        }
    }
}
