use crate::sync::merge::StatusView;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls
/// back to `info`. Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Lightweight rolling counters used to derive runtime metrics.
#[derive(Default, Debug)]
pub struct Telemetry {
    probes_completed: AtomicU64,
    probe_failures: AtomicU64,
    metadata_fetches: AtomicU64,
    metadata_failures: AtomicU64,
    stale_responses: AtomicU64,
    sessions_started: AtomicU64,
}

impl Telemetry {
    pub fn record_probe(&self) {
        self.probes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_probe_failure(&self) {
        self.probes_completed.fetch_add(1, Ordering::Relaxed);
        self.probe_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_metadata_fetch(&self) {
        self.metadata_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_metadata_failure(&self) {
        self.metadata_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_response(&self) {
        self.stale_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn probes_completed(&self) -> u64 {
        self.probes_completed.load(Ordering::Relaxed)
    }

    pub fn probe_failures(&self) -> u64 {
        self.probe_failures.load(Ordering::Relaxed)
    }

    pub fn metadata_fetches(&self) -> u64 {
        self.metadata_fetches.load(Ordering::Relaxed)
    }

    pub fn metadata_failures(&self) -> u64 {
        self.metadata_failures.load(Ordering::Relaxed)
    }

    pub fn stale_responses(&self) -> u64 {
        self.stale_responses.load(Ordering::Relaxed)
    }

    pub fn sessions_started(&self) -> u64 {
        self.sessions_started.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            probes_completed: self.probes_completed(),
            probe_failures: self.probe_failures(),
            metadata_fetches: self.metadata_fetches(),
            metadata_failures: self.metadata_failures(),
            stale_responses: self.stale_responses(),
            sessions_started: self.sessions_started(),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TelemetrySnapshot {
    pub probes_completed: u64,
    pub probe_failures: u64,
    pub metadata_fetches: u64,
    pub metadata_failures: u64,
    pub stale_responses: u64,
    pub sessions_started: u64,
}

/// Spawns a background task that periodically logs probe/fetch counters and
/// the current merged view.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    status_rx: watch::Receiver<StatusView>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(target: "accountsync::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let snapshot = telemetry.snapshot();
                    let view = *status_rx.borrow();

                    tracing::info!(
                        target: "accountsync::metrics",
                        probes = snapshot.probes_completed,
                        probe_failures = snapshot.probe_failures,
                        fetches = snapshot.metadata_fetches,
                        fetch_failures = snapshot.metadata_failures,
                        stale_responses = snapshot.stale_responses,
                        deployed = view.is_deployed,
                        loading = view.is_loading,
                        owners = view.owner_count,
                        threshold = view.threshold,
                        "synchronizer metrics snapshot"
                    );
                }
            }
        }
    })
}
