//! Deployment polling for the tracked account address.

use crate::rpc::client::CodeReader;
use crate::rpc::probe::{classify_probe, ProbeOutcome};
use crate::runtime::telemetry::Telemetry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// On-chain deployment status as last observed by the poller.
///
/// `is_resolving` holds until the first probe completes, then stays false for
/// the rest of the session; later probes only update `is_deployed` in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentState {
    pub is_deployed: bool,
    pub is_resolving: bool,
}

impl DeploymentState {
    pub(crate) fn resolving() -> Self {
        Self {
            is_deployed: false,
            is_resolving: true,
        }
    }

    pub(crate) fn settled(is_deployed: bool) -> Self {
        Self {
            is_deployed,
            is_resolving: false,
        }
    }
}

pub(crate) struct DeploymentPollerParams<C> {
    pub chain: Arc<C>,
    pub address: String,
    pub poll_interval: Duration,
    pub shutdown: CancellationToken,
    pub telemetry: Arc<Telemetry>,
}

/// Spawns the polling task: one probe immediately, then one per interval
/// tick until the token is cancelled.
///
/// The probe is awaited inline and missed ticks are skipped, so a probe that
/// outlasts the interval never stacks a concurrent request behind itself.
/// Probe failures count as "not deployed" and never stop the schedule.
pub(crate) fn spawn_deployment_poller<C>(
    params: DeploymentPollerParams<C>,
) -> (watch::Receiver<DeploymentState>, JoinHandle<()>)
where
    C: CodeReader + 'static,
{
    let DeploymentPollerParams {
        chain,
        address,
        poll_interval,
        shutdown,
        telemetry,
    } = params;

    let (state_tx, state_rx) = watch::channel(DeploymentState::resolving());

    let handle = tokio::spawn(async move {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    // The probe races the shutdown token so teardown never
                    // waits out a slow request and never observes a state
                    // update issued after cancellation.
                    let outcome = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        outcome = classify_probe(chain.as_ref(), &address) => outcome,
                    };

                    match outcome {
                        ProbeOutcome::Failed => telemetry.record_probe_failure(),
                        _ => telemetry.record_probe(),
                    }

                    let is_deployed = matches!(outcome, ProbeOutcome::Deployed);
                    state_tx.send_replace(DeploymentState::settled(is_deployed));
                }
            }
        }

        tracing::debug!(address = %address, "deployment poller stopped");
    });

    (state_rx, handle)
}
