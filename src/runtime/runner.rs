use crate::rpc::client::CodeReader;
use crate::runtime::config::SyncConfig;
use crate::service::client::MetadataSource;
use crate::sync::key::AccountKey;
use crate::sync::synchronizer::AccountSynchronizer;
use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Coordinates the synchronizer lifecycle and handles OS signals for
/// graceful shutdowns.
pub struct Runner<C, M> {
    synchronizer: AccountSynchronizer<C, M>,
    shutdown: CancellationToken,
}

impl<C, M> Runner<C, M>
where
    C: CodeReader + 'static,
    M: MetadataSource + 'static,
{
    /// Creates a new runner and wires a root [`CancellationToken`] that
    /// propagates through every session the synchronizer starts.
    pub fn new(config: SyncConfig, chain: Arc<C>, service: Arc<M>) -> Self {
        let shutdown = CancellationToken::new();
        let synchronizer =
            AccountSynchronizer::with_cancellation_token(config, chain, service, shutdown.clone());
        Self {
            synchronizer,
            shutdown,
        }
    }

    /// Returns a clone of the root shutdown token so external callers can
    /// integrate with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn synchronizer(&mut self) -> &mut AccountSynchronizer<C, M> {
        &mut self.synchronizer
    }

    /// Starts tracking the given account.
    pub async fn track(&mut self, key: AccountKey) {
        self.synchronizer.set_account(key).await;
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the shutdown token is
    /// cancelled elsewhere.
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        tracing::info!("runner started; waiting for Ctrl-C (SIGINT) to initiate shutdown");

        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; shutting down runner");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("runner shutdown token cancelled");
            }
        }

        self.stop().await
    }

    /// Stops the active session gracefully by cancelling the root token and
    /// delegating to the synchronizer.
    pub async fn stop(&mut self) -> Result<()> {
        self.shutdown.cancel();
        self.synchronizer.shutdown().await;
        self.reinitialize_shutdown_token();
        Ok(())
    }

    fn reinitialize_shutdown_token(&mut self) {
        self.shutdown = CancellationToken::new();
        self.synchronizer
            .replace_shutdown_root(self.shutdown.clone());
    }
}
