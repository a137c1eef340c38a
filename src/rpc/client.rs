//! Chain RPC client for reading contract code from EVM nodes over JSON-RPC.
//! Houses the `AsyncChainClient`, error types, and the `CodeReader` trait
//! consumed by the deployment poller.

use crate::rpc::metrics::{RpcMetrics, RpcMetricsSnapshot};
use crate::rpc::options::RpcClientOptions;
use crate::runtime::config::SyncConfig;
use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use jsonrpsee::core::client::{ClientT, Error as JsonRpcError};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::{sleep, timeout, Instant};

#[derive(Debug)]
pub enum ChainRpcError {
    Timeout { method: &'static str },
}

impl std::fmt::Display for ChainRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainRpcError::Timeout { method } => write!(f, "rpc method {method} timed out"),
        }
    }
}

impl std::error::Error for ChainRpcError {}

/// Read-only view of the chain used by the deployment probe. The concrete
/// client talks JSON-RPC; tests substitute scripted implementations.
pub trait CodeReader: Send + Sync {
    /// Returns the hex-encoded code stored at `address`, `"0x"` when none.
    fn get_code<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<String>>;
}

#[derive(Debug, Clone)]
pub struct AsyncChainClient {
    rpc_url: Arc<String>,
    client: HttpClient,
    options: RpcClientOptions,
    metrics: Arc<RpcMetrics>,
}

impl CodeReader for AsyncChainClient {
    fn get_code<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.get_code(address))
    }
}

impl AsyncChainClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_options(url, RpcClientOptions::default())
    }

    pub fn with_options(url: impl Into<String>, options: RpcClientOptions) -> Result<Self> {
        options.validate()?;

        let rpc_url = url.into();
        let client = HttpClientBuilder::default()
            .request_timeout(options.request_timeout)
            .build(&rpc_url)
            .map_err(|err| anyhow!("failed to build chain RPC client: {err}"))?;

        Ok(Self {
            rpc_url: Arc::new(rpc_url),
            client,
            options,
            metrics: Arc::new(RpcMetrics::default()),
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        config.validate()?;
        let options = RpcClientOptions {
            request_timeout: config.request_timeout(),
            ..RpcClientOptions::default()
        };
        Self::with_options(config.rpc_url().to_owned(), options)
    }

    pub fn endpoint(&self) -> &str {
        &self.rpc_url
    }

    pub fn metrics(&self) -> RpcMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Fetches the code stored at `address` at the latest block.
    ///
    /// Returns the node's hex string verbatim; callers decide what counts as
    /// "deployed". Transient failures are retried up to the configured
    /// attempt limit before the error is surfaced.
    pub async fn get_code(&self, address: &str) -> Result<String> {
        const METHOD: &str = "eth_getCode";

        self.retry_with_metrics(METHOD, || async {
            timeout(
                self.options.request_timeout,
                self.client
                    .request::<String, _>(METHOD, rpc_params![address, "latest"]),
            )
            .await
            .map_err(|_| anyhow::Error::from(ChainRpcError::Timeout { method: METHOD }))?
            .map_err(|err| map_rpc_error(METHOD, err))
        })
        .await
    }

    /// Shared retry/backoff loop that wraps RPC operations with metrics,
    /// exponential backoff, and consistent logging.
    async fn retry_with_metrics<T, F, Fut>(
        &self,
        method: &'static str,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let start = Instant::now();

            match operation().await {
                Ok(value) => {
                    self.metrics.record_success(start.elapsed());
                    return Ok(value);
                }
                Err(err) => {
                    let elapsed = start.elapsed();
                    let timed_out = matches!(
                        err.downcast_ref::<ChainRpcError>(),
                        Some(ChainRpcError::Timeout { .. })
                    );
                    if timed_out {
                        self.metrics.record_timeout(elapsed);
                    } else {
                        self.metrics.record_failure(elapsed);
                    }

                    if attempt >= self.options.max_attempts {
                        tracing::debug!(method, attempt, error = %err, "rpc attempts exhausted");
                        return Err(err);
                    }

                    let backoff = self.backoff_delay(attempt);
                    tracing::debug!(
                        method,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying rpc call"
                    );
                    sleep(backoff).await;
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        if attempt <= 1 {
            return self.options.initial_backoff;
        }

        let exponent = attempt.saturating_sub(1) as u32;
        let multiplier = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        let mut delay = self.options.initial_backoff.saturating_mul(multiplier);

        if delay > self.options.max_backoff {
            delay = self.options.max_backoff;
        }

        delay
    }
}

fn map_rpc_error(label: &'static str, err: JsonRpcError) -> anyhow::Error {
    anyhow!("rpc {label} call failed: {err}")
}
