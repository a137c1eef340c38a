//! HTTP client for the account metadata service. Requests are cancellable
//! through a `CancellationToken` so a superseded fetch can be abandoned
//! mid-flight.

use crate::runtime::config::SyncConfig;
use crate::service::types::AccountMetadata;
use crate::sync::key::AccountKey;
use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum ServiceError {
    Cancelled,
    Timeout,
    Status { code: u16 },
    Transport { message: String },
    Decode { message: String },
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Cancelled => write!(f, "metadata request cancelled"),
            ServiceError::Timeout => write!(f, "metadata request timed out"),
            ServiceError::Status { code } => {
                write!(f, "metadata service returned HTTP status {code}")
            }
            ServiceError::Transport { message } => {
                write!(f, "metadata request transport error: {message}")
            }
            ServiceError::Decode { message } => {
                write!(f, "metadata response could not be decoded: {message}")
            }
        }
    }
}

impl std::error::Error for ServiceError {}

impl ServiceError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout
        } else {
            ServiceError::Transport {
                message: err.to_string(),
            }
        }
    }
}

/// Source of off-chain account metadata. The concrete client speaks HTTP;
/// tests substitute scripted implementations.
pub trait MetadataSource: Send + Sync {
    /// Fetches metadata for `key`. The token cancels the request mid-flight;
    /// a cancelled fetch resolves to [`ServiceError::Cancelled`].
    fn fetch_account<'a>(
        &'a self,
        key: &'a AccountKey,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<AccountMetadata, ServiceError>>;
}

#[derive(Debug, Clone)]
pub struct MetadataServiceClient {
    base_url: Arc<String>,
    http: reqwest::Client,
}

impl MetadataSource for MetadataServiceClient {
    fn fetch_account<'a>(
        &'a self,
        key: &'a AccountKey,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<AccountMetadata, ServiceError>> {
        Box::pin(self.get_account_metadata(key, cancel))
    }
}

impl MetadataServiceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    pub fn with_timeout(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_owned();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            bail!("service_url must start with http:// or https://");
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build metadata HTTP client")?;

        Ok(Self {
            base_url: Arc::new(base_url),
            http,
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        config.validate()?;
        Self::with_timeout(config.service_url().to_owned(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn account_url(&self, key: &AccountKey) -> String {
        format!(
            "{}/v1/chains/{}/accounts/{}",
            self.base_url, key.chain_id, key.address
        )
    }

    /// Fetches the account's metadata, racing the request against `cancel`.
    ///
    /// Dropping the request future tears the connection down, so a cancelled
    /// call does not linger on the socket.
    pub async fn get_account_metadata(
        &self,
        key: &AccountKey,
        cancel: CancellationToken,
    ) -> Result<AccountMetadata, ServiceError> {
        let url = self.account_url(key);

        let request = async {
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(ServiceError::from_transport)?;

            let status = response.status();
            if !status.is_success() {
                return Err(ServiceError::Status {
                    code: status.as_u16(),
                });
            }

            response
                .json::<AccountMetadata>()
                .await
                .map_err(|err| ServiceError::Decode {
                    message: err.to_string(),
                })
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(url = %url, "metadata request cancelled");
                Err(ServiceError::Cancelled)
            }
            result = request => result,
        }
    }
}
