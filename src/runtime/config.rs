use crate::runtime::telemetry;
use anyhow::{bail, Context, Result};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 4_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration for the account status synchronizer.
///
/// All instances must be constructed via [`SyncConfig::builder`] or
/// [`SyncConfig::new`] so invariants are validated before any consumer
/// observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    rpc_url: String,
    service_url: String,
    poll_interval: Duration,
    request_timeout: Duration,
    metrics_interval: Duration,
}

pub struct SyncConfigParams {
    pub rpc_url: String,
    pub service_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub metrics_interval: Duration,
}

impl SyncConfig {
    /// Returns a builder to incrementally construct and validate a
    /// configuration.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    ///
    /// Prefer [`SyncConfig::builder`] for ergonomics when many values use
    /// defaults.
    pub fn new(params: SyncConfigParams) -> Result<Self> {
        let SyncConfigParams {
            rpc_url,
            service_url,
            poll_interval,
            request_timeout,
            metrics_interval,
        } = params;

        let config = Self {
            rpc_url: trimmed_string(rpc_url),
            service_url: trimmed_string(service_url),
            poll_interval,
            request_timeout,
            metrics_interval,
        };

        config.validate()?;
        Ok(config)
    }

    /// Full chain RPC URL (including scheme).
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Base URL of the account metadata service.
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// Interval between deployment probes.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Per-request timeout applied to both external clients.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.rpc_url, "rpc_url")?;
        validate_url(&self.service_url, "service_url")?;

        if self.poll_interval.is_zero() {
            bail!("poll_interval must be greater than 0");
        }

        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct SyncConfigBuilder {
    rpc_url: Option<String>,
    service_url: Option<String>,
    poll_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    metrics_interval: Option<Duration>,
}

impl SyncConfigBuilder {
    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = Some(url.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<SyncConfig> {
        let params = SyncConfigParams {
            rpc_url: self.rpc_url.context("rpc_url is required")?,
            service_url: self.service_url.context("service_url is required")?,
            poll_interval: self
                .poll_interval
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)),
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
        };

        SyncConfig::new(params)
    }
}

fn trimmed_string(value: String) -> String {
    value.trim().to_owned()
}

fn validate_url(url: &str, field: &str) -> Result<()> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("{field} must start with http:// or https://");
    }
    Ok(())
}
