use std::time::Duration;

use accountsync::{AccountKey, AccountMetadata, StatusView, SyncConfig};
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

pub fn account_key(suffix: &str, chain_id: &str) -> AccountKey {
    let address = format!("0x{:0>40}", suffix);
    AccountKey::new(address, chain_id).expect("test key must be valid")
}

pub fn metadata(owners: &[&str], threshold: u32) -> AccountMetadata {
    AccountMetadata {
        owners: owners.iter().map(|owner| owner.to_string()).collect(),
        threshold,
    }
}

pub fn fast_config(rpc_url: &str, service_url: &str) -> SyncConfig {
    SyncConfig::builder()
        .rpc_url(rpc_url)
        .service_url(service_url)
        .poll_interval(Duration::from_millis(25))
        .request_timeout(Duration::from_secs(5))
        .build()
        .expect("test config must build")
}

/// Polls the view channel until the predicate holds or the timeout expires.
pub async fn wait_for_view(
    status_rx: &mut watch::Receiver<StatusView>,
    wait: Duration,
    predicate: impl Fn(StatusView) -> bool,
) -> Result<StatusView> {
    let outcome = timeout(wait, async {
        loop {
            let view = *status_rx.borrow_and_update();
            if predicate(view) {
                return view;
            }
            if status_rx.changed().await.is_err() {
                return *status_rx.borrow();
            }
        }
    })
    .await;

    match outcome {
        Ok(view) => Ok(view),
        Err(_) => bail!(
            "view did not satisfy predicate within {:?}; last value {:?}",
            wait,
            *status_rx.borrow()
        ),
    }
}
