pub mod presentation;
pub mod rpc;
pub mod runtime;
pub mod service;
pub mod sync;

pub use presentation::{format_balance, format_balance_with_symbol, format_ratio};
pub use rpc::client::{AsyncChainClient, ChainRpcError, CodeReader};
pub use rpc::metrics::RpcMetricsSnapshot;
pub use rpc::options::RpcClientOptions;
pub use rpc::probe::probe_deployment;
pub use runtime::config::{SyncConfig, SyncConfigBuilder, SyncConfigParams};
pub use runtime::runner::Runner;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use service::client::{MetadataServiceClient, MetadataSource, ServiceError};
pub use service::types::AccountMetadata;
pub use sync::deployment::DeploymentState;
pub use sync::key::AccountKey;
pub use sync::merge::{merge_status, StatusView};
pub use sync::metadata::MetadataSnapshot;
pub use sync::synchronizer::AccountSynchronizer;
