//! Chain RPC plumbing: the JSON-RPC client, retry policy, request metrics,
//! and the deployment probe built on top of them.

pub mod client;
pub mod metrics;
pub mod options;
pub mod probe;

pub use client::{AsyncChainClient, ChainRpcError, CodeReader};
pub use metrics::RpcMetricsSnapshot;
pub use options::RpcClientOptions;
pub use probe::probe_deployment;
