//! Synchronization core: session lifecycle, deployment polling, metadata
//! fetching, and the pure status merge.

pub mod deployment;
pub mod key;
pub mod merge;
pub mod metadata;
pub(crate) mod session;
pub mod synchronizer;

pub use deployment::DeploymentState;
pub use key::AccountKey;
pub use merge::{merge_status, StatusView};
pub use metadata::MetadataSnapshot;
pub use synchronizer::AccountSynchronizer;
