//! Account metadata service integration: wire types and the cancellable HTTP
//! client.

pub mod client;
pub mod types;

pub use client::{MetadataServiceClient, MetadataSource, ServiceError};
pub use types::AccountMetadata;
