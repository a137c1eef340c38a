//! Pure combination of the two source states into the derived view model.

use crate::service::types::AccountMetadata;
use crate::sync::deployment::DeploymentState;

pub const DEFAULT_OWNER_COUNT: usize = 1;
pub const DEFAULT_THRESHOLD: u32 = 1;

/// Derived presentation state. Recomputed on every input change, never
/// stored durably.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView {
    pub owner_count: usize,
    pub threshold: u32,
    pub is_deployed: bool,
    pub is_loading: bool,
}

impl Default for StatusView {
    fn default() -> Self {
        Self {
            owner_count: DEFAULT_OWNER_COUNT,
            threshold: DEFAULT_THRESHOLD,
            is_deployed: false,
            is_loading: true,
        }
    }
}

/// Merges deployment state and metadata into one [`StatusView`].
///
/// Pure and deterministic: no I/O, no side effects. Owner count and
/// threshold fall back to 1 until metadata arrives; a zero from the service
/// falls back the same way, since neither value is meaningful below 1.
pub fn merge_status(
    deployment: DeploymentState,
    metadata: Option<&AccountMetadata>,
    fetch_in_flight: bool,
) -> StatusView {
    StatusView {
        owner_count: metadata
            .map(|m| m.owners.len())
            .filter(|count| *count > 0)
            .unwrap_or(DEFAULT_OWNER_COUNT),
        threshold: metadata
            .map(|m| m.threshold)
            .filter(|threshold| *threshold > 0)
            .unwrap_or(DEFAULT_THRESHOLD),
        is_deployed: deployment.is_deployed,
        is_loading: deployment.is_resolving || fetch_in_flight,
    }
}
