//! Wire types exchanged with the account metadata service.

use serde::{Deserialize, Serialize};

/// Off-chain account metadata: the multi-party authorization policy.
///
/// Replaced wholesale on every successful fetch; never partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMetadata {
    pub owners: Vec<String>,
    pub threshold: u32,
}
