//! Account identity tracked by a synchronization session.

use anyhow::{anyhow, bail, Result};

/// Identifies which account the synchronizer tracks. Immutable per session;
/// a change to either field starts a new session and invalidates all
/// in-flight work tied to the old key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountKey {
    pub address: String,
    pub chain_id: String,
}

impl AccountKey {
    pub fn new(address: impl Into<String>, chain_id: impl Into<String>) -> Result<Self> {
        let address = address.into().trim().to_owned();
        let chain_id = chain_id.into().trim().to_owned();

        validate_address(&address)?;
        if chain_id.is_empty() {
            bail!("chain_id cannot be empty");
        }

        Ok(Self { address, chain_id })
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.address, self.chain_id)
    }
}

fn validate_address(address: &str) -> Result<()> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| anyhow!("address must start with 0x"))?;

    if hex_part.len() != 40 {
        bail!(
            "address must contain 40 hex characters, got {}",
            hex_part.len()
        );
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("address contains non-hex characters");
    }

    Ok(())
}
