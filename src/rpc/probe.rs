//! Deployment probe: decides whether an address currently holds contract
//! code.

use crate::rpc::client::CodeReader;

/// Outcome of a single probe, kept separate from the boolean contract so the
/// poller can count transport failures without surfacing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeOutcome {
    Deployed,
    NotDeployed,
    Failed,
}

/// Checks whether a contract currently exists at `address`.
///
/// Never fails: any transport or client error is reported as "not deployed",
/// since the caller cannot distinguish a missing contract from a failed read
/// through this API. The next poll tick retries naturally.
pub async fn probe_deployment<C>(client: &C, address: &str) -> bool
where
    C: CodeReader + ?Sized,
{
    matches!(classify_probe(client, address).await, ProbeOutcome::Deployed)
}

pub(crate) async fn classify_probe<C>(client: &C, address: &str) -> ProbeOutcome
where
    C: CodeReader + ?Sized,
{
    match client.get_code(address).await {
        Ok(code) if has_contract_code(&code) => ProbeOutcome::Deployed,
        Ok(_) => ProbeOutcome::NotDeployed,
        Err(err) => {
            tracing::debug!(
                address,
                error = %err,
                "code probe failed; reporting address as undeployed"
            );
            ProbeOutcome::Failed
        }
    }
}

/// Non-empty code means a contract is installed. Nodes report the empty
/// account as `"0x"`.
fn has_contract_code(code: &str) -> bool {
    let code = code.trim();
    !code.is_empty() && code != "0x" && code != "0X"
}
