use serde::{Deserialize, Serialize};

use crate::error::CustodyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Proposed,
    Confirming,
    Executed,
    Cancelled,
    Failed,
}

impl ProposalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Executed | Self::Cancelled | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalAction {
    Confirm,
    /// A signer withdrew its own approval; the proposal stays open.
    Revoke,
    Execute,
    Cancel,
    /// The proposal executed on chain but the inner call failed.
    Revert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ProposalStatus,
    pub to: ProposalStatus,
    pub reason: &'static str,
}

pub fn proposal_transition(
    status: ProposalStatus,
    action: ProposalAction,
) -> Result<(ProposalStatus, StateTransition), CustodyError> {
    use ProposalAction as A;
    use ProposalStatus as S;

    let (next, reason) = match (status, action) {
        (S::Proposed | S::Confirming, A::Confirm) => (S::Confirming, "approval recorded"),
        (S::Proposed | S::Confirming, A::Revoke) => (status, "approval revoked"),
        (S::Proposed | S::Confirming, A::Execute) => (S::Executed, "threshold met and executed"),
        (S::Proposed | S::Confirming, A::Cancel) => (S::Cancelled, "cancelled by proposer"),
        (S::Proposed | S::Confirming, A::Revert) => (S::Failed, "inner call failed"),
        _ => {
            return Err(CustodyError::IllegalTransition(format!(
                "illegal proposal transition: {status:?} -> {action:?}"
            )))
        }
    };

    Ok((
        next,
        StateTransition {
            from: status,
            to: next,
            reason,
        },
    ))
}
