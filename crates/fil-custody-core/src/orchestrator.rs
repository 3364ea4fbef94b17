use std::collections::BTreeSet;

use alloy::primitives::{Address as EthAddress, Bytes, U256};
use num_bigint::BigUint;
use tracing::{info, warn};

use crate::address::Address;
use crate::config::PipelineConfig;
use crate::domain::{ChainReceipt, KeyId, ProposalState, ProposedCall, TxIndex, SEND_METHOD};
use crate::error::{CustodyError, DecodingError};
use crate::evm::{EvmPipeline, EvmSubmission};
use crate::native::{MessageDraft, NativePipeline, NativeSubmission};
use crate::ports::{CustodyPort, EvmRpcPort, NativeRpcPort};
use crate::signer::CustodySigner;
use crate::state_machine::{proposal_transition, ProposalAction, ProposalStatus, StateTransition};
use crate::target::{
    to_u256, ActorCall, ApproveReturn, EvmMultisig, MultisigEncoding, NativeMultisig,
    ProposeReturn, Target,
};

#[derive(Debug, Clone)]
pub enum TxCommand {
    Transfer {
        key_id: KeyId,
        to: Address,
        value: BigUint,
    },
    /// Direct contract call from the key's own EVM account, outside any multisig.
    Invoke {
        key_id: KeyId,
        contract: EthAddress,
        value: BigUint,
        calldata: Bytes,
    },
    Propose {
        key_id: KeyId,
        target: Target,
        call: ProposedCall,
    },
    Confirm {
        key_id: KeyId,
        proposal: ProposalState,
    },
    Execute {
        key_id: KeyId,
        proposal: ProposalState,
    },
    Cancel {
        key_id: KeyId,
        proposal: ProposalState,
    },
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub receipt: ChainReceipt,
    pub proposal: Option<ProposalState>,
    pub transition: Option<StateTransition>,
}

/// Result of one multisig phase.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub proposal: ProposalState,
    pub receipt: ChainReceipt,
    pub transition: Option<StateTransition>,
}

impl From<PhaseOutcome> for CommandResult {
    fn from(outcome: PhaseOutcome) -> Self {
        Self {
            receipt: outcome.receipt,
            proposal: Some(outcome.proposal),
            transition: outcome.transition,
        }
    }
}

pub struct Orchestrator<C, N, E>
where
    C: CustodyPort,
    N: NativeRpcPort,
    E: EvmRpcPort,
{
    pub signer: CustodySigner<C>,
    pub native: N,
    pub evm: E,
    pub config: PipelineConfig,
}

impl<C, N, E> Orchestrator<C, N, E>
where
    C: CustodyPort,
    N: NativeRpcPort,
    E: EvmRpcPort,
{
    pub fn new(custody: C, native: N, evm: E, config: PipelineConfig) -> Self {
        Self {
            signer: CustodySigner::new(custody),
            native,
            evm,
            config,
        }
    }

    pub async fn handle(&self, command: TxCommand) -> Result<CommandResult, CustodyError> {
        match command {
            TxCommand::Transfer { key_id, to, value } => {
                let submission = self.transfer(&key_id, to, value).await?;
                Ok(CommandResult {
                    receipt: ChainReceipt::Native(submission.receipt),
                    proposal: None,
                    transition: None,
                })
            }
            TxCommand::Invoke {
                key_id,
                contract,
                value,
                calldata,
            } => {
                let submission = self.invoke(&key_id, contract, value, calldata).await?;
                Ok(CommandResult {
                    receipt: ChainReceipt::Evm(submission.receipt),
                    proposal: None,
                    transition: None,
                })
            }
            TxCommand::Propose {
                key_id,
                target,
                call,
            } => Ok(self.propose(&key_id, target, call).await?.into()),
            TxCommand::Confirm { key_id, proposal } => {
                Ok(self.confirm(&key_id, &proposal).await?.into())
            }
            TxCommand::Execute { key_id, proposal } => {
                Ok(self.execute(&key_id, &proposal).await?.into())
            }
            TxCommand::Cancel { key_id, proposal } => {
                Ok(self.cancel(&key_id, &proposal).await?.into())
            }
        }
    }

    pub fn native_pipeline(&self) -> NativePipeline<'_, C, N> {
        NativePipeline::new(&self.signer, &self.native, &self.config)
    }

    pub fn evm_pipeline(&self) -> EvmPipeline<'_, C, E> {
        EvmPipeline::new(&self.signer, &self.evm, &self.config)
    }

    /// Plain value transfer on the native chain.
    pub async fn transfer(
        &self,
        key_id: &KeyId,
        to: Address,
        value: BigUint,
    ) -> Result<NativeSubmission, CustodyError> {
        self.native_pipeline()
            .submit(
                key_id,
                MessageDraft {
                    to,
                    value,
                    method: SEND_METHOD,
                    params: Vec::new(),
                },
            )
            .await
    }

    /// Payable contract call signed by the key itself, e.g. a pool `deposit()`.
    pub async fn invoke(
        &self,
        key_id: &KeyId,
        contract: EthAddress,
        value: BigUint,
        calldata: Bytes,
    ) -> Result<EvmSubmission, CustodyError> {
        let value = to_u256(&value)?;
        self.evm_pipeline()
            .submit(key_id, contract, value, calldata)
            .await
    }

    pub async fn propose(
        &self,
        key_id: &KeyId,
        target: Target,
        call: ProposedCall,
    ) -> Result<PhaseOutcome, CustodyError> {
        match target {
            Target::NativeActor(multisig) => self.propose_native(key_id, multisig, call).await,
            Target::EvmContract(multisig) => self.propose_evm(key_id, multisig, call).await,
        }
    }

    pub async fn confirm(
        &self,
        key_id: &KeyId,
        proposal: &ProposalState,
    ) -> Result<PhaseOutcome, CustodyError> {
        proposal_transition(proposal.status, ProposalAction::Confirm)?;
        let mut next = proposal.clone();

        match &proposal.target {
            Target::NativeActor(multisig) => {
                let submission = self
                    .submit_actor_call(key_id, multisig, multisig.confirm_call(proposal)?)
                    .await?;
                let ret = ApproveReturn::decode(&submission.receipt.return_data)?;
                next.approvals.insert(submission.from.to_string());
                // The actor executes on the approval that reaches its threshold.
                let action = match (ret.applied, ret.code) {
                    (false, _) => ProposalAction::Confirm,
                    (true, 0) => ProposalAction::Execute,
                    (true, _) => ProposalAction::Revert,
                };
                let transition = apply(&mut next, action)?;
                log_phase("confirm", &next);
                Ok(PhaseOutcome {
                    proposal: next,
                    receipt: ChainReceipt::Native(submission.receipt),
                    transition: Some(transition),
                })
            }
            Target::EvmContract(multisig) => {
                let submission = self
                    .submit_contract_call(key_id, multisig, multisig.confirm_call(proposal)?)
                    .await?;
                next.approvals.insert(submission.from.to_string());
                let transition = apply(&mut next, ProposalAction::Confirm)?;
                log_phase("confirm", &next);
                Ok(PhaseOutcome {
                    proposal: next,
                    receipt: ChainReceipt::Evm(submission.receipt),
                    transition: Some(transition),
                })
            }
        }
    }

    pub async fn execute(
        &self,
        key_id: &KeyId,
        proposal: &ProposalState,
    ) -> Result<PhaseOutcome, CustodyError> {
        proposal_transition(proposal.status, ProposalAction::Execute)?;
        let mut next = proposal.clone();

        let receipt = match &proposal.target {
            Target::NativeActor(multisig) => {
                let submission = self
                    .submit_actor_call(key_id, multisig, multisig.execute_call(proposal)?)
                    .await?;
                let ret = ApproveReturn::decode(&submission.receipt.return_data)?;
                let receipt = ChainReceipt::Native(submission.receipt);
                next.approvals.insert(submission.from.to_string());
                if !ret.applied {
                    // The approval is on chain even though nothing executed.
                    apply(&mut next, ProposalAction::Confirm)?;
                    warn!(index = %proposal.transaction_index, "approval recorded but threshold not met");
                    return Err(CustodyError::reverted_with_proposal(
                        "threshold not met",
                        receipt,
                        next,
                    ));
                }
                if ret.code != 0 {
                    apply(&mut next, ProposalAction::Revert)?;
                    warn!(index = %proposal.transaction_index, code = ret.code, "proposed call failed");
                    return Err(CustodyError::reverted_with_proposal(
                        format!("proposed call exit code {}", ret.code),
                        receipt,
                        next,
                    ));
                }
                receipt
            }
            Target::EvmContract(multisig) => {
                let submission = self
                    .submit_contract_call(key_id, multisig, multisig.execute_call(proposal)?)
                    .await?;
                ChainReceipt::Evm(submission.receipt)
            }
        };

        let transition = apply(&mut next, ProposalAction::Execute)?;
        log_phase("execute", &next);
        Ok(PhaseOutcome {
            proposal: next,
            receipt,
            transition: Some(transition),
        })
    }

    /// Cancels a native proposal (proposer only) or revokes this signer's
    /// confirmation on the EVM wallet.
    pub async fn cancel(
        &self,
        key_id: &KeyId,
        proposal: &ProposalState,
    ) -> Result<PhaseOutcome, CustodyError> {
        let mut next = proposal.clone();

        match &proposal.target {
            Target::NativeActor(multisig) => {
                proposal_transition(proposal.status, ProposalAction::Cancel)?;
                let submission = self
                    .submit_actor_call(key_id, multisig, multisig.cancel_call(proposal)?)
                    .await?;
                next.approvals.clear();
                let transition = apply(&mut next, ProposalAction::Cancel)?;
                log_phase("cancel", &next);
                Ok(PhaseOutcome {
                    proposal: next,
                    receipt: ChainReceipt::Native(submission.receipt),
                    transition: Some(transition),
                })
            }
            Target::EvmContract(multisig) => {
                proposal_transition(proposal.status, ProposalAction::Revoke)?;
                let submission = self
                    .submit_contract_call(key_id, multisig, multisig.cancel_call(proposal)?)
                    .await?;
                next.approvals.remove(&submission.from.to_string());
                let transition = apply(&mut next, ProposalAction::Revoke)?;
                log_phase("revoke", &next);
                Ok(PhaseOutcome {
                    proposal: next,
                    receipt: ChainReceipt::Evm(submission.receipt),
                    transition: Some(transition),
                })
            }
        }
    }

    async fn propose_native(
        &self,
        key_id: &KeyId,
        multisig: NativeMultisig,
        call: ProposedCall,
    ) -> Result<PhaseOutcome, CustodyError> {
        let encoded = multisig.propose_call(&call)?;
        let submission = self.submit_actor_call(key_id, &multisig, encoded).await?;
        let ret = ProposeReturn::decode(&submission.receipt.return_data)?;
        // Looked up after inclusion so a fresh account already has an ID.
        let proposer = self.native.lookup_id(&submission.from).await?;

        let mut proposal = ProposalState {
            target: Target::NativeActor(multisig),
            transaction_index: ret.txn_id,
            proposer: Some(proposer),
            call,
            approvals: BTreeSet::from([submission.from.to_string()]),
            status: ProposalStatus::Proposed,
        };
        let transition = match (ret.applied, ret.code) {
            (false, _) => None,
            (true, 0) => Some(apply(&mut proposal, ProposalAction::Execute)?),
            (true, code) => {
                warn!(index = %proposal.transaction_index, code, "proposal executed immediately but failed");
                Some(apply(&mut proposal, ProposalAction::Revert)?)
            }
        };
        log_phase("propose", &proposal);

        Ok(PhaseOutcome {
            proposal,
            receipt: ChainReceipt::Native(submission.receipt),
            transition,
        })
    }

    async fn propose_evm(
        &self,
        key_id: &KeyId,
        multisig: EvmMultisig,
        call: ProposedCall,
    ) -> Result<PhaseOutcome, CustodyError> {
        let data = multisig.propose_call(&call)?;

        // Best effort: another submitter can race this read.
        let read_index = match self
            .evm
            .call(multisig.address, EvmMultisig::transaction_count_call())
            .await
        {
            Ok(raw) => EvmMultisig::decode_transaction_count(&raw)
                .map_err(|e| warn!(error = %e, "unreadable transaction count"))
                .ok(),
            Err(e) => {
                warn!(error = %e, "transaction count read failed");
                None
            }
        };

        let submission = self.submit_contract_call(key_id, &multisig, data).await?;
        let index = match (multisig.submitted_index(&submission.receipt), read_index) {
            (Some(event), Some(read)) if event != read => {
                warn!(event, read, "transaction index moved between read and submit");
                event
            }
            (Some(event), _) => event,
            (None, Some(read)) => {
                warn!(read, "no SubmitTransaction event in receipt, using pre-read index");
                read
            }
            (None, None) => {
                return Err(DecodingError::MalformedReturn(
                    "submitTransaction receipt carries no transaction index".to_owned(),
                )
                .into())
            }
        };

        let proposal = ProposalState {
            target: Target::EvmContract(multisig),
            transaction_index: TxIndex(index),
            proposer: None,
            call,
            approvals: BTreeSet::new(),
            status: ProposalStatus::Proposed,
        };
        log_phase("propose", &proposal);

        Ok(PhaseOutcome {
            proposal,
            receipt: ChainReceipt::Evm(submission.receipt),
            transition: None,
        })
    }

    async fn submit_actor_call(
        &self,
        key_id: &KeyId,
        multisig: &NativeMultisig,
        call: ActorCall,
    ) -> Result<NativeSubmission, CustodyError> {
        self.native_pipeline()
            .submit(
                key_id,
                MessageDraft {
                    to: multisig.address.clone(),
                    value: BigUint::default(),
                    method: call.method,
                    params: call.params,
                },
            )
            .await
    }

    /// Wallet calls carry no value; the wallet pays the proposed value
    /// from its own balance.
    async fn submit_contract_call(
        &self,
        key_id: &KeyId,
        multisig: &EvmMultisig,
        data: Bytes,
    ) -> Result<EvmSubmission, CustodyError> {
        self.evm_pipeline()
            .submit(key_id, multisig.address, U256::ZERO, data)
            .await
    }
}

fn apply(
    proposal: &mut ProposalState,
    action: ProposalAction,
) -> Result<StateTransition, CustodyError> {
    let (status, transition) = proposal_transition(proposal.status, action)?;
    proposal.status = status;
    Ok(transition)
}

fn log_phase(phase: &'static str, proposal: &ProposalState) {
    info!(
        phase,
        index = %proposal.transaction_index,
        status = ?proposal.status,
        approvals = proposal.approvals.len(),
        "multisig phase complete"
    );
}
