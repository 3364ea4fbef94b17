mod common;

use alloy::primitives::U256;
use fil_custody_adapters::{ContractCall, GovernedCall};
use fil_custody_core::{
    Address, ChainReceipt, CustodyError, Network, ProposalState, ProposalStatus,
    ProposedCall, Target, TxCommand, TxIndex,
};
use num_bigint::BigUint;

use common::{harness, key, wallet_address, Harness, ALICE, BOB, CAROL};

async fn two_of_two(h: &Harness) {
    let owners = [h.evm_address(ALICE).await, h.evm_address(BOB).await];
    h.evm
        .deploy_wallet(wallet_address(), &owners, 2)
        .expect("deploy wallet");
}

fn governed_call() -> ProposedCall {
    let pool = "0x00000000000000000000000000000000000000b0"
        .parse()
        .expect("pool address");
    let registry = Address::new_delegated_eth(
        "0x00000000000000000000000000000000000000a1"
            .parse()
            .expect("registry"),
        Network::Testnet,
    );
    let calldata = GovernedCall::SetPool(pool).calldata().expect("calldata");
    ProposedCall::contract_call(registry, BigUint::default(), calldata.to_vec())
}

async fn propose(h: &Harness) -> ProposalState {
    h.orch
        .propose(&key(ALICE), Target::evm(wallet_address()), governed_call())
        .await
        .expect("propose")
        .proposal
}

#[tokio::test]
async fn propose_confirm_execute_on_wallet() {
    let h = harness();
    two_of_two(&h).await;

    let proposal = propose(&h).await;
    assert_eq!(proposal.transaction_index, TxIndex(0));
    assert_eq!(proposal.status, ProposalStatus::Proposed);
    assert!(proposal.approvals.is_empty());
    assert!(proposal.proposer.is_none());

    let first = h
        .orch
        .confirm(&key(ALICE), &proposal)
        .await
        .expect("alice confirms");
    let second = h
        .orch
        .confirm(&key(BOB), &first.proposal)
        .await
        .expect("bob confirms");
    assert_eq!(second.proposal.status, ProposalStatus::Confirming);
    assert_eq!(second.proposal.approvals.len(), 2);

    let executed = h
        .orch
        .handle(TxCommand::Execute {
            key_id: key(ALICE),
            proposal: second.proposal,
        })
        .await
        .expect("execute");
    assert_eq!(
        executed.proposal.expect("proposal").status,
        ProposalStatus::Executed
    );
    assert!(matches!(executed.receipt, ChainReceipt::Evm(ref r) if r.status));

    let stored = h
        .evm
        .wallet_transaction(wallet_address(), 0)
        .expect("wallet")
        .expect("transaction 0");
    assert!(stored.executed);
    assert_eq!(stored.confirmations.len(), 2);
    assert_eq!(
        stored.data.to_vec(),
        GovernedCall::SetPool(
            "0x00000000000000000000000000000000000000b0"
                .parse()
                .expect("pool")
        )
        .calldata()
        .expect("calldata")
        .to_vec()
    );
}

#[tokio::test]
async fn submitted_index_follows_the_event_when_another_owner_races() {
    let h = harness();
    two_of_two(&h).await;
    let bob = h.evm_address(BOB).await;
    h.evm.front_run_next_submit(bob).expect("arm race");

    let proposal = propose(&h).await;

    assert_eq!(proposal.transaction_index, TxIndex(1));
    let stored = h
        .evm
        .wallet_transaction(wallet_address(), 1)
        .expect("wallet")
        .expect("transaction 1");
    let registry: alloy::primitives::Address = "0x00000000000000000000000000000000000000a1"
        .parse()
        .expect("registry");
    assert_eq!(stored.to, registry);
}

#[tokio::test]
async fn cancel_revokes_own_confirmation() {
    let h = harness();
    two_of_two(&h).await;
    let proposal = propose(&h).await;
    let confirmed = h
        .orch
        .confirm(&key(ALICE), &proposal)
        .await
        .expect("confirm");

    let revoked = h
        .orch
        .cancel(&key(ALICE), &confirmed.proposal)
        .await
        .expect("revoke");

    assert!(revoked.proposal.approvals.is_empty());
    assert_eq!(revoked.proposal.status, ProposalStatus::Confirming);
    let stored = h
        .evm
        .wallet_transaction(wallet_address(), 0)
        .expect("wallet")
        .expect("transaction 0");
    assert!(stored.confirmations.is_empty());

    let err = h
        .orch
        .cancel(&key(ALICE), &revoked.proposal)
        .await
        .expect_err("nothing left to revoke");
    assert!(matches!(err, CustodyError::ExecutionReverted { .. }));
}

#[tokio::test]
async fn confirm_on_unknown_index_is_reverted() {
    let h = harness();
    two_of_two(&h).await;
    let mut proposal = propose(&h).await;
    proposal.transaction_index = TxIndex(99);

    let err = h
        .orch
        .confirm(&key(BOB), &proposal)
        .await
        .expect_err("unknown index");

    let CustodyError::ExecutionReverted { reason, receipt, .. } = err else {
        panic!("expected ExecutionReverted");
    };
    assert_eq!(reason, "status 0");
    assert!(matches!(*receipt, ChainReceipt::Evm(ref r) if !r.status));
}

#[tokio::test]
async fn execute_without_confirmations_is_reverted() {
    let h = harness();
    two_of_two(&h).await;
    let proposal = propose(&h).await;

    let err = h
        .orch
        .execute(&key(ALICE), &proposal)
        .await
        .expect_err("no confirmations");
    assert!(matches!(err, CustodyError::ExecutionReverted { .. }));
    assert!(!h
        .evm
        .wallet_transaction(wallet_address(), 0)
        .expect("wallet")
        .expect("transaction 0")
        .executed);
}

#[tokio::test]
async fn non_owner_submission_is_reverted() {
    let h = harness();
    two_of_two(&h).await;

    let err = h
        .orch
        .propose(&key(CAROL), Target::evm(wallet_address()), governed_call())
        .await
        .expect_err("carol is not an owner");
    assert!(matches!(err, CustodyError::ExecutionReverted { .. }));
}

#[tokio::test]
async fn deposit_is_sent_directly_with_value() {
    let h = harness();
    let pool = "0x00000000000000000000000000000000000000b0"
        .parse()
        .expect("pool address");
    let one_fil = BigUint::from(10u64).pow(18);
    let calldata = GovernedCall::Deposit.calldata().expect("deposit");

    let result = h
        .orch
        .handle(TxCommand::Invoke {
            key_id: key(ALICE),
            contract: pool,
            value: one_fil.clone(),
            calldata: calldata.clone(),
        })
        .await
        .expect("deposit");
    assert!(result.proposal.is_none());
    assert!(result.transition.is_none());
    assert!(matches!(result.receipt, ChainReceipt::Evm(ref r) if r.status));

    let calls = h.evm.contract_calls().expect("calls");
    assert_eq!(
        calls,
        vec![ContractCall {
            from: h.evm_address(ALICE).await,
            to: pool,
            value: U256::from_be_slice(&one_fil.to_bytes_be()),
            input: calldata,
        }]
    );
}

#[tokio::test]
async fn invoke_rejects_values_beyond_uint256() {
    let h = harness();
    let err = h
        .orch
        .handle(TxCommand::Invoke {
            key_id: key(ALICE),
            contract: wallet_address(),
            value: BigUint::from(1u8) << 256u32,
            calldata: Default::default(),
        })
        .await
        .expect_err("value too large");
    assert!(matches!(err, CustodyError::InvalidRequest(_)), "{err}");
    assert!(h.evm.contract_calls().expect("calls").is_empty());
}
