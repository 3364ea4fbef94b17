mod common;

use fil_custody_core::{
    Address, ChainReceipt, CustodyError, ErrorKind, Network, ProposalState, ProposalStatus,
    ProposedCall, Target, TxCommand, TxIndex,
};
use num_bigint::BigUint;

use common::{harness, key, Harness, ALICE, BOB, CAROL};

async fn three_of_three(h: &Harness) -> Address {
    let signers = [
        h.native_address(ALICE).await,
        h.native_address(BOB).await,
        h.native_address(CAROL).await,
    ];
    h.lotus.create_multisig(&signers, 3).expect("create multisig")
}

async fn propose_transfer(h: &Harness, multisig: &Address) -> ProposalState {
    let beneficiary = Address::new_id(Network::Testnet, 4242);
    let outcome = h
        .orch
        .propose(
            &key(ALICE),
            Target::native(multisig.clone()),
            ProposedCall::transfer(beneficiary, BigUint::from(7_000u32)),
        )
        .await
        .expect("propose");
    outcome.proposal
}

#[tokio::test]
async fn propose_confirm_execute_reaches_executed() {
    let h = harness();
    let multisig = three_of_three(&h).await;

    let proposal = propose_transfer(&h, &multisig).await;
    assert_eq!(proposal.transaction_index, TxIndex(0));
    assert_eq!(proposal.status, ProposalStatus::Proposed);
    let alice = h.native_address(ALICE).await;
    assert!(proposal.approvals.contains(&alice.to_string()));
    let proposer = proposal.proposer.clone().expect("proposer id");
    assert!(proposer.id().is_some(), "proposer is recorded as an ID address");

    let confirmed = h
        .orch
        .confirm(&key(BOB), &proposal)
        .await
        .expect("confirm");
    assert_eq!(confirmed.proposal.status, ProposalStatus::Confirming);
    assert_eq!(confirmed.proposal.approvals.len(), 2);
    let transition = confirmed.transition.expect("transition");
    assert_eq!(transition.from, ProposalStatus::Proposed);
    assert_eq!(transition.to, ProposalStatus::Confirming);

    let executed = h
        .orch
        .execute(&key(CAROL), &confirmed.proposal)
        .await
        .expect("execute");
    assert_eq!(executed.proposal.status, ProposalStatus::Executed);
    assert_eq!(executed.proposal.approvals.len(), 3);
    assert!(h
        .lotus
        .pending_transactions(&multisig)
        .expect("pending")
        .is_empty());

    let err = h
        .orch
        .confirm(&key(BOB), &executed.proposal)
        .await
        .expect_err("executed proposal is terminal");
    assert!(matches!(err, CustodyError::IllegalTransition(_)));
}

#[tokio::test]
async fn execute_below_threshold_is_reverted() {
    let h = harness();
    let multisig = three_of_three(&h).await;
    let proposal = propose_transfer(&h, &multisig).await;

    let err = h
        .orch
        .execute(&key(BOB), &proposal)
        .await
        .expect_err("two of three approvals cannot execute");

    let bob = h.native_address(BOB).await;
    let recorded = err.proposal().cloned().expect("approval is carried back");
    assert_eq!(recorded.status, ProposalStatus::Confirming);
    assert_eq!(recorded.approvals.len(), 2);
    assert!(recorded.approvals.contains(&bob.to_string()));

    let CustodyError::ExecutionReverted { reason, receipt, .. } = err else {
        panic!("expected ExecutionReverted");
    };
    assert_eq!(reason, "threshold not met");
    assert!(matches!(*receipt, ChainReceipt::Native(ref r) if r.exit_code == 0));

    // The returned state picks up where the chain is: the last signer executes.
    let executed = h
        .orch
        .execute(&key(CAROL), &recorded)
        .await
        .expect("third approval executes");
    assert_eq!(executed.proposal.status, ProposalStatus::Executed);
    assert_eq!(executed.proposal.approvals.len(), 3);
}

#[tokio::test]
async fn confirm_on_unknown_index_is_reverted() {
    let h = harness();
    let multisig = three_of_three(&h).await;
    let mut proposal = propose_transfer(&h, &multisig).await;
    proposal.transaction_index = TxIndex(99);

    let err = h
        .orch
        .handle(TxCommand::Confirm {
            key_id: key(BOB),
            proposal,
        })
        .await
        .expect_err("unknown index");

    assert_eq!(err.kind(), ErrorKind::ChainRejected);
    assert!(!err.is_retryable());
    let CustodyError::ExecutionReverted { receipt, .. } = err else {
        panic!("expected ExecutionReverted");
    };
    let ChainReceipt::Native(receipt) = *receipt else {
        panic!("native receipt expected");
    };
    assert_eq!(receipt.exit_code, 17);
}

#[tokio::test]
async fn confirm_with_stale_proposal_hash_is_reverted() {
    let h = harness();
    let multisig = three_of_three(&h).await;
    let mut proposal = propose_transfer(&h, &multisig).await;
    proposal.call.value = BigUint::from(1u32);

    let err = h
        .orch
        .confirm(&key(BOB), &proposal)
        .await
        .expect_err("hash mismatch");
    let CustodyError::ExecutionReverted { receipt, .. } = err else {
        panic!("expected ExecutionReverted");
    };
    assert!(matches!(*receipt, ChainReceipt::Native(ref r) if r.exit_code == 16));
}

#[tokio::test]
async fn proposer_cancels_pending_proposal() {
    let h = harness();
    let multisig = three_of_three(&h).await;
    let proposal = propose_transfer(&h, &multisig).await;

    let err = h
        .orch
        .cancel(&key(BOB), &proposal)
        .await
        .expect_err("only the proposer may cancel");
    assert!(matches!(err, CustodyError::ExecutionReverted { .. }));

    let cancelled = h
        .orch
        .handle(TxCommand::Cancel {
            key_id: key(ALICE),
            proposal,
        })
        .await
        .expect("cancel");
    let state = cancelled.proposal.expect("proposal");
    assert_eq!(state.status, ProposalStatus::Cancelled);
    assert!(state.approvals.is_empty());
    assert!(h
        .lotus
        .pending_transactions(&multisig)
        .expect("pending")
        .is_empty());
}

#[tokio::test]
async fn single_signer_multisig_executes_on_propose() {
    let h = harness();
    let alice = h.native_address(ALICE).await;
    let multisig = h.lotus.create_multisig(&[alice], 1).expect("create");

    let outcome = h
        .orch
        .propose(
            &key(ALICE),
            Target::native(multisig),
            ProposedCall::transfer(Address::new_id(Network::Testnet, 5), BigUint::from(1u32)),
        )
        .await
        .expect("propose");

    assert_eq!(outcome.proposal.status, ProposalStatus::Executed);
    assert_eq!(
        outcome.transition.expect("transition").to,
        ProposalStatus::Executed
    );
}

#[tokio::test]
async fn non_signer_cannot_propose() {
    let h = harness();
    let alice = h.native_address(ALICE).await;
    let multisig = h.lotus.create_multisig(&[alice], 1).expect("create");

    let err = h
        .orch
        .propose(
            &key(CAROL),
            Target::native(multisig),
            ProposedCall::transfer(Address::new_id(Network::Testnet, 5), BigUint::from(1u32)),
        )
        .await
        .expect_err("outsider");
    let CustodyError::ExecutionReverted { receipt, .. } = err else {
        panic!("expected ExecutionReverted");
    };
    assert!(matches!(*receipt, ChainReceipt::Native(ref r) if r.exit_code == 18));
}

#[tokio::test]
async fn evm_invocation_is_proposed_through_the_actor() {
    let h = harness();
    let multisig = three_of_three(&h).await;
    let contract = Address::new_delegated_eth(common::wallet_address(), Network::Testnet);

    let call = ProposedCall::evm_invoke(contract, BigUint::default(), &[0xde, 0xad, 0xbe, 0xef])
        .expect("evm invoke");
    let outcome = h
        .orch
        .propose(&key(ALICE), Target::native(multisig.clone()), call.clone())
        .await
        .expect("propose");

    assert_eq!(outcome.proposal.call, call);
    assert_eq!(
        h.lotus.pending_transactions(&multisig).expect("pending"),
        vec![TxIndex(0)]
    );
}
