//! Multisig targets and their call encodings.
//!
//! Both targets expose the same four phases. The native actor takes CBOR
//! params on numbered methods; the EVM wallet takes ABI calldata.

use alloy::primitives::{Address as EthAddress, Bytes, U256};
use alloy::sol_types::{SolCall, SolEvent};
use ciborium::value::Value;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::bignum;
use crate::cbor;
use crate::digest::blake2b_256;
use crate::domain::{EvmReceipt, ProposalState, ProposedCall, TxIndex};
use crate::error::{CustodyError, DecodingError};

alloy::sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface MultiSigWallet {
        event SubmitTransaction(
            address indexed owner,
            uint256 indexed txIndex,
            address indexed to,
            uint256 value,
            bytes data
        );

        function submitTransaction(address to, uint256 value, bytes data) external;
        function confirmTransaction(uint256 txIndex) external;
        function executeTransaction(uint256 txIndex) external;
        function revokeConfirmation(uint256 txIndex) external;
        function getTransactionCount() external view returns (uint256);
    }
}

/// Native multisig actor method numbers.
pub mod method {
    pub const PROPOSE: u64 = 2;
    pub const APPROVE: u64 = 3;
    pub const CANCEL: u64 = 4;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    NativeActor(NativeMultisig),
    EvmContract(EvmMultisig),
}

impl Target {
    pub fn native(address: Address) -> Self {
        Self::NativeActor(NativeMultisig { address })
    }

    pub fn evm(address: EthAddress) -> Self {
        Self::EvmContract(EvmMultisig { address })
    }
}

/// Call-data capability shared by both multisig kinds.
pub trait MultisigEncoding {
    type Call;

    fn propose_call(&self, call: &ProposedCall) -> Result<Self::Call, CustodyError>;
    fn confirm_call(&self, proposal: &ProposalState) -> Result<Self::Call, CustodyError>;
    fn execute_call(&self, proposal: &ProposalState) -> Result<Self::Call, CustodyError>;
    fn cancel_call(&self, proposal: &ProposalState) -> Result<Self::Call, CustodyError>;
}

/// A method invocation on a native actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorCall {
    pub method: u64,
    pub params: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeMultisig {
    pub address: Address,
}

impl NativeMultisig {
    /// `blake2b256(cbor([proposer, to, value, method, params]))`, checked by
    /// the actor on approve and cancel.
    pub fn proposal_hash(proposer: &Address, call: &ProposedCall) -> Result<[u8; 32], CustodyError> {
        let encoded = cbor::encode(&Value::Array(vec![
            cbor::bytes(proposer.to_bytes()),
            cbor::bytes(call.to.to_bytes()),
            cbor::bytes(bignum::encode(&call.value)),
            cbor::uint(call.method),
            cbor::bytes(call.params.clone()),
        ]))?;
        Ok(blake2b_256(&encoded))
    }

    fn txn_id_params(proposal: &ProposalState) -> Result<Vec<u8>, CustodyError> {
        let proposer = proposal.proposer.as_ref().ok_or_else(|| {
            CustodyError::InvalidRequest("native proposal has no proposer id".to_owned())
        })?;
        let hash = Self::proposal_hash(proposer, &proposal.call)?;
        cbor::encode(&Value::Array(vec![
            cbor::uint(proposal.transaction_index.0),
            cbor::bytes(hash.to_vec()),
        ]))
    }
}

impl MultisigEncoding for NativeMultisig {
    type Call = ActorCall;

    fn propose_call(&self, call: &ProposedCall) -> Result<ActorCall, CustodyError> {
        let params = cbor::encode(&Value::Array(vec![
            cbor::bytes(call.to.to_bytes()),
            cbor::bytes(bignum::encode(&call.value)),
            cbor::uint(call.method),
            cbor::bytes(call.params.clone()),
        ]))?;
        Ok(ActorCall {
            method: method::PROPOSE,
            params,
        })
    }

    fn confirm_call(&self, proposal: &ProposalState) -> Result<ActorCall, CustodyError> {
        Ok(ActorCall {
            method: method::APPROVE,
            params: Self::txn_id_params(proposal)?,
        })
    }

    /// The actor executes on the approval that reaches the threshold.
    fn execute_call(&self, proposal: &ProposalState) -> Result<ActorCall, CustodyError> {
        self.confirm_call(proposal)
    }

    fn cancel_call(&self, proposal: &ProposalState) -> Result<ActorCall, CustodyError> {
        Ok(ActorCall {
            method: method::CANCEL,
            params: Self::txn_id_params(proposal)?,
        })
    }
}

/// Decoded `Propose` return: `[txn_id, applied, code, ret]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposeReturn {
    pub txn_id: TxIndex,
    pub applied: bool,
    pub code: i64,
    pub ret: Vec<u8>,
}

impl ProposeReturn {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodingError> {
        let items = cbor::tuple(bytes, 4)?;
        Ok(Self {
            txn_id: TxIndex(cbor::as_u64(&items[0])?),
            applied: cbor::as_bool(&items[1])?,
            code: cbor::as_i64(&items[2])?,
            ret: cbor::as_bytes(&items[3])?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, CustodyError> {
        cbor::encode(&Value::Array(vec![
            cbor::uint(self.txn_id.0),
            Value::Bool(self.applied),
            cbor::int(self.code),
            cbor::bytes(self.ret.clone()),
        ]))
    }
}

/// Decoded `Approve` return: `[applied, code, ret]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveReturn {
    pub applied: bool,
    pub code: i64,
    pub ret: Vec<u8>,
}

impl ApproveReturn {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodingError> {
        let items = cbor::tuple(bytes, 3)?;
        Ok(Self {
            applied: cbor::as_bool(&items[0])?,
            code: cbor::as_i64(&items[1])?,
            ret: cbor::as_bytes(&items[2])?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, CustodyError> {
        cbor::encode(&Value::Array(vec![
            Value::Bool(self.applied),
            cbor::int(self.code),
            cbor::bytes(self.ret.clone()),
        ]))
    }
}

/// Decodes `[txn_id, proposal_hash]`, the params of approve and cancel.
pub fn decode_txn_id_params(bytes: &[u8]) -> Result<(TxIndex, Vec<u8>), DecodingError> {
    let items = cbor::tuple(bytes, 2).map_err(|e| DecodingError::MalformedParams(e.to_string()))?;
    Ok((TxIndex(cbor::as_u64(&items[0])?), cbor::as_bytes(&items[1])?))
}

/// Decodes `[to, value, method, params]`, the params of propose.
pub fn decode_propose_params(bytes: &[u8], network: crate::address::Network) -> Result<ProposedCall, DecodingError> {
    let items = cbor::tuple(bytes, 4).map_err(|e| DecodingError::MalformedParams(e.to_string()))?;
    let to = Address::from_bytes(network, &cbor::as_bytes(&items[0])?).map_err(DecodingError::Address)?;
    Ok(ProposedCall {
        to,
        value: bignum::decode(&cbor::as_bytes(&items[1])?)?,
        method: cbor::as_u64(&items[2])?,
        params: cbor::as_bytes(&items[3])?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmMultisig {
    pub address: EthAddress,
}

impl EvmMultisig {
    pub fn transaction_count_call() -> Bytes {
        MultiSigWallet::getTransactionCountCall {}.abi_encode().into()
    }

    pub fn decode_transaction_count(data: &[u8]) -> Result<u64, DecodingError> {
        let count = MultiSigWallet::getTransactionCountCall::abi_decode_returns(data, true)
            .map_err(|e| DecodingError::MalformedReturn(format!("getTransactionCount: {e}")))?
            ._0;
        u64::try_from(count)
            .map_err(|_| DecodingError::MalformedReturn(format!("transaction count {count} overflows")))
    }

    /// Index carried by the wallet's `SubmitTransaction` event, if present.
    pub fn submitted_index(&self, receipt: &EvmReceipt) -> Option<u64> {
        receipt
            .logs
            .iter()
            .filter(|log| log.address == self.address)
            .filter(|log| log.topics.first() == Some(&MultiSigWallet::SubmitTransaction::SIGNATURE_HASH))
            .find_map(|log| log.topics.get(2))
            .and_then(|topic| u64::try_from(U256::from_be_bytes(topic.0)).ok())
    }

    fn index(proposal: &ProposalState) -> U256 {
        U256::from(proposal.transaction_index.0)
    }
}

impl MultisigEncoding for EvmMultisig {
    type Call = Bytes;

    fn propose_call(&self, call: &ProposedCall) -> Result<Bytes, CustodyError> {
        let to = call.to.eth_address().ok_or_else(|| {
            CustodyError::InvalidRequest(format!("{} has no EVM address", call.to))
        })?;
        Ok(MultiSigWallet::submitTransactionCall {
            to,
            value: to_u256(&call.value)?,
            data: call.params.clone().into(),
        }
        .abi_encode()
        .into())
    }

    fn confirm_call(&self, proposal: &ProposalState) -> Result<Bytes, CustodyError> {
        Ok(MultiSigWallet::confirmTransactionCall {
            txIndex: Self::index(proposal),
        }
        .abi_encode()
        .into())
    }

    fn execute_call(&self, proposal: &ProposalState) -> Result<Bytes, CustodyError> {
        Ok(MultiSigWallet::executeTransactionCall {
            txIndex: Self::index(proposal),
        }
        .abi_encode()
        .into())
    }

    /// The wallet has no cancel; the signer revokes its own confirmation.
    fn cancel_call(&self, proposal: &ProposalState) -> Result<Bytes, CustodyError> {
        Ok(MultiSigWallet::revokeConfirmationCall {
            txIndex: Self::index(proposal),
        }
        .abi_encode()
        .into())
    }
}

pub fn to_u256(value: &BigUint) -> Result<U256, CustodyError> {
    if value.bits() > 256 {
        return Err(CustodyError::InvalidRequest(format!("{value} does not fit in uint256")));
    }
    Ok(U256::from_be_slice(&value.to_bytes_be()))
}
