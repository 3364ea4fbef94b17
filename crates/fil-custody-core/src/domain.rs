use std::collections::BTreeSet;
use std::fmt;

use alloy::primitives::{Address as EthAddress, Bytes, B256};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::cbor;
use crate::error::CustodyError;
use crate::state_machine::ProposalStatus;
use crate::target::Target;

/// Method number of `InvokeEVM` on EVM actors.
pub const INVOKE_EVM_METHOD: u64 = 3_844_450_837;
pub const SEND_METHOD: u64 = 0;

/// Opaque identifier of a key held by the custody service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(pub String);

impl KeyId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Index assigned to a proposal by the multisig (native `TxnID` or EVM
/// `txIndex`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxIndex(pub u64);

impl fmt::Display for TxIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The action a multisig is asked to perform once approved.
///
/// `params` is passed to the target verbatim: CBOR params for a native actor
/// method, ABI calldata when the multisig is an EVM contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedCall {
    pub to: Address,
    pub value: BigUint,
    pub method: u64,
    pub params: Vec<u8>,
}

impl ProposedCall {
    pub fn transfer(to: Address, value: BigUint) -> Self {
        Self {
            to,
            value,
            method: SEND_METHOD,
            params: Vec::new(),
        }
    }

    pub fn actor_method(to: Address, value: BigUint, method: u64, params: Vec<u8>) -> Self {
        Self {
            to,
            value,
            method,
            params,
        }
    }

    /// Calls an FEVM contract through a native multisig: `InvokeEVM` with the
    /// calldata wrapped in a CBOR byte string.
    pub fn evm_invoke(contract: Address, value: BigUint, calldata: &[u8]) -> Result<Self, CustodyError> {
        Ok(Self {
            to: contract,
            value,
            method: INVOKE_EVM_METHOD,
            params: cbor::encode(&cbor::bytes(calldata))?,
        })
    }

    /// Calls a contract from an EVM multisig; `calldata` is forwarded as-is.
    pub fn contract_call(contract: Address, value: BigUint, calldata: Vec<u8>) -> Self {
        Self {
            to: contract,
            value,
            method: INVOKE_EVM_METHOD,
            params: calldata,
        }
    }
}

/// Local view of a multisig proposal. The chain stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalState {
    pub target: Target,
    pub transaction_index: TxIndex,
    /// ID address of the proposer; native approvals hash it.
    pub proposer: Option<Address>,
    pub call: ProposedCall,
    /// Signers (address strings) known to have approved.
    pub approvals: BTreeSet<String>,
    pub status: ProposalStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeReceipt {
    pub cid: String,
    pub exit_code: i64,
    pub return_data: Vec<u8>,
    pub gas_used: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmLog {
    pub address: EthAddress,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmReceipt {
    pub transaction_hash: B256,
    pub status: bool,
    pub gas_used: u64,
    pub logs: Vec<EvmLog>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainReceipt {
    Native(NativeReceipt),
    Evm(EvmReceipt),
}

impl fmt::Display for ChainReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(receipt) => write!(
                f,
                "message {} exit code {} gas used {}",
                receipt.cid, receipt.exit_code, receipt.gas_used
            ),
            Self::Evm(receipt) => write!(
                f,
                "transaction {} status {} gas used {}",
                receipt.transaction_hash,
                u8::from(receipt.status),
                receipt.gas_used
            ),
        }
    }
}
