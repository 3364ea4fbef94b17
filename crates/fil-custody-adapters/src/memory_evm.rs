//! Simulated FEVM node hosting `MultiSigWallet` contracts.
//!
//! Raw transactions are decoded and their sender recovered, so the signing
//! path is checked end to end. Wallet rules follow the reference wallet:
//! owners submit, confirm, revoke and execute once confirmations reach the
//! requirement. Any rule violation reverts the transaction (status 0).
//! Calls to other addresses succeed and are recorded as-is.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::consensus::{SignableTransaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address as EthAddress, Bytes, TxKind, B256, U256};
use alloy::sol_types::{SolEvent, SolInterface};
use async_trait::async_trait;
use fil_custody_core::signer::evm_address_of;
use fil_custody_core::target::MultiSigWallet::{self, MultiSigWalletCalls};
use fil_custody_core::{CompactSignature, EvmFeeData, EvmLog, EvmReceipt, EvmRpcPort, PortError};
use tracing::debug;

const BASE_FEE: u128 = 100;
const PRIORITY_FEE: u128 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletTransaction {
    pub to: EthAddress,
    pub value: U256,
    pub data: Bytes,
    pub executed: bool,
    pub confirmations: Vec<EthAddress>,
}

/// A call to an address that hosts no wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub from: EthAddress,
    pub to: EthAddress,
    pub value: U256,
    pub input: Bytes,
}

#[derive(Debug, Clone)]
struct Wallet {
    owners: Vec<EthAddress>,
    required: usize,
    transactions: Vec<WalletTransaction>,
}

#[derive(Debug)]
struct EvmState {
    chain_id: u64,
    nonces: HashMap<EthAddress, u64>,
    wallets: HashMap<EthAddress, Wallet>,
    receipts: HashMap<B256, EvmReceipt>,
    contract_calls: Vec<ContractCall>,
    front_run: Option<EthAddress>,
}

#[derive(Debug, Clone)]
pub struct InMemoryEvm {
    state: Arc<Mutex<EvmState>>,
}

struct Revert(String);

impl InMemoryEvm {
    pub fn new(chain_id: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(EvmState {
                chain_id,
                nonces: HashMap::new(),
                wallets: HashMap::new(),
                receipts: HashMap::new(),
                contract_calls: Vec::new(),
                front_run: None,
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, EvmState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("evm simulator lock poisoned: {e}")))
    }

    pub fn deploy_wallet(
        &self,
        address: EthAddress,
        owners: &[EthAddress],
        required: usize,
    ) -> Result<(), PortError> {
        self.lock()?.wallets.insert(
            address,
            Wallet {
                owners: owners.to_vec(),
                required,
                transactions: Vec::new(),
            },
        );
        Ok(())
    }

    /// Makes `owner` submit a transaction of its own just before the next
    /// `submitTransaction` lands, shifting that submission's index.
    pub fn front_run_next_submit(&self, owner: EthAddress) -> Result<(), PortError> {
        self.lock()?.front_run = Some(owner);
        Ok(())
    }

    pub fn contract_calls(&self) -> Result<Vec<ContractCall>, PortError> {
        Ok(self.lock()?.contract_calls.clone())
    }

    pub fn wallet_transaction(
        &self,
        wallet: EthAddress,
        index: u64,
    ) -> Result<Option<WalletTransaction>, PortError> {
        let state = self.lock()?;
        let wallet = state
            .wallets
            .get(&wallet)
            .ok_or_else(|| PortError::NotFound(format!("wallet {wallet}")))?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|index| wallet.transactions.get(index))
            .cloned())
    }
}

fn rejected(message: impl Into<String>) -> PortError {
    PortError::Rpc {
        code: -32000,
        message: message.into(),
    }
}

fn submit_log(wallet: EthAddress, owner: EthAddress, index: usize, tx: &WalletTransaction) -> EvmLog {
    let event = MultiSigWallet::SubmitTransaction {
        owner,
        txIndex: U256::from(index),
        to: tx.to,
        value: tx.value,
        data: tx.data.clone(),
    };
    let encoded = event.encode_log_data();
    EvmLog {
        address: wallet,
        topics: encoded.topics().to_vec(),
        data: encoded.data,
    }
}

fn pending_mut(wallet: &mut Wallet, index: U256) -> Result<&mut WalletTransaction, Revert> {
    let tx = usize::try_from(index)
        .ok()
        .and_then(|index| wallet.transactions.get_mut(index))
        .ok_or_else(|| Revert("tx does not exist".to_owned()))?;
    if tx.executed {
        return Err(Revert("tx already executed".to_owned()));
    }
    Ok(tx)
}

impl EvmState {
    fn apply_wallet_call(
        &mut self,
        wallet_address: EthAddress,
        sender: EthAddress,
        input: &[u8],
    ) -> Result<Vec<EvmLog>, Revert> {
        let front_run = self.front_run;
        let wallet = self
            .wallets
            .get_mut(&wallet_address)
            .ok_or_else(|| Revert("no wallet".to_owned()))?;
        if !wallet.owners.contains(&sender) {
            return Err(Revert("not owner".to_owned()));
        }
        let call = MultiSigWalletCalls::abi_decode(input, true)
            .map_err(|e| Revert(format!("unknown selector: {e}")))?;

        match call {
            MultiSigWalletCalls::submitTransaction(call) => {
                if let Some(other) = front_run {
                    wallet.transactions.push(WalletTransaction {
                        to: other,
                        value: U256::ZERO,
                        data: Bytes::new(),
                        executed: false,
                        confirmations: Vec::new(),
                    });
                    self.front_run = None;
                }
                let tx = WalletTransaction {
                    to: call.to,
                    value: call.value,
                    data: call.data,
                    executed: false,
                    confirmations: Vec::new(),
                };
                let log = submit_log(wallet_address, sender, wallet.transactions.len(), &tx);
                wallet.transactions.push(tx);
                Ok(vec![log])
            }
            MultiSigWalletCalls::confirmTransaction(call) => {
                let tx = pending_mut(wallet, call.txIndex)?;
                if tx.confirmations.contains(&sender) {
                    return Err(Revert("tx already confirmed".to_owned()));
                }
                tx.confirmations.push(sender);
                Ok(Vec::new())
            }
            MultiSigWalletCalls::executeTransaction(call) => {
                let required = wallet.required;
                let tx = pending_mut(wallet, call.txIndex)?;
                if tx.confirmations.len() < required {
                    return Err(Revert("cannot execute tx".to_owned()));
                }
                tx.executed = true;
                Ok(Vec::new())
            }
            MultiSigWalletCalls::revokeConfirmation(call) => {
                let tx = pending_mut(wallet, call.txIndex)?;
                let position = tx
                    .confirmations
                    .iter()
                    .position(|owner| *owner == sender)
                    .ok_or_else(|| Revert("tx not confirmed".to_owned()))?;
                tx.confirmations.remove(position);
                Ok(Vec::new())
            }
            MultiSigWalletCalls::getTransactionCount(_) => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl EvmRpcPort for InMemoryEvm {
    async fn transaction_count(&self, address: EthAddress) -> Result<u64, PortError> {
        Ok(self.lock()?.nonces.get(&address).copied().unwrap_or_default())
    }

    async fn fee_data(&self) -> Result<EvmFeeData, PortError> {
        Ok(EvmFeeData {
            max_fee_per_gas: 2 * BASE_FEE + PRIORITY_FEE,
            max_priority_fee_per_gas: PRIORITY_FEE,
        })
    }

    async fn call(&self, to: EthAddress, data: Bytes) -> Result<Bytes, PortError> {
        let state = self.lock()?;
        let wallet = state
            .wallets
            .get(&to)
            .ok_or_else(|| rejected(format!("no contract at {to}")))?;
        match MultiSigWalletCalls::abi_decode(&data, true) {
            Ok(MultiSigWalletCalls::getTransactionCount(_)) => {
                Ok(U256::from(wallet.transactions.len()).to_be_bytes::<32>().to_vec().into())
            }
            Ok(_) => Ok(Bytes::new()),
            Err(e) => Err(rejected(format!("execution reverted: {e}"))),
        }
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, PortError> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| rejected(format!("undecodable transaction: {e}")))?;
        let TxEnvelope::Eip1559(signed) = envelope else {
            return Err(rejected("only EIP-1559 transactions are accepted"));
        };
        let tx = signed.tx();
        let signature = signed.signature();

        let compact = CompactSignature {
            r: signature.r().to_be_bytes::<32>(),
            s: signature.s().to_be_bytes::<32>(),
            recovery_id: u8::from(signature.v()),
        };
        let key = compact
            .recover(&tx.signature_hash().0)
            .map_err(|e| rejected(format!("invalid signature: {e}")))?;
        let sender = evm_address_of(&key);

        let mut state = self.lock()?;
        if tx.chain_id != state.chain_id {
            return Err(rejected(format!(
                "chain id {} does not match {}",
                tx.chain_id, state.chain_id
            )));
        }
        let expected = state.nonces.get(&sender).copied().unwrap_or_default();
        if tx.nonce != expected {
            return Err(rejected(format!(
                "nonce mismatch: expected {expected}, got {}",
                tx.nonce
            )));
        }
        state.nonces.insert(sender, expected + 1);

        let outcome = match tx.to {
            TxKind::Call(to) if state.wallets.contains_key(&to) => {
                state.apply_wallet_call(to, sender, &tx.input)
            }
            TxKind::Call(to) => {
                state.contract_calls.push(ContractCall {
                    from: sender,
                    to,
                    value: tx.value,
                    input: tx.input.clone(),
                });
                Ok(Vec::new())
            }
            TxKind::Create => Err(Revert("contract creation unsupported".to_owned())),
        };

        let hash = keccak256(&raw);
        let (status, logs) = match outcome {
            Ok(logs) => (true, logs),
            Err(Revert(reason)) => {
                debug!(tx_hash = %hash, reason = %reason, "simulated transaction reverted");
                (false, Vec::new())
            }
        };
        state.receipts.insert(
            hash,
            EvmReceipt {
                transaction_hash: hash,
                status,
                gas_used: 21_000,
                logs,
            },
        );
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<EvmReceipt, PortError> {
        self.lock()?
            .receipts
            .get(&hash)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("receipt for {hash}")))
    }
}
