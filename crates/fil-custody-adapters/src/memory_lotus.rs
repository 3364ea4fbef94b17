//! Simulated native chain: verifies signatures and nonces, and runs a
//! multisig actor with the builtin actor's propose/approve/cancel rules.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use fil_custody_core::signature::uncompressed_public_key;
use fil_custody_core::target::{
    decode_propose_params, decode_txn_id_params, method, ApproveReturn, ProposeReturn,
};
use fil_custody_core::{
    Address, GasEstimate, NativeMultisig, NativeReceipt, NativeRpcPort, Network, PortError,
    ProposedCall, SignedMessage, TxIndex, UnsignedMessage,
};
use num_bigint::BigUint;
use tracing::debug;

/// Builtin actor exit codes.
pub mod exit_code {
    pub const OK: i64 = 0;
    pub const USR_ILLEGAL_ARGUMENT: i64 = 16;
    pub const USR_NOT_FOUND: i64 = 17;
    pub const USR_FORBIDDEN: i64 = 18;
    pub const USR_UNHANDLED_MESSAGE: i64 = 22;
}

const FIRST_ACTOR_ID: u64 = 1000;

#[derive(Debug, Clone)]
struct PendingTxn {
    call: ProposedCall,
    approved: Vec<u64>,
}

#[derive(Debug, Clone)]
struct MultisigActor {
    signers: Vec<u64>,
    threshold: usize,
    next_txn_id: u64,
    pending: BTreeMap<u64, PendingTxn>,
}

#[derive(Debug)]
struct LotusState {
    network: Network,
    next_id: u64,
    ids: HashMap<Address, u64>,
    nonces: HashMap<u64, u64>,
    multisigs: HashMap<u64, MultisigActor>,
    receipts: HashMap<String, NativeReceipt>,
    pushed: Vec<SignedMessage>,
    gas: GasEstimate,
    premium: BigUint,
}

impl LotusState {
    fn resolve(&mut self, address: &Address) -> u64 {
        if let Some(id) = address.id() {
            return id;
        }
        let normalized = address.clone().with_network(self.network);
        if let Some(id) = self.ids.get(&normalized) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(normalized, id);
        id
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryLotus {
    state: Arc<Mutex<LotusState>>,
}

impl InMemoryLotus {
    pub fn new(network: Network) -> Self {
        Self {
            state: Arc::new(Mutex::new(LotusState {
                network,
                next_id: FIRST_ACTOR_ID,
                ids: HashMap::new(),
                nonces: HashMap::new(),
                multisigs: HashMap::new(),
                receipts: HashMap::new(),
                pushed: Vec::new(),
                gas: GasEstimate {
                    gas_limit: 1_000_000,
                    gas_fee_cap: BigUint::from(100u32),
                },
                premium: BigUint::from(10u32),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LotusState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("lotus simulator lock poisoned: {e}")))
    }

    /// Creates a multisig actor and returns its ID address.
    pub fn create_multisig(&self, signers: &[Address], threshold: usize) -> Result<Address, PortError> {
        let mut state = self.lock()?;
        let signers = signers.iter().map(|s| state.resolve(s)).collect();
        let id = state.next_id;
        state.next_id += 1;
        state.multisigs.insert(
            id,
            MultisigActor {
                signers,
                threshold,
                next_txn_id: 0,
                pending: BTreeMap::new(),
            },
        );
        Ok(Address::new_id(state.network, id))
    }

    pub fn set_gas(&self, gas_limit: i64, gas_fee_cap: u64, premium: u64) -> Result<(), PortError> {
        let mut state = self.lock()?;
        state.gas = GasEstimate {
            gas_limit,
            gas_fee_cap: BigUint::from(gas_fee_cap),
        };
        state.premium = BigUint::from(premium);
        Ok(())
    }

    pub fn pushed_messages(&self) -> Result<Vec<SignedMessage>, PortError> {
        Ok(self.lock()?.pushed.clone())
    }

    /// Transaction ids still pending on a multisig.
    pub fn pending_transactions(&self, multisig: &Address) -> Result<Vec<TxIndex>, PortError> {
        let state = self.lock()?;
        let id = multisig
            .id()
            .ok_or_else(|| PortError::NotFound(format!("multisig {multisig}")))?;
        let actor = state
            .multisigs
            .get(&id)
            .ok_or_else(|| PortError::NotFound(format!("multisig {multisig}")))?;
        Ok(actor.pending.keys().copied().map(TxIndex).collect())
    }
}

fn rejected(message: impl Into<String>) -> PortError {
    PortError::Rpc {
        code: 1,
        message: message.into(),
    }
}

fn verify_sender(network: Network, signed: &SignedMessage) -> Result<(), PortError> {
    let message = signed.message();
    let compact = signed
        .compact_signature()
        .map_err(|e| rejected(format!("invalid signature: {e}")))?;
    let digest = message
        .signing_digest()
        .map_err(|e| PortError::Decode(e.to_string()))?;
    let key = compact
        .recover(&digest)
        .map_err(|e| rejected(format!("invalid signature: {e}")))?;
    let signer = Address::from_secp256k1_public_key(&uncompressed_public_key(&key), network)
        .map_err(|e| rejected(format!("invalid signer key: {e}")))?;
    if signer != message.from.clone().with_network(network) {
        return Err(rejected(format!(
            "signature by {signer} does not match sender {}",
            message.from
        )));
    }
    Ok(())
}

fn dispatch_multisig(
    network: Network,
    actor: &mut MultisigActor,
    sender: u64,
    message: &UnsignedMessage,
) -> Result<(i64, Vec<u8>), PortError> {
    let encode_err = |e: fil_custody_core::CustodyError| PortError::Decode(e.to_string());
    if !actor.signers.contains(&sender) {
        return Ok((exit_code::USR_FORBIDDEN, Vec::new()));
    }

    match message.method {
        method::PROPOSE => {
            let Ok(call) = decode_propose_params(&message.params, network) else {
                return Ok((exit_code::USR_ILLEGAL_ARGUMENT, Vec::new()));
            };
            let txn_id = actor.next_txn_id;
            actor.next_txn_id += 1;
            let applied = actor.threshold <= 1;
            if !applied {
                actor.pending.insert(
                    txn_id,
                    PendingTxn {
                        call,
                        approved: vec![sender],
                    },
                );
            }
            let ret = ProposeReturn {
                txn_id: TxIndex(txn_id),
                applied,
                code: exit_code::OK,
                ret: Vec::new(),
            };
            Ok((exit_code::OK, ret.encode().map_err(encode_err)?))
        }
        method::APPROVE | method::CANCEL => {
            let Ok((txn_id, hash)) = decode_txn_id_params(&message.params) else {
                return Ok((exit_code::USR_ILLEGAL_ARGUMENT, Vec::new()));
            };
            let Some(txn) = actor.pending.get_mut(&txn_id.0) else {
                return Ok((exit_code::USR_NOT_FOUND, Vec::new()));
            };
            if !hash.is_empty() {
                let proposer = Address::new_id(network, txn.approved[0]);
                let expected = NativeMultisig::proposal_hash(&proposer, &txn.call).map_err(encode_err)?;
                if hash != expected {
                    return Ok((exit_code::USR_ILLEGAL_ARGUMENT, Vec::new()));
                }
            }

            if message.method == method::CANCEL {
                if txn.approved[0] != sender {
                    return Ok((exit_code::USR_FORBIDDEN, Vec::new()));
                }
                actor.pending.remove(&txn_id.0);
                return Ok((exit_code::OK, Vec::new()));
            }

            if txn.approved.contains(&sender) {
                return Ok((exit_code::USR_FORBIDDEN, Vec::new()));
            }
            txn.approved.push(sender);
            let applied = txn.approved.len() >= actor.threshold;
            if applied {
                actor.pending.remove(&txn_id.0);
            }
            let ret = ApproveReturn {
                applied,
                code: exit_code::OK,
                ret: Vec::new(),
            };
            Ok((exit_code::OK, ret.encode().map_err(encode_err)?))
        }
        _ => Ok((exit_code::USR_UNHANDLED_MESSAGE, Vec::new())),
    }
}

#[async_trait]
impl NativeRpcPort for InMemoryLotus {
    async fn nonce(&self, address: &Address) -> Result<u64, PortError> {
        let mut state = self.lock()?;
        let id = state.resolve(address);
        Ok(state.nonces.get(&id).copied().unwrap_or_default())
    }

    async fn estimate_message_gas(&self, _message: &UnsignedMessage) -> Result<GasEstimate, PortError> {
        Ok(self.lock()?.gas.clone())
    }

    async fn estimate_gas_premium(
        &self,
        _blocks: u64,
        _from: &Address,
        _gas_limit: i64,
    ) -> Result<BigUint, PortError> {
        Ok(self.lock()?.premium.clone())
    }

    async fn lookup_id(&self, address: &Address) -> Result<Address, PortError> {
        let mut state = self.lock()?;
        let id = state.resolve(address);
        Ok(Address::new_id(state.network, id))
    }

    async fn push(&self, signed: &SignedMessage) -> Result<String, PortError> {
        let mut state = self.lock()?;
        let network = state.network;
        verify_sender(network, signed)?;

        let message = signed.message();
        if message.gas_limit <= 0 {
            return Err(rejected("gas limit not set"));
        }
        let sender = state.resolve(&message.from);
        let expected = state.nonces.get(&sender).copied().unwrap_or_default();
        if message.nonce != expected {
            return Err(rejected(format!(
                "nonce mismatch: expected {expected}, got {}",
                message.nonce
            )));
        }
        state.nonces.insert(sender, expected + 1);

        let recipient = state.resolve(&message.to);
        let (exit_code, return_data) = match state.multisigs.get_mut(&recipient) {
            Some(actor) => dispatch_multisig(network, actor, sender, message)?,
            None => (exit_code::OK, Vec::new()),
        };

        let cid = signed
            .content_id()
            .map_err(|e| PortError::Decode(e.to_string()))?;
        debug!(cid = %cid, exit_code, method = message.method, "simulated message applied");
        state.receipts.insert(
            cid.clone(),
            NativeReceipt {
                cid: cid.clone(),
                exit_code,
                return_data,
                gas_used: message.gas_limit / 2,
            },
        );
        state.pushed.push(signed.clone());
        Ok(cid)
    }

    async fn wait(&self, cid: &str, _confidence: u64) -> Result<NativeReceipt, PortError> {
        self.lock()?
            .receipts
            .get(cid)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("message {cid}")))
    }
}
