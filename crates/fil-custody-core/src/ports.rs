use alloy::primitives::{Address as EthAddress, Bytes, B256};
use async_trait::async_trait;
use num_bigint::BigUint;
use thiserror::Error;

use crate::address::Address;
use crate::domain::{EvmReceipt, KeyId, NativeReceipt};
use crate::message::{SignedMessage, UnsignedMessage};

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// External custody service. Keys never leave it.
#[async_trait]
pub trait CustodyPort: Send + Sync {
    /// DER `SubjectPublicKeyInfo` or raw SEC1 bytes.
    async fn public_key(&self, key_id: &KeyId) -> Result<Vec<u8>, PortError>;
    /// Signs a precomputed 32-byte digest and returns a DER ECDSA signature.
    async fn sign_digest(&self, key_id: &KeyId, digest: &[u8; 32]) -> Result<Vec<u8>, PortError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasEstimate {
    pub gas_limit: i64,
    pub gas_fee_cap: BigUint,
}

#[async_trait]
pub trait NativeRpcPort: Send + Sync {
    async fn nonce(&self, address: &Address) -> Result<u64, PortError>;
    async fn estimate_message_gas(&self, message: &UnsignedMessage) -> Result<GasEstimate, PortError>;
    async fn estimate_gas_premium(
        &self,
        blocks: u64,
        from: &Address,
        gas_limit: i64,
    ) -> Result<BigUint, PortError>;
    /// Resolves any address to its ID form.
    async fn lookup_id(&self, address: &Address) -> Result<Address, PortError>;
    /// Pushes a signed message and returns its CID string.
    async fn push(&self, message: &SignedMessage) -> Result<String, PortError>;
    async fn wait(&self, cid: &str, confidence: u64) -> Result<NativeReceipt, PortError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmFeeData {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[async_trait]
pub trait EvmRpcPort: Send + Sync {
    async fn transaction_count(&self, address: EthAddress) -> Result<u64, PortError>;
    async fn fee_data(&self) -> Result<EvmFeeData, PortError>;
    async fn call(&self, to: EthAddress, data: Bytes) -> Result<Bytes, PortError>;
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, PortError>;
    async fn wait_for_receipt(&self, hash: B256) -> Result<EvmReceipt, PortError>;
}

#[async_trait]
impl<T: CustodyPort + ?Sized> CustodyPort for Box<T> {
    async fn public_key(&self, key_id: &KeyId) -> Result<Vec<u8>, PortError> {
        (**self).public_key(key_id).await
    }

    async fn sign_digest(&self, key_id: &KeyId, digest: &[u8; 32]) -> Result<Vec<u8>, PortError> {
        (**self).sign_digest(key_id, digest).await
    }
}
