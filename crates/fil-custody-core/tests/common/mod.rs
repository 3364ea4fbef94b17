#![allow(dead_code)]

use async_trait::async_trait;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use num_bigint::BigUint;

use fil_custody_core::{
    Address, CustodyPort, GasEstimate, KeyId, NativeReceipt, NativeRpcPort, PortError,
    SignedMessage, UnsignedMessage,
};

/// secp256k1 `SubjectPublicKeyInfo` header for a 65-byte uncompressed point.
pub const SPKI_PREFIX: [u8; 23] = [
    0x30, 0x56, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x0a, 0x03, 0x42, 0x00,
];

pub fn signing_key(seed: u8) -> SigningKey {
    let mut secret = [0u8; 32];
    secret[31] = seed;
    secret[0] = 0x11;
    SigningKey::from_bytes(&secret.into()).expect("valid secret")
}

pub fn uncompressed(key: &SigningKey) -> Vec<u8> {
    key.verifying_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec()
}

pub fn spki_der(key: &SigningKey) -> Vec<u8> {
    let mut der = SPKI_PREFIX.to_vec();
    der.extend_from_slice(&uncompressed(key));
    der
}

/// Flips `s` to the upper half of the curve order; still a valid signature.
pub fn high_s(signature: &Signature) -> Signature {
    let negated = -*signature.s();
    Signature::from_scalars(signature.r().to_bytes(), negated.to_bytes()).expect("high-s signature")
}

/// Single-key custody that answers like KMS: SPKI public key, DER signatures.
pub struct TestCustody {
    pub key: SigningKey,
    pub emit_high_s: bool,
}

impl TestCustody {
    pub fn new(seed: u8) -> Self {
        Self {
            key: signing_key(seed),
            emit_high_s: false,
        }
    }
}

#[async_trait]
impl CustodyPort for TestCustody {
    async fn public_key(&self, _key_id: &KeyId) -> Result<Vec<u8>, PortError> {
        Ok(spki_der(&self.key))
    }

    async fn sign_digest(&self, _key_id: &KeyId, digest: &[u8; 32]) -> Result<Vec<u8>, PortError> {
        let signature: Signature = self
            .key
            .sign_prehash(digest)
            .map_err(|e| PortError::Transport(e.to_string()))?;
        let signature = if self.emit_high_s {
            high_s(&signature)
        } else {
            signature
        };
        Ok(signature.to_der().as_bytes().to_vec())
    }
}

/// Answers gas calls with fixed numbers; everything else is unimplemented.
pub struct FixedGasRpc {
    pub gas_limit: i64,
    pub gas_fee_cap: u64,
    pub gas_premium: u64,
}

#[async_trait]
impl NativeRpcPort for FixedGasRpc {
    async fn nonce(&self, _address: &Address) -> Result<u64, PortError> {
        Err(PortError::NotImplemented("nonce"))
    }

    async fn estimate_message_gas(
        &self,
        _message: &UnsignedMessage,
    ) -> Result<GasEstimate, PortError> {
        Ok(GasEstimate {
            gas_limit: self.gas_limit,
            gas_fee_cap: BigUint::from(self.gas_fee_cap),
        })
    }

    async fn estimate_gas_premium(
        &self,
        _blocks: u64,
        _from: &Address,
        _gas_limit: i64,
    ) -> Result<BigUint, PortError> {
        Ok(BigUint::from(self.gas_premium))
    }

    async fn lookup_id(&self, _address: &Address) -> Result<Address, PortError> {
        Err(PortError::NotImplemented("lookup_id"))
    }

    async fn push(&self, _message: &SignedMessage) -> Result<String, PortError> {
        Err(PortError::NotImplemented("push"))
    }

    async fn wait(&self, _cid: &str, _confidence: u64) -> Result<NativeReceipt, PortError> {
        Err(PortError::NotImplemented("wait"))
    }
}
