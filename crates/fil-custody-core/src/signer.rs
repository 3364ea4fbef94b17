use alloy::hex;
use alloy::primitives::{keccak256, Address as EthAddress};
use k256::ecdsa::VerifyingKey;
use tracing::debug;

use crate::address::{Address, Network};
use crate::domain::KeyId;
use crate::error::CustodyError;
use crate::ports::CustodyPort;
use crate::signature::{
    decode_der, normalize_s, parse_public_key, recover_id, uncompressed_public_key,
    CompactSignature,
};

/// Turns custody DER signatures into recoverable compact signatures.
pub struct CustodySigner<C: CustodyPort> {
    custody: C,
}

impl<C: CustodyPort> CustodySigner<C> {
    pub fn new(custody: C) -> Self {
        Self { custody }
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub async fn public_key(&self, key_id: &KeyId) -> Result<VerifyingKey, CustodyError> {
        let raw = self.custody.public_key(key_id).await?;
        Ok(parse_public_key(&raw)?)
    }

    pub async fn sign(
        &self,
        key_id: &KeyId,
        digest: &[u8; 32],
    ) -> Result<CompactSignature, CustodyError> {
        let public_key = self.public_key(key_id).await?;
        let der = self.custody.sign_digest(key_id, digest).await?;
        let (r, s) = decode_der(&der)?;
        let (r, s) = normalize_s(&r, &s)?;
        let recovery_id = recover_id(digest, &r, &s, &public_key)?;
        debug!(
            key_id = %key_id,
            digest = %hex::encode(digest),
            recovery_id,
            "custody signature recovered"
        );
        Ok(CompactSignature { r, s, recovery_id })
    }

    pub async fn native_address(
        &self,
        key_id: &KeyId,
        network: Network,
    ) -> Result<Address, CustodyError> {
        let public_key = self.public_key(key_id).await?;
        Ok(Address::from_secp256k1_public_key(
            &uncompressed_public_key(&public_key),
            network,
        )?)
    }

    pub async fn evm_address(&self, key_id: &KeyId) -> Result<EthAddress, CustodyError> {
        let public_key = self.public_key(key_id).await?;
        Ok(evm_address_of(&public_key))
    }
}

pub fn evm_address_of(public_key: &VerifyingKey) -> EthAddress {
    let uncompressed = uncompressed_public_key(public_key);
    let hash = keccak256(&uncompressed[1..]);
    EthAddress::from_slice(&hash[12..])
}
