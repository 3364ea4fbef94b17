use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fil_custody_core::{CustodyPort, KeyId, PortError};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

/// In-process custody for development and tests. Keys live in memory and
/// signatures come back DER-encoded, like a remote custody service.
#[derive(Debug, Clone, Default)]
pub struct LocalCustody {
    keys: Arc<Mutex<HashMap<KeyId, SigningKey>>>,
}

impl LocalCustody {
    pub fn insert_key(&self, key_id: KeyId, secret: &[u8; 32]) -> Result<VerifyingKey, PortError> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| PortError::Decode(format!("invalid secret key: {e}")))?;
        let verifying = key.verifying_key().clone();
        let mut guard = self
            .keys
            .lock()
            .map_err(|e| PortError::Transport(format!("local custody lock poisoned: {e}")))?;
        guard.insert(key_id, key);
        Ok(verifying)
    }

    pub fn generate_key(&self, key_id: KeyId) -> Result<VerifyingKey, PortError> {
        loop {
            let mut secret = [0u8; 32];
            getrandom::getrandom(&mut secret)
                .map_err(|e| PortError::Transport(format!("entropy unavailable: {e}")))?;
            // Zero or out-of-range scalars are rejected; draw again.
            match self.insert_key(key_id.clone(), &secret) {
                Ok(key) => return Ok(key),
                Err(PortError::Decode(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn key(&self, key_id: &KeyId) -> Result<SigningKey, PortError> {
        let guard = self
            .keys
            .lock()
            .map_err(|e| PortError::Transport(format!("local custody lock poisoned: {e}")))?;
        guard
            .get(key_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("key {key_id}")))
    }
}

#[async_trait]
impl CustodyPort for LocalCustody {
    async fn public_key(&self, key_id: &KeyId) -> Result<Vec<u8>, PortError> {
        let key = self.key(key_id)?;
        Ok(key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec())
    }

    async fn sign_digest(&self, key_id: &KeyId, digest: &[u8; 32]) -> Result<Vec<u8>, PortError> {
        let key = self.key(key_id)?;
        let signature: Signature = key
            .sign_prehash(digest)
            .map_err(|e| PortError::Transport(format!("local signing failed: {e}")))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }
}
