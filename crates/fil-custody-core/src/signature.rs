//! DER decoding, low-s normalization and recovery-id search for custody
//! signatures.

use alloy::hex;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::pkcs8::DecodePublicKey;
use serde::{Deserialize, Serialize};

use crate::error::{CustodyError, DecodingError};

pub const COMPACT_SIGNATURE_LEN: usize = 65;

/// `r || s || v`, where `v` is the recovery id (0..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub recovery_id: u8,
}

impl CompactSignature {
    pub fn to_bytes(&self) -> [u8; COMPACT_SIGNATURE_LEN] {
        let mut out = [0u8; COMPACT_SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.recovery_id;
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodingError> {
        if bytes.len() != COMPACT_SIGNATURE_LEN {
            return Err(DecodingError::MalformedSignature(format!(
                "compact signature must be {COMPACT_SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self {
            r,
            s,
            recovery_id: bytes[64],
        })
    }

    /// Recovers the signer's key. Used by verifiers of submitted messages.
    pub fn recover(&self, digest: &[u8; 32]) -> Result<VerifyingKey, DecodingError> {
        let signature = scalars_to_signature(&self.r, &self.s)?;
        let recovery_id = RecoveryId::from_byte(self.recovery_id).ok_or_else(|| {
            DecodingError::MalformedSignature(format!("recovery id {} out of range", self.recovery_id))
        })?;
        VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
            .map_err(|e| DecodingError::MalformedSignature(format!("recovery failed: {e}")))
    }
}

/// Extracts `(r, s)` from an ASN.1 DER `SEQUENCE { INTEGER r, INTEGER s }`,
/// stripping sign-padding and left-padding each to 32 bytes.
pub fn decode_der(der: &[u8]) -> Result<([u8; 32], [u8; 32]), DecodingError> {
    let signature =
        Signature::from_der(der).map_err(|e| DecodingError::MalformedSignature(e.to_string()))?;
    let (r, s) = signature.split_bytes();
    Ok((r.into(), s.into()))
}

/// Maps `s` into the lower half of the curve order. Both halves verify, but
/// recovery only accepts the low form.
pub fn normalize_s(r: &[u8; 32], s: &[u8; 32]) -> Result<([u8; 32], [u8; 32]), DecodingError> {
    let signature = scalars_to_signature(r, s)?;
    let normalized = signature.normalize_s().unwrap_or(signature);
    let (r, s) = normalized.split_bytes();
    Ok((r.into(), s.into()))
}

/// Finds the recovery id whose recovered key equals `expected`.
pub fn recover_id(
    digest: &[u8; 32],
    r: &[u8; 32],
    s: &[u8; 32],
    expected: &VerifyingKey,
) -> Result<u8, CustodyError> {
    let signature = scalars_to_signature(r, s)?;
    let expected_point = expected.to_encoded_point(true);

    for candidate in 0u8..=3 {
        let Some(recovery_id) = RecoveryId::from_byte(candidate) else {
            continue;
        };
        let Ok(recovered) = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        else {
            continue;
        };
        if recovered.to_encoded_point(true) == expected_point {
            return Ok(candidate);
        }
    }

    Err(CustodyError::RecoveryFailure {
        digest: hex::encode(digest),
        public_key: hex::encode(expected_point.as_bytes()),
    })
}

/// Accepts a DER `SubjectPublicKeyInfo` (as KMS returns it) or a raw SEC1
/// point, compressed or not.
pub fn parse_public_key(bytes: &[u8]) -> Result<VerifyingKey, DecodingError> {
    let parsed = match bytes.first() {
        Some(0x30) => VerifyingKey::from_public_key_der(bytes).map_err(|e| e.to_string()),
        Some(_) => VerifyingKey::from_sec1_bytes(bytes).map_err(|e| e.to_string()),
        None => Err("empty public key".to_owned()),
    };
    parsed.map_err(DecodingError::MalformedPublicKey)
}

pub fn uncompressed_public_key(key: &VerifyingKey) -> Vec<u8> {
    key.to_encoded_point(false).as_bytes().to_vec()
}

fn scalars_to_signature(r: &[u8; 32], s: &[u8; 32]) -> Result<Signature, DecodingError> {
    Signature::from_scalars(*r, *s).map_err(|e| DecodingError::MalformedSignature(e.to_string()))
}
