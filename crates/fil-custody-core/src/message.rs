use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ciborium::value::Value;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::bignum;
use crate::cbor;
use crate::digest;
use crate::domain::SEND_METHOD;
use crate::error::{CustodyError, DecodingError};
use crate::signature::CompactSignature;

pub const MESSAGE_VERSION: u64 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedMessage {
    pub version: u64,
    pub to: Address,
    pub from: Address,
    pub nonce: u64,
    pub value: BigUint,
    pub gas_limit: i64,
    pub gas_fee_cap: BigUint,
    pub gas_premium: BigUint,
    pub method: u64,
    pub params: Vec<u8>,
}

impl UnsignedMessage {
    /// A message with zeroed gas fields, ready for estimation.
    pub fn new(from: Address, to: Address, nonce: u64, value: BigUint, method: u64, params: Vec<u8>) -> Self {
        Self {
            version: MESSAGE_VERSION,
            to,
            from,
            nonce,
            value,
            gas_limit: 0,
            gas_fee_cap: BigUint::default(),
            gas_premium: BigUint::default(),
            method,
            params,
        }
    }

    pub fn transfer(from: Address, to: Address, nonce: u64, value: BigUint) -> Self {
        Self::new(from, to, nonce, value, SEND_METHOD, Vec::new())
    }

    /// Canonical CBOR: a 10-element array in wire order.
    pub fn serialize(&self) -> Result<Vec<u8>, CustodyError> {
        cbor::encode(&self.to_cbor())
    }

    pub fn content_id(&self) -> Result<String, CustodyError> {
        Ok(digest::content_id_string(&self.serialize()?))
    }

    pub fn signing_digest(&self) -> Result<[u8; 32], CustodyError> {
        Ok(digest::signing_digest(&self.serialize()?))
    }

    fn to_cbor(&self) -> Value {
        Value::Array(vec![
            cbor::uint(self.version),
            cbor::bytes(self.to.to_bytes()),
            cbor::bytes(self.from.to_bytes()),
            cbor::uint(self.nonce),
            cbor::bytes(bignum::encode(&self.value)),
            cbor::int(self.gas_limit),
            cbor::bytes(bignum::encode(&self.gas_fee_cap)),
            cbor::bytes(bignum::encode(&self.gas_premium)),
            cbor::uint(self.method),
            cbor::bytes(self.params.clone()),
        ])
    }
}

pub fn params_from_base64(encoded: &str) -> Result<Vec<u8>, DecodingError> {
    BASE64
        .decode(encoded)
        .map_err(|e| DecodingError::MalformedParams(format!("invalid base64: {e}")))
}

pub fn params_to_base64(params: &[u8]) -> String {
    BASE64.encode(params)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureType {
    Secp256k1 = 1,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSignature {
    pub sig_type: SignatureType,
    pub data: Vec<u8>,
}

/// A message paired with its signature. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    message: UnsignedMessage,
    signature: MessageSignature,
}

impl SignedMessage {
    pub fn new(message: UnsignedMessage, signature: &CompactSignature) -> Self {
        Self {
            message,
            signature: MessageSignature {
                sig_type: SignatureType::Secp256k1,
                data: signature.to_bytes().to_vec(),
            },
        }
    }

    pub fn message(&self) -> &UnsignedMessage {
        &self.message
    }

    pub fn signature(&self) -> &MessageSignature {
        &self.signature
    }

    pub fn compact_signature(&self) -> Result<CompactSignature, DecodingError> {
        CompactSignature::from_bytes(&self.signature.data)
    }

    /// `[message, type || data]`, the form whose CID identifies a SECP256K1
    /// signed message on chain.
    pub fn serialize(&self) -> Result<Vec<u8>, CustodyError> {
        let mut signature = Vec::with_capacity(self.signature.data.len() + 1);
        signature.push(self.signature.sig_type as u8);
        signature.extend_from_slice(&self.signature.data);
        cbor::encode(&Value::Array(vec![
            self.message.to_cbor(),
            cbor::bytes(signature),
        ]))
    }

    pub fn content_id(&self) -> Result<String, CustodyError> {
        Ok(digest::content_id_string(&self.serialize()?))
    }
}
