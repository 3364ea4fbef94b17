//! Filecoin address codec: human form `<network><protocol><payload>`, byte
//! form `<protocol><payload>`, and the conversions between f1/f4/ID and EVM
//! addresses.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address as EthAddress;
use blake2::digest::consts::{U20, U4};
use blake2::{Blake2b, Digest};
use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::leb128;

pub const CHECKSUM_LEN: usize = 4;
pub const PAYLOAD_HASH_LEN: usize = 20;
pub const MAX_SUBADDRESS_LEN: usize = 54;
/// Namespace of the Ethereum address manager actor.
pub const EAM_NAMESPACE: u64 = 10;
/// Decimal digits of `u64::MAX`.
const MAX_ID_DIGITS: usize = 20;
const UNCOMPRESSED_KEY_LEN: usize = 65;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("unknown network prefix")]
    UnknownNetwork,
    #[error("unknown address protocol {0:?}")]
    UnknownProtocol(char),
    #[error("unsupported address protocol {0}")]
    UnsupportedProtocol(Protocol),
    #[error("invalid payload length")]
    InvalidPayloadLength,
    #[error("invalid address encoding")]
    InvalidEncoding,
    #[error("id address too long")]
    IdTooLong,
    #[error("address checksum mismatch")]
    ChecksumMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn prefix(self) -> char {
        match self {
            Self::Mainnet => 'f',
            Self::Testnet => 't',
        }
    }

    fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'f' => Some(Self::Mainnet),
            't' => Some(Self::Testnet),
            _ => None,
        }
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "mainnet" | "f" => Ok(Self::Mainnet),
            "testnet" | "calibnet" | "t" => Ok(Self::Testnet),
            _ => Err(AddressError::UnknownNetwork),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Protocol {
    Id = 0,
    Secp256k1 = 1,
    Actor = 2,
    Bls = 3,
    Delegated = 4,
}

impl Protocol {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Id),
            1 => Some(Self::Secp256k1),
            2 => Some(Self::Actor),
            3 => Some(Self::Bls),
            4 => Some(Self::Delegated),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Payload {
    Id(u64),
    Secp256k1([u8; PAYLOAD_HASH_LEN]),
    Actor([u8; PAYLOAD_HASH_LEN]),
    Delegated { namespace: u64, subaddress: Vec<u8> },
}

/// A decoded Filecoin address. BLS addresses are never constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    network: Network,
    payload: Payload,
}

impl Address {
    pub fn new_id(network: Network, id: u64) -> Self {
        Self {
            network,
            payload: Payload::Id(id),
        }
    }

    /// Builds an `f1`/`t1` address from a 20-byte public-key hash.
    pub fn encode_from_public_key_hash(hash: [u8; PAYLOAD_HASH_LEN], network: Network) -> Self {
        Self {
            network,
            payload: Payload::Secp256k1(hash),
        }
    }

    pub fn new_actor(network: Network, hash: [u8; PAYLOAD_HASH_LEN]) -> Self {
        Self {
            network,
            payload: Payload::Actor(hash),
        }
    }

    pub fn new_delegated(
        network: Network,
        namespace: u64,
        subaddress: &[u8],
    ) -> Result<Self, AddressError> {
        if subaddress.len() > MAX_SUBADDRESS_LEN {
            return Err(AddressError::InvalidPayloadLength);
        }
        Ok(Self {
            network,
            payload: Payload::Delegated {
                namespace,
                subaddress: subaddress.to_vec(),
            },
        })
    }

    /// The `f410f…` form of an EVM account.
    pub fn new_delegated_eth(eth: EthAddress, network: Network) -> Self {
        Self {
            network,
            payload: Payload::Delegated {
                namespace: EAM_NAMESPACE,
                subaddress: eth.to_vec(),
            },
        }
    }

    /// Derives the `f1` address of an uncompressed (65-byte) SECP256K1 key.
    pub fn from_secp256k1_public_key(
        uncompressed: &[u8],
        network: Network,
    ) -> Result<Self, AddressError> {
        if uncompressed.len() != UNCOMPRESSED_KEY_LEN || uncompressed[0] != 0x04 {
            return Err(AddressError::InvalidPayloadLength);
        }
        let hash: [u8; PAYLOAD_HASH_LEN] = Blake2b::<U20>::digest(uncompressed).into();
        Ok(Self::encode_from_public_key_hash(hash, network))
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn protocol(&self) -> Protocol {
        match self.payload {
            Payload::Id(_) => Protocol::Id,
            Payload::Secp256k1(_) => Protocol::Secp256k1,
            Payload::Actor(_) => Protocol::Actor,
            Payload::Delegated { .. } => Protocol::Delegated,
        }
    }

    pub fn id(&self) -> Option<u64> {
        match self.payload {
            Payload::Id(id) => Some(id),
            _ => None,
        }
    }

    /// The EVM view of this address: the embedded address of an `f410`
    /// account, or the masked ID form for ID addresses.
    pub fn eth_address(&self) -> Option<EthAddress> {
        match &self.payload {
            Payload::Id(id) => Some(eth_address_from_id(*id)),
            Payload::Delegated {
                namespace,
                subaddress,
            } if *namespace == EAM_NAMESPACE && subaddress.len() == PAYLOAD_HASH_LEN => {
                Some(EthAddress::from_slice(subaddress))
            }
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.protocol() as u8];
        match &self.payload {
            Payload::Id(id) => leb128::write_unsigned(*id, &mut out),
            Payload::Secp256k1(hash) | Payload::Actor(hash) => out.extend_from_slice(hash),
            Payload::Delegated {
                namespace,
                subaddress,
            } => {
                leb128::write_unsigned(*namespace, &mut out);
                out.extend_from_slice(subaddress);
            }
        }
        out
    }

    pub fn from_bytes(network: Network, bytes: &[u8]) -> Result<Self, AddressError> {
        let (&protocol, rest) = bytes.split_first().ok_or(AddressError::InvalidPayloadLength)?;
        let protocol = Protocol::from_byte(protocol)
            .ok_or(AddressError::UnknownProtocol(char::from(b'0'.wrapping_add(protocol))))?;
        let payload = match protocol {
            Protocol::Id => {
                let (id, used) = leb128::read_unsigned(rest).ok_or(AddressError::InvalidEncoding)?;
                if used != rest.len() {
                    return Err(AddressError::InvalidPayloadLength);
                }
                Payload::Id(id)
            }
            Protocol::Secp256k1 => Payload::Secp256k1(hash_payload(rest)?),
            Protocol::Actor => Payload::Actor(hash_payload(rest)?),
            Protocol::Bls => return Err(AddressError::UnsupportedProtocol(Protocol::Bls)),
            Protocol::Delegated => {
                let (namespace, used) =
                    leb128::read_unsigned(rest).ok_or(AddressError::InvalidEncoding)?;
                return Self::new_delegated(network, namespace, &rest[used..]);
            }
        };
        Ok(Self { network, payload })
    }

    pub fn decode(value: &str) -> Result<Self, AddressError> {
        if !value.is_ascii() || value.len() < 3 {
            return Err(AddressError::InvalidEncoding);
        }
        let mut chars = value.chars();
        let network = chars
            .next()
            .and_then(Network::from_prefix)
            .ok_or(AddressError::UnknownNetwork)?;
        let protocol = chars.next().ok_or(AddressError::InvalidEncoding)?;
        let raw = &value[2..];

        match protocol {
            '0' => {
                if raw.len() > MAX_ID_DIGITS {
                    return Err(AddressError::IdTooLong);
                }
                if !raw.bytes().all(|b| b.is_ascii_digit()) || (raw.len() > 1 && raw.starts_with('0')) {
                    return Err(AddressError::InvalidEncoding);
                }
                let id = raw.parse::<u64>().map_err(|_| AddressError::InvalidEncoding)?;
                Ok(Self::new_id(network, id))
            }
            '1' | '2' => {
                let decoded = decode_base32(raw)?;
                if decoded.len() != PAYLOAD_HASH_LEN + CHECKSUM_LEN {
                    return Err(AddressError::InvalidPayloadLength);
                }
                let (payload, checksum) = decoded.split_at(PAYLOAD_HASH_LEN);
                let hash = hash_payload(payload)?;
                let address = if protocol == '1' {
                    Self::encode_from_public_key_hash(hash, network)
                } else {
                    Self::new_actor(network, hash)
                };
                address.verify_checksum(checksum)?;
                Ok(address)
            }
            '3' => Err(AddressError::UnsupportedProtocol(Protocol::Bls)),
            '4' => {
                let (namespace, encoded) = raw.split_once('f').ok_or(AddressError::InvalidEncoding)?;
                if namespace.is_empty()
                    || !namespace.bytes().all(|b| b.is_ascii_digit())
                    || (namespace.len() > 1 && namespace.starts_with('0'))
                {
                    return Err(AddressError::InvalidEncoding);
                }
                let namespace = namespace
                    .parse::<u64>()
                    .map_err(|_| AddressError::InvalidEncoding)?;
                let decoded = decode_base32(encoded)?;
                if decoded.len() < CHECKSUM_LEN {
                    return Err(AddressError::InvalidPayloadLength);
                }
                let (subaddress, checksum) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
                let address = Self::new_delegated(network, namespace, subaddress)?;
                address.verify_checksum(checksum)?;
                Ok(address)
            }
            other => Err(AddressError::UnknownProtocol(other)),
        }
    }

    pub fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        checksum(&self.to_bytes())
    }

    fn verify_checksum(&self, checksum: &[u8]) -> Result<(), AddressError> {
        if self.checksum().as_slice() == checksum {
            Ok(())
        } else {
            Err(AddressError::ChecksumMismatch)
        }
    }
}

/// BLAKE2b with a 4-byte output over the address byte form.
pub fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    Blake2b::<U4>::digest(bytes).into()
}

/// Masked EVM form of an actor ID: `0xff`, eleven zero bytes, then the id
/// big-endian.
pub fn eth_address_from_id(id: u64) -> EthAddress {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xff;
    bytes[12..].copy_from_slice(&id.to_be_bytes());
    EthAddress::from(bytes)
}

fn hash_payload(bytes: &[u8]) -> Result<[u8; PAYLOAD_HASH_LEN], AddressError> {
    bytes
        .try_into()
        .map_err(|_| AddressError::InvalidPayloadLength)
}

fn encode_base32(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes).to_ascii_lowercase()
}

fn decode_base32(value: &str) -> Result<Vec<u8>, AddressError> {
    if value.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(AddressError::InvalidEncoding);
    }
    BASE32_NOPAD
        .decode(value.to_ascii_uppercase().as_bytes())
        .map_err(|_| AddressError::InvalidEncoding)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.network.prefix();
        let protocol = self.protocol();
        match &self.payload {
            Payload::Id(id) => write!(f, "{prefix}{protocol}{id}"),
            Payload::Secp256k1(hash) | Payload::Actor(hash) => {
                let mut body = hash.to_vec();
                body.extend_from_slice(&self.checksum());
                write!(f, "{prefix}{protocol}{}", encode_base32(&body))
            }
            Payload::Delegated {
                namespace,
                subaddress,
            } => {
                let mut body = subaddress.clone();
                body.extend_from_slice(&self.checksum());
                write!(f, "{prefix}{protocol}{namespace}f{}", encode_base32(&body))
            }
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::decode(value)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::decode(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_bytes_use_leb128() {
        let address = Address::new_id(Network::Mainnet, 1234);
        assert_eq!(address.to_bytes(), vec![0x00, 0xd2, 0x09]);
        assert_eq!(address.to_string(), "f01234");
    }

    #[test]
    fn masked_id_eth_address() {
        let eth = eth_address_from_id(1234);
        assert_eq!(
            eth.to_string().to_lowercase(),
            "0xff000000000000000000000000000000000004d2"
        );
    }
}
