use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use data_encoding::BASE32_NOPAD;

/// CIDv1, dag-cbor codec, blake2b-256 multihash, 32-byte length.
pub const CID_PREFIX: [u8; 6] = [0x01, 0x71, 0xa0, 0xe4, 0x02, 0x20];

pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    Blake2b::<U32>::digest(data).into()
}

/// Content identifier bytes of a serialized message.
pub fn content_id(serialized: &[u8]) -> Vec<u8> {
    let mut cid = Vec::with_capacity(CID_PREFIX.len() + 32);
    cid.extend_from_slice(&CID_PREFIX);
    cid.extend_from_slice(&blake2b_256(serialized));
    cid
}

/// The 32-byte value handed to custody. It is already a hash and must not be
/// hashed again by the signer.
pub fn signing_digest(serialized: &[u8]) -> [u8; 32] {
    blake2b_256(&content_id(serialized))
}

/// Multibase (`b`, lower-case base32) rendering used by Lotus, e.g. `bafy2bza…`.
pub fn content_id_string(serialized: &[u8]) -> String {
    cid_bytes_to_string(&content_id(serialized))
}

pub fn cid_bytes_to_string(cid: &[u8]) -> String {
    format!("b{}", BASE32_NOPAD.encode(cid).to_ascii_lowercase())
}
