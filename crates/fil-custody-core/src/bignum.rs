//! Token amounts on the wire: empty for zero, otherwise a sign byte followed
//! by the big-endian magnitude. Only non-negative values are produced.

use std::str::FromStr;

use num_bigint::BigUint;

use crate::error::DecodingError;

const SIGN_POSITIVE: u8 = 0x00;

pub fn encode(value: &BigUint) -> Vec<u8> {
    if value.bits() == 0 {
        return Vec::new();
    }
    let magnitude = value.to_bytes_be();
    let mut out = Vec::with_capacity(magnitude.len() + 1);
    out.push(SIGN_POSITIVE);
    out.extend_from_slice(&magnitude);
    out
}

pub fn decode(bytes: &[u8]) -> Result<BigUint, DecodingError> {
    match bytes.split_first() {
        None => Ok(BigUint::default()),
        Some((&SIGN_POSITIVE, [])) => Err(DecodingError::MalformedBigNum(
            "zero must be encoded as empty bytes".to_owned(),
        )),
        Some((&SIGN_POSITIVE, [0, ..])) => Err(DecodingError::MalformedBigNum(
            "magnitude has leading zero bytes".to_owned(),
        )),
        Some((&SIGN_POSITIVE, magnitude)) => Ok(BigUint::from_bytes_be(magnitude)),
        Some((&sign, _)) => Err(DecodingError::MalformedBigNum(format!(
            "unexpected sign byte {sign:#04x}"
        ))),
    }
}

/// Parses a decimal amount in the smallest unit (attoFIL / wei).
pub fn parse_token_amount(value: &str) -> Result<BigUint, DecodingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodingError::MalformedBigNum(format!(
            "not a non-negative decimal integer: {value:?}"
        )));
    }
    BigUint::from_str(trimmed).map_err(|e| DecodingError::MalformedBigNum(e.to_string()))
}
