mod common;

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, VerifyingKey};

use common::{high_s, signing_key, spki_der, uncompressed, TestCustody};
use fil_custody_core::signature::{normalize_s, parse_public_key};
use fil_custody_core::{
    decode_der, recover_id, CompactSignature, CustodyError, CustodySigner, DecodingError, KeyId,
    Network,
};

const DIGEST: [u8; 32] = [0x24; 32];

fn sign(seed: u8, digest: &[u8; 32]) -> Signature {
    signing_key(seed).sign_prehash(digest).expect("sign prehash")
}

#[test]
fn der_decode_recovers_scalars() {
    let signature = sign(1, &DIGEST);
    let (r, s) = decode_der(signature.to_der().as_bytes()).expect("decode der");
    assert_eq!(r, <[u8; 32]>::from(signature.r().to_bytes()));
    assert_eq!(s, <[u8; 32]>::from(signature.s().to_bytes()));
}

#[test]
fn malformed_der_is_rejected() {
    let signature = sign(1, &DIGEST);
    let mut der = signature.to_der().as_bytes().to_vec();
    der[0] = 0x31;
    assert!(matches!(
        decode_der(&der),
        Err(DecodingError::MalformedSignature(_))
    ));
    assert!(decode_der(&der[..der.len() - 3]).is_err());
    assert!(decode_der(&[]).is_err());
}

#[test]
fn recovery_id_matches_signer() {
    let key = signing_key(7);
    let signature = sign(7, &DIGEST);
    let (r, s) = decode_der(signature.to_der().as_bytes()).expect("decode der");

    let id = recover_id(&DIGEST, &r, &s, key.verifying_key()).expect("recover id");
    assert!(id <= 3);

    let compact = CompactSignature { r, s, recovery_id: id };
    let recovered = compact.recover(&DIGEST).expect("recover key");
    assert_eq!(&recovered, key.verifying_key());
}

#[test]
fn flipped_digest_bit_fails_recovery() {
    let key = signing_key(7);
    let signature = sign(7, &DIGEST);
    let (r, s) = decode_der(signature.to_der().as_bytes()).expect("decode der");

    let mut other = DIGEST;
    other[0] ^= 0x01;
    let err = recover_id(&other, &r, &s, key.verifying_key()).expect_err("must fail");
    assert!(matches!(err, CustodyError::RecoveryFailure { .. }));
}

#[test]
fn wrong_key_fails_recovery() {
    let signature = sign(7, &DIGEST);
    let (r, s) = decode_der(signature.to_der().as_bytes()).expect("decode der");
    let stranger = signing_key(8);
    assert!(recover_id(&DIGEST, &r, &s, stranger.verifying_key()).is_err());
}

#[test]
fn high_s_is_normalized() {
    let signature = sign(3, &DIGEST);
    let flipped = high_s(&signature);
    let (r, s) = decode_der(flipped.to_der().as_bytes()).expect("decode der");
    let (nr, ns) = normalize_s(&r, &s).expect("normalize");
    assert_eq!(nr, r);
    assert_eq!(ns, <[u8; 32]>::from(signature.s().to_bytes()));
}

#[test]
fn public_key_accepts_spki_and_sec1() {
    let key = signing_key(9);
    let from_der = parse_public_key(&spki_der(&key)).expect("spki");
    let from_sec1 = parse_public_key(&uncompressed(&key)).expect("sec1");
    assert_eq!(from_der, from_sec1);
    assert_eq!(&from_der, key.verifying_key());
    assert!(parse_public_key(&[]).is_err());
    assert!(parse_public_key(&[0x04, 0x01]).is_err());
}

#[tokio::test]
async fn signer_produces_recoverable_compact_signature() {
    let mut custody = TestCustody::new(5);
    custody.emit_high_s = true;
    let expected: VerifyingKey = custody.key.verifying_key().clone();
    let signer = CustodySigner::new(custody);
    let key_id = KeyId::from("alias/treasury");

    let compact = signer.sign(&key_id, &DIGEST).await.expect("sign");
    assert_eq!(compact.to_bytes().len(), 65);
    assert_eq!(compact.recover(&DIGEST).expect("recover"), expected);

    let address = signer
        .native_address(&key_id, Network::Mainnet)
        .await
        .expect("native address");
    assert!(address.to_string().starts_with("f1"));
    let eth = signer.evm_address(&key_id).await.expect("evm address");
    assert_ne!(eth, alloy::primitives::Address::ZERO);
}
