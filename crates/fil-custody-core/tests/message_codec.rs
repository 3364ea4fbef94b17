mod common;

use num_bigint::BigUint;

use common::TestCustody;
use fil_custody_core::bignum::parse_token_amount;
use fil_custody_core::digest::{blake2b_256, content_id, signing_digest, CID_PREFIX};
use fil_custody_core::message::params_from_base64;
use fil_custody_core::signature::uncompressed_public_key;
use fil_custody_core::{
    Address, CompactSignature, CustodySigner, KeyId, Network, SignedMessage, UnsignedMessage,
};

fn fixture() -> UnsignedMessage {
    UnsignedMessage {
        version: 0,
        to: Address::new_id(Network::Mainnet, 1234),
        from: Address::new_id(Network::Mainnet, 1000),
        nonce: 5,
        value: parse_token_amount("1000000000000000000").expect("one fil"),
        gas_limit: 1_000_000,
        gas_fee_cap: BigUint::from(100u32),
        gas_premium: BigUint::from(10u32),
        method: 0,
        params: Vec::new(),
    }
}

#[test]
fn serializes_to_known_bytes() {
    let expected: Vec<u8> = vec![
        0x8a, // array(10)
        0x00, // version
        0x43, 0x00, 0xd2, 0x09, // to f01234
        0x43, 0x00, 0xe8, 0x07, // from f01000
        0x05, // nonce
        0x49, 0x00, 0x0d, 0xe0, 0xb6, 0xb3, 0xa7, 0x64, 0x00, 0x00, // value
        0x1a, 0x00, 0x0f, 0x42, 0x40, // gas limit
        0x42, 0x00, 0x64, // fee cap
        0x42, 0x00, 0x0a, // premium
        0x00, // method
        0x40, // params
    ];
    assert_eq!(fixture().serialize().expect("serialize"), expected);
}

#[test]
fn serialization_is_deterministic() {
    let a = fixture().serialize().expect("first");
    let b = fixture().clone().serialize().expect("second");
    assert_eq!(a, b);
}

#[test]
fn any_field_change_changes_digest() {
    let base = fixture().signing_digest().expect("digest");
    let mut bumped = fixture();
    bumped.nonce += 1;
    assert_ne!(bumped.signing_digest().expect("digest"), base);
}

#[test]
fn digest_is_hash_of_content_id() {
    let serialized = fixture().serialize().expect("serialize");
    let cid = content_id(&serialized);
    assert_eq!(cid.len(), 38);
    assert_eq!(cid[..6], CID_PREFIX);
    assert_eq!(cid[6..], blake2b_256(&serialized));
    assert_eq!(signing_digest(&serialized), blake2b_256(&cid));
}

#[test]
fn content_id_string_is_multibase() {
    let cid = fixture().content_id().expect("cid");
    assert!(cid.starts_with("bafy2bza"));
}

#[test]
fn params_decode_from_base64() {
    assert_eq!(params_from_base64("").expect("empty"), Vec::<u8>::new());
    assert_eq!(params_from_base64("AQID").expect("bytes"), vec![1, 2, 3]);
    assert!(params_from_base64("***").is_err());
}

#[test]
fn signed_message_carries_type_and_compact_signature() {
    let signature = CompactSignature {
        r: [1; 32],
        s: [2; 32],
        recovery_id: 1,
    };
    let signed = SignedMessage::new(fixture(), &signature);
    assert_eq!(signed.signature().sig_type as u8, 1);
    assert_eq!(signed.signature().data.len(), 65);
    assert_eq!(signed.compact_signature().expect("compact"), signature);

    let bytes = signed.serialize().expect("serialize signed");
    assert_eq!(bytes[0], 0x82);
}

#[tokio::test]
async fn transfer_between_f1_accounts_signs_and_recovers() {
    let custody = TestCustody::new(9);
    let expected = custody.key.verifying_key().clone();
    let signer = CustodySigner::new(custody);
    let key_id = KeyId::from("alias/hot");

    let from = signer
        .native_address(&key_id, Network::Testnet)
        .await
        .expect("from address");
    let to = Address::encode_from_public_key_hash([0x5a; 20], Network::Testnet);
    assert!(from.to_string().starts_with("t1"));
    assert!(to.to_string().starts_with("t1"));

    let value = parse_token_amount("1000000000000000000").expect("one fil");
    let message = UnsignedMessage::transfer(from.clone(), to, 5, value);
    let digest = message.signing_digest().expect("digest");
    let compact = signer.sign(&key_id, &digest).await.expect("sign");

    let signed = SignedMessage::new(message, &compact);
    assert_eq!(signed.signature().data.len(), 65);
    let recovered = signed
        .compact_signature()
        .expect("compact")
        .recover(&digest)
        .expect("recover");
    assert_eq!(recovered, expected);
    assert_eq!(
        Address::from_secp256k1_public_key(&uncompressed_public_key(&recovered), Network::Testnet)
            .expect("f1 from key"),
        from
    );
}
