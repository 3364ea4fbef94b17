mod common;

use num_bigint::BigUint;

use common::FixedGasRpc;
use fil_custody_core::{fee_projection, Address, GasEstimator, Network, UnsignedMessage};

#[test]
fn fee_projection_vector() {
    let (total, with_premium) =
        fee_projection(1_000_000, &BigUint::from(100u32), &BigUint::from(10u32)).expect("fees");
    assert_eq!(total, BigUint::from(100_000_000u64));
    assert_eq!(with_premium, BigUint::from(110_000_000u64));
}

#[test]
fn fee_projection_is_exact_for_large_values() {
    let cap = BigUint::from(u64::MAX);
    let (total, _) = fee_projection(i64::MAX, &cap, &BigUint::default()).expect("fees");
    assert_eq!(total, BigUint::from(i64::MAX as u64) * BigUint::from(u64::MAX));
}

#[test]
fn negative_gas_limit_is_rejected() {
    assert!(fee_projection(-1, &BigUint::from(1u8), &BigUint::default()).is_err());
}

#[tokio::test]
async fn estimate_fills_gas_fields() {
    let rpc = FixedGasRpc {
        gas_limit: 1_000_000,
        gas_fee_cap: 100,
        gas_premium: 10,
    };
    let message = UnsignedMessage::transfer(
        Address::new_id(Network::Testnet, 1000),
        Address::new_id(Network::Testnet, 1001),
        3,
        BigUint::from(1u8),
    );

    let priced = GasEstimator::new(&rpc, 10)
        .estimate(message.clone())
        .await
        .expect("estimate");
    assert_eq!(priced.message.gas_limit, 1_000_000);
    assert_eq!(priced.message.gas_fee_cap, BigUint::from(100u32));
    assert_eq!(priced.message.gas_premium, BigUint::from(10u32));
    assert_eq!(priced.message.nonce, message.nonce);
    assert_eq!(priced.total_fee, BigUint::from(100_000_000u64));
    assert_eq!(priced.premium_total_fee, BigUint::from(110_000_000u64));
}
