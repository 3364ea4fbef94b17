use std::collections::HashMap;
use std::time::Duration;

use fil_custody_adapters::{ConfigError, CustodyConfig, CustodyMode};
use fil_custody_core::Network;

fn from_pairs(pairs: &[(&str, &str)]) -> Result<CustodyConfig, ConfigError> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    CustodyConfig::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn defaults_target_calibration_with_kms_custody() {
    let cfg = CustodyConfig::default();
    assert_eq!(cfg.network, Network::Testnet);
    assert_eq!(cfg.evm_chain_id, 314_159);
    assert_eq!(cfg.evm_gas_limit, 30_000_000);
    assert_eq!(cfg.custody_mode, CustodyMode::Kms);
    assert_eq!(cfg.premium_blocks, 10);
    assert!(cfg.lotus_token.is_none());
    assert!(cfg.kms_endpoint.is_none());
}

#[test]
fn environment_overrides_apply() {
    let cfg = from_pairs(&[
        ("FIL_CUSTODY_NETWORK", "mainnet"),
        ("FIL_CUSTODY_LOTUS_URL", "http://lotus:1234/rpc/v1"),
        ("FIL_CUSTODY_LOTUS_TOKEN", "jwt"),
        ("FIL_CUSTODY_EVM_CHAIN_ID", "314"),
        ("FIL_CUSTODY_MODE", "local"),
        ("FIL_CUSTODY_RPC_TIMEOUT_MS", "2500"),
        ("FIL_CUSTODY_WAIT_CONFIDENCE", "5"),
        ("FIL_CUSTODY_KMS_ENDPOINT", "http://localhost:4566"),
    ])
    .expect("valid environment");

    assert_eq!(cfg.network, Network::Mainnet);
    assert_eq!(cfg.lotus_rpc_url, "http://lotus:1234/rpc/v1");
    assert_eq!(cfg.lotus_token.as_deref(), Some("jwt"));
    assert_eq!(cfg.evm_chain_id, 314);
    assert_eq!(cfg.custody_mode, CustodyMode::Local);
    assert_eq!(cfg.rpc_timeout(), Duration::from_millis(2500));
    assert_eq!(cfg.kms_endpoint.as_deref(), Some("http://localhost:4566"));

    let pipeline = cfg.pipeline_config();
    assert_eq!(pipeline.network, Network::Mainnet);
    assert_eq!(pipeline.evm_chain_id, 314);
    assert_eq!(pipeline.wait_confidence, 5);
}

#[test]
fn unset_and_empty_values_keep_defaults() {
    let cfg = from_pairs(&[
        ("FIL_CUSTODY_LOTUS_TOKEN", ""),
        ("FIL_CUSTODY_KMS_ENDPOINT", ""),
    ])
    .expect("valid environment");
    let defaults = CustodyConfig::default();

    assert_eq!(cfg.network, defaults.network);
    assert_eq!(cfg.evm_gas_limit, defaults.evm_gas_limit);
    assert_eq!(cfg.custody_mode, defaults.custody_mode);
    assert!(cfg.lotus_token.is_none());
    assert!(cfg.kms_endpoint.is_none());
}

#[test]
fn typos_are_errors_not_defaults() {
    for (key, value) in [
        ("FIL_CUSTODY_NETWORK", "mainnett"),
        ("FIL_CUSTODY_MODE", "hsm"),
        ("FIL_CUSTODY_EVM_CHAIN_ID", "lots"),
        ("FIL_CUSTODY_EVM_GAS_LIMIT", "-1"),
    ] {
        let err = from_pairs(&[(key, value)]).expect_err(key);
        assert_eq!(err.key, key);
        assert_eq!(err.value, value);
        assert!(err.to_string().starts_with(&format!("invalid {key}=")), "{err}");
    }
}

#[test]
fn surrounding_whitespace_is_ignored() {
    let cfg = from_pairs(&[("FIL_CUSTODY_EVM_CHAIN_ID", " 314 ")]).expect("chain id");
    assert_eq!(cfg.evm_chain_id, 314);
}
